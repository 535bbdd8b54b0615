//! Binary snapshot of the edited content: envelope tables and the DPCM bank.
//!
//! Loop, release, length and speed are host parameters and are not stored
//! here. Loading decodes the whole blob first and only touches the channels
//! once it is known to be well formed.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    channel::ChannelId,
    channel_set::ChannelSet,
    dpcm::{DpcmPatch, DpcmSample, DpcmSampleTable, MAX_PITCH, PATCH_COUNT, SAMPLE_WINDOW_LEN},
    envelope::{EnvelopeKind, MAX_STEPS},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("state truncated: needed {needed} bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },
    #[error("sample name is not valid UTF-8")]
    InvalidUtf8,
    #[error("{0} unexpected bytes after the end of the state")]
    TrailingBytes(usize),
    #[error("sample of {0} bytes does not fit the DPCM window")]
    SampleTooLarge(usize),
}

type EnvelopeTables = [[i32; MAX_STEPS]; EnvelopeKind::COUNT];

/// Fully decoded state, ready to apply.
#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    envelopes: Vec<(ChannelId, EnvelopeTables)>,
    dpcm: DpcmSampleTable,
}

/// Serializes every channel in chip order.
pub fn save(channels: &ChannelSet) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for channel in channels.iter() {
        match channel.envelopes() {
            Some(envs) => {
                for env in envs.iter() {
                    for &value in env.values() {
                        buf.put_i32_le(value);
                    }
                }
            }
            None => put_dpcm(&mut buf, channels.dpcm()),
        }
    }
    debug!(bytes = buf.len(), "state saved");
    buf.to_vec()
}

/// Replaces envelope tables and the DPCM bank from `blob`. On error nothing
/// is changed.
pub fn load(channels: &mut ChannelSet, blob: &[u8]) -> Result<(), StateError> {
    let snapshot = Snapshot::decode(blob)?;
    for (id, tables) in &snapshot.envelopes {
        if let Some(envs) = channels.get_mut(*id).envelopes_mut() {
            for (kind, values) in EnvelopeKind::ALL.into_iter().zip(tables) {
                envs.get_mut(kind).set_values(values);
            }
        }
    }
    debug!(
        samples = snapshot.dpcm.samples().len(),
        bytes = blob.len(),
        "state loaded"
    );
    *channels.dpcm_mut() = snapshot.dpcm;
    Ok(())
}

fn put_dpcm(buf: &mut BytesMut, dpcm: &DpcmSampleTable) {
    buf.put_u64_le(dpcm.samples().len() as u64);
    for sample in dpcm.samples() {
        buf.put_u32_le(sample.name().len() as u32);
        buf.put_slice(sample.name().as_bytes());
        buf.put_u64_le(sample.len() as u64);
        buf.put_slice(sample.data());
    }

    buf.put_u64_le(dpcm.patches().len() as u64);
    for patch in dpcm.patches() {
        buf.put_i32_le(patch.pitch as i32);
        buf.put_u8(patch.looped as u8);
        buf.put_i32_le(patch.sample.map_or(-1, |i| i as i32));
    }
}

impl Snapshot {
    fn decode(mut buf: &[u8]) -> Result<Self, StateError> {
        let mut envelopes = Vec::with_capacity(ChannelId::COUNT);
        let mut dpcm = DpcmSampleTable::new();

        for id in ChannelId::ALL {
            if id == ChannelId::Dpcm {
                dpcm = take_dpcm(&mut buf)?;
                continue;
            }
            need(&buf, EnvelopeKind::COUNT * MAX_STEPS * 4)?;
            let mut tables = [[0; MAX_STEPS]; EnvelopeKind::COUNT];
            for value in tables.iter_mut().flatten() {
                *value = buf.get_i32_le();
            }
            envelopes.push((id, tables));
        }

        if buf.has_remaining() {
            return Err(StateError::TrailingBytes(buf.remaining()));
        }
        Ok(Self { envelopes, dpcm })
    }
}

fn take_dpcm(buf: &mut &[u8]) -> Result<DpcmSampleTable, StateError> {
    need(buf, 8)?;
    let sample_count = buf.get_u64_le();
    let mut samples = Vec::new();
    for _ in 0..sample_count {
        need(buf, 4)?;
        let name_len = buf.get_u32_le() as usize;
        need(buf, name_len)?;
        let name = std::str::from_utf8(&buf[..name_len])
            .map_err(|_| StateError::InvalidUtf8)?
            .to_owned();
        buf.advance(name_len);

        need(buf, 8)?;
        let data_len = usize::try_from(buf.get_u64_le()).unwrap_or(usize::MAX);
        if data_len > SAMPLE_WINDOW_LEN {
            return Err(StateError::SampleTooLarge(data_len));
        }
        need(buf, data_len)?;
        let data = buf[..data_len].to_vec();
        buf.advance(data_len);
        samples.push(DpcmSample::new(name, data));
    }

    need(buf, 8)?;
    let patch_count = buf.get_u64_le();
    if patch_count != PATCH_COUNT as u64 {
        warn!(patch_count, expected = PATCH_COUNT, "unexpected DPCM patch count");
    }
    let mut patches = [DpcmPatch::default(); PATCH_COUNT];
    for i in 0..patch_count {
        need(buf, 9)?;
        let pitch = buf.get_i32_le();
        let looped = buf.get_u8() != 0;
        let sample = buf.get_i32_le();
        if let Some(slot) = usize::try_from(i).ok().and_then(|i| patches.get_mut(i)) {
            *slot = DpcmPatch {
                pitch: pitch.clamp(0, MAX_PITCH as i32) as u8,
                looped,
                sample: usize::try_from(sample).ok(),
            };
        }
    }

    Ok(DpcmSampleTable::from_parts(samples, patches))
}

fn need(buf: &&[u8], needed: usize) -> Result<(), StateError> {
    if buf.remaining() < needed {
        return Err(StateError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}
