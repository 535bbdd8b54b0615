//! DPCM sample bank and the per-pitch-class patch map.
//!
//! Samples are packed back to back into the DMC's 16 KiB window at `$C000`,
//! each one starting on a 64-byte boundary because that is the granularity
//! of the `$4012` address register.

use tracing::warn;

/// First CPU address of the DMC sample window.
pub const SAMPLE_WINDOW_BASE: u16 = 0xC000;
pub const SAMPLE_WINDOW_LEN: usize = 0x4000;
pub const SAMPLE_ALIGN: usize = 64;
pub const PATCH_COUNT: usize = 12;
/// Alternating bits: the DAC steps up and down and stays put.
pub const DPCM_SILENCE: u8 = 0x55;
pub const MAX_PITCH: u8 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpcmSample {
    name: String,
    data: Vec<u8>,
}

impl DpcmSample {
    /// Takes `data` verbatim.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Builds a sample from a ripped `.dmc` image. Zero padding before the
    /// final byte is rewritten to DPCM silence so the tail does not pop.
    pub fn from_dmc(name: impl Into<String>, mut data: Vec<u8>) -> Self {
        let body = data.len().saturating_sub(1);
        for byte in data[..body].iter_mut().rev() {
            if *byte != 0 {
                break;
            }
            *byte = DPCM_SILENCE;
        }
        Self::new(name, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DpcmPatch {
    /// DMC rate index, 0 (slowest) to 15.
    pub pitch: u8,
    pub looped: bool,
    pub sample: Option<usize>,
}

impl Default for DpcmPatch {
    fn default() -> Self {
        Self {
            pitch: MAX_PITCH,
            looped: false,
            sample: None,
        }
    }
}

impl DpcmPatch {
    pub fn new(sample: usize) -> Self {
        Self {
            sample: Some(sample),
            ..Self::default()
        }
    }
}

/// Register values that start one sample on the DMC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DmcStart {
    /// `$4012`: (address - `$C000`) / 64.
    pub(crate) address: u8,
    /// `$4013`: byte length / 16.
    pub(crate) length: u8,
    /// `$4010`: loop flag and rate index.
    pub(crate) control: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DpcmSampleTable {
    samples: Vec<DpcmSample>,
    patches: [DpcmPatch; PATCH_COUNT],
}

impl DpcmSampleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(samples: Vec<DpcmSample>, patches: [DpcmPatch; PATCH_COUNT]) -> Self {
        Self { samples, patches }
    }

    pub fn samples(&self) -> &[DpcmSample] {
        &self.samples
    }

    pub fn patches(&self) -> &[DpcmPatch; PATCH_COUNT] {
        &self.patches
    }

    /// Appends a sample and returns its index.
    pub fn add_sample(&mut self, sample: DpcmSample) -> usize {
        self.samples.push(sample);
        let end = self.packed_len();
        if end > SAMPLE_WINDOW_LEN {
            warn!(
                end,
                window = SAMPLE_WINDOW_LEN,
                "DPCM samples overflow the DMC window; later samples cannot play"
            );
        }
        self.samples.len() - 1
    }

    /// Assigns `patch` to a pitch class (taken modulo 12). The rate index is
    /// clamped to 0..=15.
    pub fn set_patch(&mut self, pitch_class: usize, patch: DpcmPatch) {
        self.patches[pitch_class % PATCH_COUNT] = DpcmPatch {
            pitch: patch.pitch.min(MAX_PITCH),
            ..patch
        };
    }

    pub fn patch_for_note(&self, note: i32) -> &DpcmPatch {
        &self.patches[note.rem_euclid(PATCH_COUNT as i32) as usize]
    }

    /// Offset of sample `index` inside the window.
    pub fn address_of(&self, index: usize) -> Option<usize> {
        self.packed_offsets().nth(index).map(|(addr, _)| addr)
    }

    /// Byte the DMC reads at CPU address `cpu_addr`. Gaps between samples
    /// and anything outside them read as silence.
    pub fn byte_at(&self, cpu_addr: u16) -> u8 {
        let Some(offset) = cpu_addr.checked_sub(SAMPLE_WINDOW_BASE) else {
            return DPCM_SILENCE;
        };
        let offset = offset as usize;
        for (addr, sample) in self.packed_offsets() {
            if offset < addr {
                break;
            }
            if offset < addr + sample.len() {
                return sample.data[offset - addr];
            }
        }
        DPCM_SILENCE
    }

    /// Registers for playing the patch mapped to `note`, if it has a sample
    /// that fits the address register.
    pub(crate) fn start_for_note(&self, note: i32) -> Option<DmcStart> {
        let patch = self.patch_for_note(note);
        let index = patch.sample?;
        let sample = self.samples.get(index)?;
        let address = self.address_of(index)? / SAMPLE_ALIGN;
        let address = u8::try_from(address).ok()?;
        let length = u8::try_from(sample.len() >> 4).unwrap_or(u8::MAX);

        Some(DmcStart {
            address,
            length,
            control: patch.pitch | if patch.looped { 0b0100_0000 } else { 0 },
        })
    }

    fn packed_offsets(&self) -> impl Iterator<Item = (usize, &DpcmSample)> {
        self.samples.iter().scan(0usize, |next, sample| {
            let addr = *next;
            *next = align_up(addr + sample.len());
            Some((addr, sample))
        })
    }

    fn packed_len(&self) -> usize {
        self.samples
            .iter()
            .fold(0, |addr, sample| align_up(addr + sample.len()))
    }
}

fn align_up(addr: usize) -> usize {
    (addr + SAMPLE_ALIGN - 1) & !(SAMPLE_ALIGN - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(lengths: &[usize]) -> DpcmSampleTable {
        let mut table = DpcmSampleTable::new();
        for (i, &len) in lengths.iter().enumerate() {
            table.add_sample(DpcmSample::new(format!("s{i}"), vec![i as u8 + 1; len]));
        }
        table
    }

    #[test]
    fn samples_pack_on_64_byte_boundaries() {
        let table = table_with(&[100, 50, 64, 1]);
        assert_eq!(table.address_of(0), Some(0));
        assert_eq!(table.address_of(1), Some(128));
        assert_eq!(table.address_of(2), Some(192));
        assert_eq!(table.address_of(3), Some(256));
        assert_eq!(table.address_of(4), None);
    }

    #[test]
    fn reads_follow_packing_and_gaps_are_silent() {
        let table = table_with(&[100, 50]);
        assert_eq!(table.byte_at(0xC000), 1);
        assert_eq!(table.byte_at(0xC000 + 99), 1);
        assert_eq!(table.byte_at(0xC000 + 100), DPCM_SILENCE);
        assert_eq!(table.byte_at(0xC000 + 128), 2);
        assert_eq!(table.byte_at(0xC000 + 178), DPCM_SILENCE);
        assert_eq!(table.byte_at(0x8000), DPCM_SILENCE);
    }

    #[test]
    fn zero_tail_becomes_silence_except_last_byte() {
        let sample = DpcmSample::from_dmc("kick", vec![0x12, 0x00, 0x34, 0x00, 0x00, 0x00]);
        assert_eq!(sample.data(), [0x12, 0x00, 0x34, 0x55, 0x55, 0x00]);

        let untouched = DpcmSample::from_dmc("x", vec![0x00]);
        assert_eq!(untouched.data(), [0x00]);
        assert!(DpcmSample::from_dmc("empty", Vec::new()).is_empty());
    }

    #[test]
    fn patches_cycle_by_pitch_class() {
        let mut table = table_with(&[17]);
        table.set_patch(
            2,
            DpcmPatch {
                pitch: 40,
                looped: true,
                sample: Some(0),
            },
        );
        assert_eq!(table.patch_for_note(62).pitch, MAX_PITCH);
        assert!(table.patch_for_note(38).looped);
        assert_eq!(table.patch_for_note(63).sample, None);

        table.set_patch(14, DpcmPatch::new(0));
        assert!(!table.patch_for_note(2).looped);
    }

    #[test]
    fn start_registers_encode_address_length_and_rate() {
        let mut table = table_with(&[100, 513]);
        table.set_patch(0, DpcmPatch { pitch: 9, looped: true, sample: Some(1) });
        let start = table.start_for_note(60).expect("patch has a sample");
        assert_eq!(start.address, 2);
        assert_eq!(start.length, 32);
        assert_eq!(start.control, 0x49);
    }

    #[test]
    fn unmapped_or_unreachable_samples_do_not_start() {
        let mut table = table_with(&[SAMPLE_WINDOW_LEN, 10]);
        assert_eq!(table.start_for_note(0), None);

        table.set_patch(0, DpcmPatch::new(7));
        assert_eq!(table.start_for_note(0), None);

        table.set_patch(0, DpcmPatch::new(1));
        assert_eq!(table.start_for_note(0), None);

        table.set_patch(0, DpcmPatch::new(0));
        let start = table.start_for_note(0).expect("first sample fits");
        assert_eq!(start.length, u8::MAX);
    }
}
