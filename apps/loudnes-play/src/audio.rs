use anyhow::{Context, Result};
use cpal::{
    SampleFormat,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use ringbuf::{
    HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};
use tracing::{info, warn};

/// Ring buffer depth in seconds.
const LATENCY_SECONDS: f32 = 0.1;

/// Default output stream. Dropping it stops playback.
pub struct AudioOutput {
    sample_rate: u32,
    _stream: cpal::Stream,
}

/// Render-thread end of the ring buffer. Takes interleaved stereo frames.
pub struct SampleSink {
    producer: ringbuf::HeapProd<f32>,
}

impl AudioOutput {
    /// Opens the default output device, at `sample_rate` when given.
    ///
    /// Only `f32` devices are supported.
    pub fn open(sample_rate: Option<u32>) -> Result<(Self, SampleSink)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no default output device")?;

        let supported_config = device
            .default_output_config()
            .context("no default output config")?;

        let sample_format = supported_config.sample_format();
        if sample_format != SampleFormat::F32 {
            anyhow::bail!("only f32 output format is supported, got {sample_format:?}");
        }

        let mut config: cpal::StreamConfig = supported_config.into();
        if let Some(rate) = sample_rate {
            config.sample_rate = rate;
        }
        let sample_rate = config.sample_rate;
        let channels = config.channels as usize;

        let capacity = (sample_rate as f32 * LATENCY_SECONDS * 2.0).ceil() as usize;
        let (producer, mut consumer) = HeapRb::<f32>::new(capacity.max(2)).split();

        let err_fn = |err| warn!(%err, "audio stream error");

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _| {
                for frame in data.chunks_mut(channels) {
                    let left = consumer.try_pop().unwrap_or(0.0);
                    let right = consumer.try_pop().unwrap_or(left);

                    match frame {
                        [] => {}
                        [mono] => *mono = (left + right) * 0.5,
                        [l, r, rest @ ..] => {
                            *l = left;
                            *r = right;
                            rest.fill(right);
                        }
                    }
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;
        info!(sample_rate, channels, "audio output opened");

        Ok((
            Self {
                sample_rate,
                _stream: stream,
            },
            SampleSink { producer },
        ))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl SampleSink {
    /// Stereo frames that fit without dropping.
    pub fn free_frames(&self) -> usize {
        self.producer.vacant_len() / 2
    }

    /// Interleaves and queues one block. Frames that do not fit are dropped.
    pub fn push(&mut self, left: &[f32], right: &[f32]) {
        for (&l, &r) in left.iter().zip(right) {
            let _ = self.producer.try_push(l.clamp(-1.0, 1.0));
            let _ = self.producer.try_push(r.clamp(-1.0, 1.0));
        }
    }
}
