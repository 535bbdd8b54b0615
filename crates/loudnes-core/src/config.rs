//! Engine construction settings.

use std::ops::RangeInclusive;

use crate::{Error, note_table::Region};

pub const SAMPLE_RATE_RANGE: RangeInclusive<u32> = loudnes_apu::SAMPLE_RATE_RANGE;
pub const BLOCK_SIZE_RANGE: RangeInclusive<usize> = 1..=8192;

/// How a channel turns note, arpeggio and fine pitch into a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PitchMode {
    /// Frequency is computed from the note number; fine pitch is measured in
    /// twelfths of a semitone.
    #[default]
    Relative,
    /// Period comes from the region's note table; fine pitch is subtracted
    /// from the table period directly.
    Table,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Host output rate in Hz.
    pub sample_rate: u32,
    /// Largest block rendered in one pass. Bigger host blocks are split.
    pub max_block_size: usize,
    /// Pitch wheel range in semitones.
    pub pitch_bend_range: u8,
    pub pitch_mode: PitchMode,
    /// Only consulted by [`PitchMode::Table`].
    pub region: Region,
    /// Depth of the envelope-step and parameter feedback queues.
    pub telemetry_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            max_block_size: 4096,
            pitch_bend_range: 2,
            pitch_mode: PitchMode::Relative,
            region: Region::Ntsc,
            telemetry_capacity: 8,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !SAMPLE_RATE_RANGE.contains(&self.sample_rate) {
            return Err(Error::InvalidSampleRate(self.sample_rate));
        }
        if !BLOCK_SIZE_RANGE.contains(&self.max_block_size) {
            return Err(Error::InvalidBlockSize(self.max_block_size));
        }
        Ok(())
    }
}
