//! Note-to-period lookup tables for every supported oscillator family.
//!
//! Tables are indexed from C at 32.7032 Hz (MIDI note 24). The 97th entry is
//! always zero.

use core::fmt;

use crate::ChannelId;

pub const NOTE_TABLE_LEN: usize = 97;
pub type NoteTable = [u16; NOTE_TABLE_LEN];

pub const CPU_CLOCK_NTSC: f64 = 1_789_773.0;
pub const CPU_CLOCK_PAL: f64 = 1_662_607.0;
/// Frequency of MIDI note 0.
pub const NOTE_ZERO_FREQ: f64 = 8.175_798_915_6;

/// First table entry.
const TABLE_BASE_FREQ: f64 = 32.7032;
const TABLED_NOTES: usize = 96;

pub const MAX_PERIOD_11_BIT: u16 = 0x07FF;
pub const MAX_PERIOD_12_BIT: u16 = 0x0FFF;
pub const MIN_PERIOD: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Region {
    #[default]
    Ntsc,
    Pal,
}

impl Region {
    /// Pulse/triangle/noise timers tick at CPU clock / 16 per output step.
    pub fn timer_clock(self) -> f64 {
        match self {
            Region::Ntsc => CPU_CLOCK_NTSC / 16.0,
            Region::Pal => CPU_CLOCK_PAL / 16.0,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Ntsc => "ntsc",
            Region::Pal => "pal",
        };
        f.write_str(s)
    }
}

/// Immutable period tables, built once per engine and shared by every
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteTables {
    ntsc: NoteTable,
    pal: NoteTable,
    vrc6_saw: NoteTable,
    vrc7: NoteTable,
    fds: NoteTable,
}

impl Default for NoteTables {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteTables {
    pub fn new() -> Self {
        let clock_ntsc = Region::Ntsc.timer_clock();
        let clock_pal = Region::Pal.timer_clock();

        let mut tables = Self {
            ntsc: [0; NOTE_TABLE_LEN],
            pal: [0; NOTE_TABLE_LEN],
            vrc6_saw: [0; NOTE_TABLE_LEN],
            vrc7: [0; NOTE_TABLE_LEN],
            fds: [0; NOTE_TABLE_LEN],
        };

        for i in 0..TABLED_NOTES {
            let octave = i / 12;
            let freq = TABLE_BASE_FREQ * 2f64.powf(i as f64 / 12.0);

            tables.ntsc[i] = (clock_ntsc / freq - 0.5) as u16;
            tables.pal[i] = (clock_pal / freq - 0.5) as u16;
            tables.vrc6_saw[i] = ((clock_ntsc * 16.0) / (freq * 14.0) - 0.5) as u16;
            tables.fds[i] = ((freq * 65536.0) / clock_ntsc + 0.5) as u16;
            tables.vrc7[i] = if octave == 0 {
                (freq * 262_144.0 / 49_716.0 + 0.5) as u16
            } else {
                tables.vrc7[i % 12] << octave
            };
        }
        tables
    }

    pub fn ntsc(&self) -> &NoteTable {
        &self.ntsc
    }

    pub fn pal(&self) -> &NoteTable {
        &self.pal
    }

    pub fn vrc6_saw(&self) -> &NoteTable {
        &self.vrc6_saw
    }

    /// VRC7 F-numbers, shifted up one bit per octave.
    pub fn vrc7(&self) -> &NoteTable {
        &self.vrc7
    }

    /// FDS frequency register values.
    pub fn fds(&self) -> &NoteTable {
        &self.fds
    }

    /// Table used by `channel` in table pitch mode.
    pub fn for_channel(&self, channel: ChannelId, region: Region) -> &NoteTable {
        match (channel, region) {
            (ChannelId::Vrc6Saw, _) => &self.vrc6_saw,
            (_, Region::Ntsc) => &self.ntsc,
            (_, Region::Pal) => &self.pal,
        }
    }
}

/// Largest period register value `channel` can hold.
pub fn max_period(channel: ChannelId) -> u16 {
    match channel {
        ChannelId::Vrc6Pulse1 | ChannelId::Vrc6Pulse2 | ChannelId::Vrc6Saw => MAX_PERIOD_12_BIT,
        _ => MAX_PERIOD_11_BIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a440_entries() {
        let tables = NoteTables::new();
        assert_eq!(tables.ntsc()[45], 253);
        assert_eq!(tables.pal()[45], 235);
        assert_eq!(tables.vrc6_saw()[45], 290);
        assert_eq!(tables.fds()[45], 258);
    }

    #[test]
    fn vrc7_doubles_per_octave() {
        let tables = NoteTables::new();
        assert_eq!(tables.vrc7()[0], 172);
        assert_eq!(tables.vrc7()[12], 344);
        assert_eq!(tables.vrc7()[25], tables.vrc7()[1] << 2);
    }

    #[test]
    fn last_entry_is_zero_and_periods_fall() {
        let tables = NoteTables::new();
        for table in [tables.ntsc(), tables.pal(), tables.vrc6_saw()] {
            assert_eq!(table[TABLED_NOTES], 0);
            assert!(table[..TABLED_NOTES].windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn saw_uses_its_own_table() {
        let tables = NoteTables::new();
        assert_eq!(
            tables.for_channel(ChannelId::Vrc6Saw, Region::Pal),
            tables.vrc6_saw()
        );
        assert_eq!(tables.for_channel(ChannelId::Pulse1, Region::Pal), tables.pal());
        assert_eq!(max_period(ChannelId::Triangle), MAX_PERIOD_11_BIT);
        assert_eq!(max_period(ChannelId::Vrc6Saw), MAX_PERIOD_12_BIT);
    }
}
