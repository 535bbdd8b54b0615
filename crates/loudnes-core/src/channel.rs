//! Musical channels: note, velocity and envelope state turned into chip
//! register writes once per emulation frame.

mod dpcm;
mod noise;
mod pulse;
mod triangle;
mod vrc6;

use std::sync::Arc;

use loudnes_apu::{ApuChannel, RegisterWriter};
use strum::{EnumString, FromRepr, IntoStaticStr};

use crate::{
    config::PitchMode,
    dpcm::DpcmSampleTable,
    envelope::Envelopes,
    note_table::{self, MIN_PERIOD, NOTE_TABLE_LEN, NOTE_ZERO_FREQ, NoteTables, Region},
};

use self::{
    dpcm::DpcmChannel, noise::NoiseChannel, pulse::PulseChannel, triangle::TriangleChannel,
    vrc6::{Vrc6PulseChannel, Vrc6SawChannel},
};

/// Note played by channels with key tracking switched off.
pub const FIXED_NOTE: i32 = 64;
const DEFAULT_BASE_NOTE: i32 = 48;

/// One physical oscillator, in chip and persisted-state order.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ChannelId {
    Pulse1 = 0,
    Pulse2 = 1,
    Triangle = 2,
    Noise = 3,
    Dpcm = 4,
    Vrc6Pulse1 = 5,
    Vrc6Pulse2 = 6,
    Vrc6Saw = 7,
}

impl ChannelId {
    pub const COUNT: usize = 8;
    pub const ALL: [ChannelId; Self::COUNT] = [
        ChannelId::Pulse1,
        ChannelId::Pulse2,
        ChannelId::Triangle,
        ChannelId::Noise,
        ChannelId::Dpcm,
        ChannelId::Vrc6Pulse1,
        ChannelId::Vrc6Pulse2,
        ChannelId::Vrc6Saw,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn apu_channel(self) -> ApuChannel {
        match self {
            ChannelId::Pulse1 => ApuChannel::Pulse1,
            ChannelId::Pulse2 => ApuChannel::Pulse2,
            ChannelId::Triangle => ApuChannel::Triangle,
            ChannelId::Noise => ApuChannel::Noise,
            ChannelId::Dpcm => ApuChannel::Dmc,
            ChannelId::Vrc6Pulse1 => ApuChannel::Vrc6Pulse1,
            ChannelId::Vrc6Pulse2 => ApuChannel::Vrc6Pulse2,
            ChannelId::Vrc6Saw => ApuChannel::Vrc6Saw,
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            ChannelId::Pulse1 => "Pulse 1",
            ChannelId::Pulse2 => "Pulse 2",
            ChannelId::Triangle => "Triangle",
            ChannelId::Noise => "Noise",
            ChannelId::Dpcm => "DPCM",
            ChannelId::Vrc6Pulse1 => "VRC6 Pulse 1",
            ChannelId::Vrc6Pulse2 => "VRC6 Pulse 2",
            ChannelId::Vrc6Saw => "VRC6 Saw",
        }
    }
}

/// State every channel kind shares.
#[derive(Debug, Clone)]
pub(crate) struct ChannelCore {
    id: ChannelId,
    tables: Arc<NoteTables>,
    pitch_mode: PitchMode,
    region: Region,
    base_note: i32,
    velocity: f64,
    pitch_bend: f64,
    pitch_bend_ratio: f64,
    key_track: bool,
    velocity_sensitive: bool,
}

impl ChannelCore {
    fn new(id: ChannelId, tables: Arc<NoteTables>, pitch_mode: PitchMode, region: Region) -> Self {
        Self {
            id,
            tables,
            pitch_mode,
            region,
            base_note: DEFAULT_BASE_NOTE,
            velocity: 1.0,
            pitch_bend: 0.0,
            pitch_bend_ratio: 1.0,
            key_track: true,
            velocity_sensitive: true,
        }
    }

    pub(crate) fn base_note(&self) -> i32 {
        self.base_note
    }

    fn note_on(&mut self, note: u8, velocity: f64, retrigger: bool) {
        self.base_note = if self.key_track {
            note as i32
        } else {
            FIXED_NOTE
        };
        if retrigger {
            self.velocity = if self.velocity_sensitive {
                velocity.clamp(0.0, 1.0)
            } else {
                1.0
            };
        }
    }

    /// Reads the arpeggio and fine pitch envelopes (advancing both) and
    /// returns the clamped period register value.
    pub(crate) fn period(&self, envs: &mut Envelopes) -> u16 {
        let arp = envs.arpeggio.value_and_advance();
        let fine = envs.pitch.value_and_advance();
        let ideal = match self.pitch_mode {
            PitchMode::Relative => self.relative_period(arp, fine),
            PitchMode::Table => self.table_period(arp, fine),
        };
        (ideal as u16).clamp(MIN_PERIOD, note_table::max_period(self.id))
    }

    fn relative_period(&self, arp: i32, fine: i32) -> f64 {
        let note = (self.base_note + arp) as f64 + fine as f64 / 12.0;
        let freq = NOTE_ZERO_FREQ * 2f64.powf(note / 12.0) * self.pitch_bend_ratio;
        let clock = Region::Ntsc.timer_clock();
        match self.id {
            ChannelId::Vrc6Saw => (clock * 16.0) / (freq * 14.0) - 0.5,
            ChannelId::Triangle => clock / (freq * 2.0) - 0.5,
            _ => clock / freq - 0.5,
        }
    }

    fn table_period(&self, arp: i32, fine: i32) -> f64 {
        // Tables start at MIDI 24; the triangle sounds an octave below its
        // period, so it reads one octave lower in the table.
        let midi_offset = if self.id == ChannelId::Triangle { 12 } else { 24 };
        let index = (self.base_note - midi_offset + arp).clamp(0, NOTE_TABLE_LEN as i32 - 1);
        let table = self.tables.for_channel(self.id, self.region);
        (table[index as usize] as f64 - fine as f64) / self.pitch_bend_ratio
    }

    /// Volume envelope scaled by note velocity, rounded up.
    pub(crate) fn volume(&self, envs: &mut Envelopes) -> u8 {
        let level = envs.volume.value_and_advance() as f64 * self.velocity;
        (level.ceil() as u8).min(15)
    }

    /// 2A03 duty: four settings, the fourth being the inverted 25% wave.
    pub(crate) fn duty(&self, envs: &mut Envelopes) -> u8 {
        envs.duty.value_and_advance().rem_euclid(4) as u8
    }
}

#[derive(Debug, Clone)]
enum ChannelKind {
    Pulse(PulseChannel),
    Triangle(TriangleChannel),
    Noise(NoiseChannel),
    Dpcm(DpcmChannel),
    Vrc6Pulse(Vrc6PulseChannel),
    Vrc6Saw(Vrc6SawChannel),
}

#[derive(Debug, Clone)]
pub struct Channel {
    core: ChannelCore,
    kind: ChannelKind,
}

impl Channel {
    pub fn new(id: ChannelId, tables: Arc<NoteTables>, pitch_mode: PitchMode, region: Region) -> Self {
        let kind = match id {
            ChannelId::Pulse1 | ChannelId::Pulse2 => ChannelKind::Pulse(PulseChannel::new(id)),
            ChannelId::Triangle => ChannelKind::Triangle(TriangleChannel::default()),
            ChannelId::Noise => ChannelKind::Noise(NoiseChannel::default()),
            ChannelId::Dpcm => ChannelKind::Dpcm(DpcmChannel::default()),
            ChannelId::Vrc6Pulse1 | ChannelId::Vrc6Pulse2 => {
                ChannelKind::Vrc6Pulse(Vrc6PulseChannel::new(id))
            }
            ChannelId::Vrc6Saw => ChannelKind::Vrc6Saw(Vrc6SawChannel::default()),
        };
        Self {
            core: ChannelCore::new(id, tables, pitch_mode, region),
            kind,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.core.id
    }

    /// The channel's envelopes; the DPCM channel has none.
    pub fn envelopes(&self) -> Option<&Envelopes> {
        match &self.kind {
            ChannelKind::Pulse(ch) => Some(&ch.envelopes),
            ChannelKind::Triangle(ch) => Some(&ch.envelopes),
            ChannelKind::Noise(ch) => Some(&ch.envelopes),
            ChannelKind::Dpcm(_) => None,
            ChannelKind::Vrc6Pulse(ch) => Some(&ch.envelopes),
            ChannelKind::Vrc6Saw(ch) => Some(&ch.envelopes),
        }
    }

    pub fn envelopes_mut(&mut self) -> Option<&mut Envelopes> {
        match &mut self.kind {
            ChannelKind::Pulse(ch) => Some(&mut ch.envelopes),
            ChannelKind::Triangle(ch) => Some(&mut ch.envelopes),
            ChannelKind::Noise(ch) => Some(&mut ch.envelopes),
            ChannelKind::Dpcm(_) => None,
            ChannelKind::Vrc6Pulse(ch) => Some(&mut ch.envelopes),
            ChannelKind::Vrc6Saw(ch) => Some(&mut ch.envelopes),
        }
    }

    pub fn base_note(&self) -> i32 {
        self.core.base_note
    }

    pub fn velocity(&self) -> f64 {
        self.core.velocity
    }

    pub fn key_track(&self) -> bool {
        self.core.key_track
    }

    pub fn set_key_track(&mut self, enabled: bool) {
        self.core.key_track = enabled;
    }

    pub fn velocity_sensitive(&self) -> bool {
        self.core.velocity_sensitive
    }

    pub fn set_velocity_sensitive(&mut self, enabled: bool) {
        self.core.velocity_sensitive = enabled;
    }

    pub fn pitch_bend_ratio(&self) -> f64 {
        self.core.pitch_bend_ratio
    }

    /// Bends by `octaves`; 1.0 doubles the frequency.
    pub fn set_pitch_bend(&mut self, octaves: f64) {
        if self.core.pitch_bend != octaves {
            self.core.pitch_bend = octaves;
            self.core.pitch_bend_ratio = 2f64.powf(octaves);
        }
    }

    /// Starts `note` at `velocity` (0.0..=1.0). Legato note changes pass
    /// `retrigger = false` and keep envelopes and velocity running.
    pub fn trigger(&mut self, note: u8, velocity: f64, retrigger: bool) {
        match &mut self.kind {
            ChannelKind::Dpcm(ch) => {
                self.core.base_note = note as i32;
                ch.trigger();
            }
            _ => {
                self.core.note_on(note, velocity, retrigger);
                if !retrigger {
                    return;
                }
                if let Some(envs) = self.envelopes_mut() {
                    envs.trigger();
                }
            }
        }
    }

    pub fn release(&mut self) {
        match &mut self.kind {
            ChannelKind::Dpcm(ch) => ch.release(),
            _ => {
                if let Some(envs) = self.envelopes_mut() {
                    envs.release();
                }
            }
        }
    }

    /// Returns to the power-on playback state: envelopes off and no chip
    /// register state assumed. Note, velocity and settings are kept.
    pub fn reset(&mut self) {
        match &mut self.kind {
            ChannelKind::Pulse(ch) => ch.reset(),
            ChannelKind::Dpcm(ch) => ch.reset(),
            _ => {
                if let Some(envs) = self.envelopes_mut() {
                    envs.stop();
                }
            }
        }
    }

    /// Emits this frame's register writes. Call exactly once per emulation
    /// frame.
    pub fn update_apu<W>(&mut self, samples: &DpcmSampleTable, out: &mut W)
    where
        W: RegisterWriter + ?Sized,
    {
        let core = &self.core;
        match &mut self.kind {
            ChannelKind::Pulse(ch) => ch.update_apu(core, out),
            ChannelKind::Triangle(ch) => ch.update_apu(core, out),
            ChannelKind::Noise(ch) => ch.update_apu(core, out),
            ChannelKind::Dpcm(ch) => ch.update_apu(core, samples, out),
            ChannelKind::Vrc6Pulse(ch) => ch.update_apu(core, out),
            ChannelKind::Vrc6Saw(ch) => ch.update_apu(core, out),
        }
    }
}
