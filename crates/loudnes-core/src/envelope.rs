//! Step-sequenced modulation envelopes.
//!
//! An envelope plays its value table once per emulation frame. `step` counts
//! raw frames; the table index is `step / speed_divider`. While a note is held
//! (`Initial`) playback loops between `loop_point` and `release_point`; after
//! note-off (`Release`) it runs from `release_point` to `length` and stops.

use strum::FromRepr;

pub const MAX_STEPS: usize = 64;
pub const MAX_SPEED_DIVIDER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnvelopeState {
    Initial,
    Release,
    #[default]
    Off,
}

/// Which channel parameter an envelope drives. The discriminant is the
/// envelope's slot in a channel and in the persisted state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
pub enum EnvelopeKind {
    Volume = 0,
    Duty = 1,
    Arpeggio = 2,
    Pitch = 3,
}

impl EnvelopeKind {
    pub const COUNT: usize = 4;
    pub const ALL: [EnvelopeKind; Self::COUNT] = [
        EnvelopeKind::Volume,
        EnvelopeKind::Duty,
        EnvelopeKind::Arpeggio,
        EnvelopeKind::Pitch,
    ];

    /// Value every step starts with.
    pub const fn default_value(self) -> i32 {
        match self {
            EnvelopeKind::Volume => 15,
            EnvelopeKind::Duty => 2,
            EnvelopeKind::Arpeggio | EnvelopeKind::Pitch => 0,
        }
    }

    /// Inclusive `(min, max)` of a step value.
    pub const fn range(self) -> (i32, i32) {
        match self {
            EnvelopeKind::Volume => (0, 15),
            EnvelopeKind::Duty => (0, 7),
            EnvelopeKind::Arpeggio | EnvelopeKind::Pitch => (-12, 12),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            EnvelopeKind::Volume => "Volume",
            EnvelopeKind::Duty => "Duty",
            EnvelopeKind::Arpeggio => "Pitch",
            EnvelopeKind::Pitch => "Fine Pitch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    kind: EnvelopeKind,
    values: [i32; MAX_STEPS],
    step: usize,
    loop_point: usize,
    release_point: usize,
    length: usize,
    speed_divider: usize,
    state: EnvelopeState,
}

impl Envelope {
    pub const DEFAULT_LOOP: usize = 15;
    pub const DEFAULT_RELEASE: usize = 16;
    pub const DEFAULT_LENGTH: usize = 16;
    pub const DEFAULT_SPEED_DIVIDER: usize = 1;

    pub fn new(kind: EnvelopeKind) -> Self {
        Self {
            kind,
            values: [kind.default_value(); MAX_STEPS],
            step: 0,
            loop_point: Self::DEFAULT_LOOP,
            release_point: Self::DEFAULT_RELEASE,
            length: Self::DEFAULT_LENGTH,
            speed_divider: Self::DEFAULT_SPEED_DIVIDER,
            state: EnvelopeState::Off,
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    pub fn is_off(&self) -> bool {
        self.state == EnvelopeState::Off
    }

    /// Raw frame counter, in `speed_divider` units.
    pub fn raw_step(&self) -> usize {
        self.step
    }

    pub fn loop_point(&self) -> usize {
        self.loop_point
    }

    pub fn release_point(&self) -> usize {
        self.release_point
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn speed_divider(&self) -> usize {
        self.speed_divider
    }

    pub fn values(&self) -> &[i32; MAX_STEPS] {
        &self.values
    }

    /// Restarts playback from the first step.
    pub fn trigger(&mut self) {
        self.state = EnvelopeState::Initial;
        self.step = 0;
    }

    /// Jumps to the release tail, or stops when there is none.
    pub fn release(&mut self) {
        self.step = self.release_point * self.speed_divider;
        self.state = if self.release_point < self.length {
            EnvelopeState::Release
        } else {
            EnvelopeState::Off
        };
    }

    /// Silences the envelope without playing any release tail.
    pub fn stop(&mut self) {
        self.state = EnvelopeState::Off;
        self.step = 0;
    }

    /// Returns the current step's value and advances one frame.
    ///
    /// Must be called exactly once per frame for the envelope to keep time.
    pub fn value_and_advance(&mut self) -> i32 {
        let index = self.step / self.speed_divider;
        self.step += 1;
        match self.state {
            EnvelopeState::Off => return 0,
            EnvelopeState::Initial => {
                if self.step >= self.release_point * self.speed_divider {
                    self.step = self.loop_point * self.speed_divider;
                }
                self.stop_at_length();
            }
            EnvelopeState::Release => self.stop_at_length(),
        }
        self.values.get(index).copied().unwrap_or_default()
    }

    fn stop_at_length(&mut self) {
        if self.step >= self.length * self.speed_divider {
            self.state = EnvelopeState::Off;
        }
    }

    /// Table index of the next value, or `None` once the envelope is off.
    pub fn step(&self) -> Option<usize> {
        match self.state {
            EnvelopeState::Off => None,
            _ => Some(self.step / self.speed_divider),
        }
    }

    pub fn set_length(&mut self, length: i32) {
        self.length = clamp_to(length, 1, MAX_STEPS);
        if self.release_point > self.length {
            self.release_point = self.length;
        }
        if self.loop_point >= self.length {
            self.loop_point = self.length - 1;
        }
    }

    pub fn set_loop(&mut self, loop_point: i32) {
        self.loop_point = clamp_to(loop_point, 0, MAX_STEPS - 1);
        if self.release_point <= self.loop_point {
            self.release_point = self.loop_point + 1;
        }
        if self.length <= self.loop_point {
            self.length = self.loop_point + 1;
        }
    }

    pub fn set_release(&mut self, release_point: i32) {
        self.release_point = clamp_to(release_point, 1, MAX_STEPS);
        if self.loop_point >= self.release_point {
            self.loop_point = self.release_point - 1;
        }
        if self.length < self.release_point {
            self.length = self.release_point;
        }
    }

    /// Changes the frames-per-step divider, rescaling the playback position
    /// so it stays at the same point in real time.
    pub fn set_speed_divider(&mut self, speed_divider: i32) {
        let divider = clamp_to(speed_divider, 1, MAX_SPEED_DIVIDER);
        self.step = (self.step * divider / self.speed_divider).min(MAX_STEPS * divider - 1);
        self.speed_divider = divider;
    }

    /// Stores `value` clamped to the envelope's range and returns what was
    /// stored. Out-of-range steps are ignored.
    pub fn set_value(&mut self, step: usize, value: i32) -> Option<i32> {
        let (min, max) = self.kind.range();
        let slot = self.values.get_mut(step)?;
        *slot = value.clamp(min, max);
        Some(*slot)
    }

    /// Replaces the whole table, clamping every value into range.
    pub fn set_values(&mut self, values: &[i32; MAX_STEPS]) {
        let (min, max) = self.kind.range();
        for (slot, &value) in self.values.iter_mut().zip(values) {
            *slot = value.clamp(min, max);
        }
    }
}

fn clamp_to(value: i32, min: usize, max: usize) -> usize {
    value.clamp(min as i32, max as i32) as usize
}

/// The four envelopes of one tone channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelopes {
    pub volume: Envelope,
    pub duty: Envelope,
    pub arpeggio: Envelope,
    pub pitch: Envelope,
}

impl Default for Envelopes {
    fn default() -> Self {
        Self {
            volume: Envelope::new(EnvelopeKind::Volume),
            duty: Envelope::new(EnvelopeKind::Duty),
            arpeggio: Envelope::new(EnvelopeKind::Arpeggio),
            pitch: Envelope::new(EnvelopeKind::Pitch),
        }
    }
}

impl Envelopes {
    pub fn get(&self, kind: EnvelopeKind) -> &Envelope {
        match kind {
            EnvelopeKind::Volume => &self.volume,
            EnvelopeKind::Duty => &self.duty,
            EnvelopeKind::Arpeggio => &self.arpeggio,
            EnvelopeKind::Pitch => &self.pitch,
        }
    }

    pub fn get_mut(&mut self, kind: EnvelopeKind) -> &mut Envelope {
        match kind {
            EnvelopeKind::Volume => &mut self.volume,
            EnvelopeKind::Duty => &mut self.duty,
            EnvelopeKind::Arpeggio => &mut self.arpeggio,
            EnvelopeKind::Pitch => &mut self.pitch,
        }
    }

    /// Envelopes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        [&self.volume, &self.duty, &self.arpeggio, &self.pitch].into_iter()
    }

    pub fn trigger(&mut self) {
        for kind in EnvelopeKind::ALL {
            self.get_mut(kind).trigger();
        }
    }

    pub fn release(&mut self) {
        for kind in EnvelopeKind::ALL {
            self.get_mut(kind).release();
        }
    }

    pub fn stop(&mut self) {
        for kind in EnvelopeKind::ALL {
            self.get_mut(kind).stop();
        }
    }

    /// Current step of each envelope in slot order.
    pub fn steps(&self) -> [Option<usize>; EnvelopeKind::COUNT] {
        EnvelopeKind::ALL.map(|kind| self.get(kind).step())
    }
}
