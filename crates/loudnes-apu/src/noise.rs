//! Noise channel driven by a 15-bit LFSR.

use crate::{envelope::Envelope, length_counter::LengthCounter, tables::NOISE_PERIOD_TABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Noise {
    envelope: Envelope,
    length: LengthCounter,
    short_mode: bool,
    timer_period: u16,
    timer: u16,
    shift_register: u16,
    enabled: bool,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            length: LengthCounter::default(),
            short_mode: false,
            timer_period: NOISE_PERIOD_TABLE[0],
            timer: 0,
            shift_register: 1,
            enabled: false,
        }
    }
}

impl Noise {
    pub(crate) fn write_control(&mut self, value: u8) {
        self.envelope.configure(value);
    }

    pub(crate) fn write_mode_and_period(&mut self, value: u8) {
        self.short_mode = value & 0b1000_0000 != 0;
        self.timer_period = NOISE_PERIOD_TABLE[(value & 0b0000_1111) as usize];
    }

    pub(crate) fn write_length(&mut self, value: u8) {
        self.length.load(value >> 3, self.enabled);
        self.envelope.restart();
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.length.clear();
        }
    }

    pub(crate) fn clock_timer(&mut self) {
        if self.timer == 0 {
            self.timer = self.timer_period;
            self.step_lfsr();
        } else {
            self.timer -= 1;
        }
    }

    fn step_lfsr(&mut self) {
        let tap = if self.short_mode { 6 } else { 1 };
        let bit = (self.shift_register ^ (self.shift_register >> tap)) & 1;
        self.shift_register >>= 1;
        self.shift_register |= bit << 14;
    }

    pub(crate) fn clock_envelope(&mut self) {
        self.envelope.clock();
    }

    pub(crate) fn clock_length(&mut self) {
        self.length.clock(self.envelope.halt_length());
    }

    pub(crate) fn output(&self) -> u8 {
        if !self.enabled || !self.length.active() || (self.shift_register & 1) != 0 {
            0
        } else {
            self.envelope.output()
        }
    }
}
