//! Pulse channel with its sweep unit.

use crate::{envelope::Envelope, length_counter::LengthCounter, tables::PULSE_DUTY_TABLE};

/// The two pulse channels differ only in how the sweep negates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PulseSlot {
    Pulse1,
    Pulse2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Sweep {
    enabled: bool,
    negate: bool,
    shift: u8,
    period: u8,
    divider: u8,
    reload: bool,
    slot: PulseSlot,
}

impl Sweep {
    fn new(slot: PulseSlot) -> Self {
        Self {
            enabled: false,
            negate: false,
            shift: 0,
            period: 0,
            divider: 0,
            reload: false,
            slot,
        }
    }

    fn write(&mut self, value: u8) {
        self.enabled = value & 0b1000_0000 != 0;
        self.period = (value >> 4) & 0b0000_0111;
        self.negate = value & 0b0000_1000 != 0;
        self.shift = value & 0b0000_0111;
        self.reload = true;
    }

    fn muted(&self, timer_period: u16) -> bool {
        timer_period < 8 || self.target_period(timer_period) > 0x07FF
    }

    fn target_period(&self, timer_period: u16) -> u16 {
        let delta = timer_period >> self.shift;
        if self.negate {
            match self.slot {
                PulseSlot::Pulse1 => timer_period.wrapping_sub(delta).wrapping_sub(1),
                PulseSlot::Pulse2 => timer_period.wrapping_sub(delta),
            }
        } else {
            timer_period.wrapping_add(delta)
        }
    }

    fn clock(&mut self, timer_period: &mut u16) {
        let should_mutate = self.enabled && self.shift != 0 && !self.muted(*timer_period);

        if self.divider == 0 {
            if should_mutate {
                *timer_period = self.target_period(*timer_period);
            }
            self.divider = self.period;
        } else {
            self.divider -= 1;
        }

        if self.reload {
            self.reload = false;
            self.divider = self.period;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Pulse {
    duty: u8,
    duty_pos: u8,
    timer: u16,
    timer_period: u16,
    phase_toggle: bool,
    envelope: Envelope,
    length: LengthCounter,
    sweep: Sweep,
    enabled: bool,
}

impl Pulse {
    pub(crate) fn new(slot: PulseSlot) -> Self {
        Self {
            duty: 0,
            duty_pos: 0,
            timer: 0,
            timer_period: 0,
            phase_toggle: false,
            envelope: Envelope::default(),
            length: LengthCounter::default(),
            sweep: Sweep::new(slot),
            enabled: false,
        }
    }

    pub(crate) fn write_control(&mut self, value: u8) {
        self.duty = (value >> 6) & 0b0000_0011;
        self.envelope.configure(value);
    }

    pub(crate) fn write_sweep(&mut self, value: u8) {
        self.sweep.write(value);
    }

    pub(crate) fn write_timer_low(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0xFF00) | value as u16;
    }

    /// Writing the high byte restarts the waveform, which is the audible
    /// phase reset the sweep-based pitch step avoids.
    pub(crate) fn write_timer_high(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | (((value & 0b0000_0111) as u16) << 8);
        self.duty_pos = 0;
        self.phase_toggle = false;
        self.envelope.restart();
        self.length.load(value >> 3, self.enabled);
        self.timer = self.timer_period;
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
            // The sequencer advances on every other timer reload.
            self.phase_toggle = !self.phase_toggle;
            if self.phase_toggle {
                self.duty_pos = (self.duty_pos + 1) & 0b111;
            }
        } else {
            self.timer -= 1;
        }
    }

    pub(crate) fn clock_envelope(&mut self) {
        self.envelope.clock();
    }

    pub(crate) fn clock_length_and_sweep(&mut self) {
        self.length.clock(self.envelope.halt_length());
        self.sweep.clock(&mut self.timer_period);
    }

    pub(crate) fn output(&self) -> u8 {
        if !self.enabled || !self.length.active() || self.sweep.muted(self.timer_period) {
            return 0;
        }
        if PULSE_DUTY_TABLE[self.duty as usize][self.duty_pos as usize] == 0 {
            0
        } else {
            self.envelope.output()
        }
    }

    #[cfg(test)]
    pub(crate) fn timer_period(&self) -> u16 {
        self.timer_period
    }
}
