//! Konami VRC6 expansion sound: two 16-step pulse channels and a sawtooth.
//!
//! All three oscillators run off the CPU clock. `$9003` can halt them or
//! shorten every period by 4 or 8 bits.

use crate::registers::Vrc6Register;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Vrc6Pulse {
    volume: u8,
    duty: u8,
    /// Mode bit: output the volume regardless of duty.
    digitized: bool,
    period: u16,
    enabled: bool,
    timer: u16,
    step: u8,
}

impl Vrc6Pulse {
    fn write_control(&mut self, value: u8) {
        self.digitized = value & 0b1000_0000 != 0;
        self.duty = (value >> 4) & 0b0111;
        self.volume = value & 0b1111;
    }

    fn write_period_low(&mut self, value: u8) {
        self.period = (self.period & 0x0F00) | value as u16;
    }

    fn write_period_high(&mut self, value: u8) {
        self.period = (self.period & 0x00FF) | (((value & 0x0F) as u16) << 8);
        self.enabled = value & 0b1000_0000 != 0;
        if !self.enabled {
            self.step = 15;
        }
    }

    fn clock(&mut self, shift: u8) {
        if !self.enabled {
            return;
        }
        if self.timer == 0 {
            self.timer = self.period >> shift;
            self.step = self.step.wrapping_sub(1) & 0x0F;
        } else {
            self.timer -= 1;
        }
    }

    pub(crate) fn output(&self) -> u8 {
        if !self.enabled {
            0
        } else if self.digitized || self.step <= self.duty {
            self.volume
        } else {
            0
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Vrc6Saw {
    rate: u8,
    period: u16,
    enabled: bool,
    timer: u16,
    step: u8,
    accumulator: u8,
}

impl Vrc6Saw {
    fn write_rate(&mut self, value: u8) {
        self.rate = value & 0b0011_1111;
    }

    fn write_period_low(&mut self, value: u8) {
        self.period = (self.period & 0x0F00) | value as u16;
    }

    fn write_period_high(&mut self, value: u8) {
        self.period = (self.period & 0x00FF) | (((value & 0x0F) as u16) << 8);
        self.enabled = value & 0b1000_0000 != 0;
        if !self.enabled {
            self.step = 0;
            self.accumulator = 0;
        }
    }

    /// Every second step adds the rate; the seventh addition slot resets
    /// the accumulator instead, so one ramp spans 14 steps.
    fn clock(&mut self, shift: u8) {
        if !self.enabled {
            return;
        }
        if self.timer == 0 {
            self.timer = self.period >> shift;
            self.step += 1;
            if self.step == 14 {
                self.step = 0;
                self.accumulator = 0;
            } else if self.step % 2 == 0 {
                self.accumulator = self.accumulator.wrapping_add(self.rate);
            }
        } else {
            self.timer -= 1;
        }
    }

    /// Top five bits of the accumulator.
    pub(crate) fn output(&self) -> u8 {
        if self.enabled { self.accumulator >> 3 } else { 0 }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Vrc6 {
    pub(crate) pulse: [Vrc6Pulse; 2],
    pub(crate) saw: Vrc6Saw,
    halt: bool,
    shift: u8,
}

impl Vrc6 {
    pub(crate) fn write(&mut self, reg: Vrc6Register, value: u8) {
        match reg {
            Vrc6Register::Pulse1Control => self.pulse[0].write_control(value),
            Vrc6Register::Pulse1PeriodLow => self.pulse[0].write_period_low(value),
            Vrc6Register::Pulse1PeriodHigh => self.pulse[0].write_period_high(value),
            Vrc6Register::FrequencyControl => {
                self.halt = value & 0b001 != 0;
                self.shift = if value & 0b100 != 0 {
                    8
                } else if value & 0b010 != 0 {
                    4
                } else {
                    0
                };
            }
            Vrc6Register::Pulse2Control => self.pulse[1].write_control(value),
            Vrc6Register::Pulse2PeriodLow => self.pulse[1].write_period_low(value),
            Vrc6Register::Pulse2PeriodHigh => self.pulse[1].write_period_high(value),
            Vrc6Register::SawRate => self.saw.write_rate(value),
            Vrc6Register::SawPeriodLow => self.saw.write_period_low(value),
            Vrc6Register::SawPeriodHigh => self.saw.write_period_high(value),
        }
    }

    pub(crate) fn clock(&mut self) {
        if self.halt {
            return;
        }
        for pulse in &mut self.pulse {
            pulse.clock(self.shift);
        }
        self.saw.clock(self.shift);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vrc6_with(writes: &[(Vrc6Register, u8)]) -> Vrc6 {
        let mut vrc6 = Vrc6::default();
        for &(reg, value) in writes {
            vrc6.write(reg, value);
        }
        vrc6
    }

    #[test]
    fn pulse_duty_sets_high_fraction() {
        let mut vrc6 = vrc6_with(&[
            (Vrc6Register::Pulse1Control, 0x3A),
            (Vrc6Register::Pulse1PeriodLow, 0x00),
            (Vrc6Register::Pulse1PeriodHigh, 0x80),
        ]);
        let mut high = 0;
        for _ in 0..16 {
            vrc6.clock();
            if vrc6.pulse[0].output() == 0x0A {
                high += 1;
            }
        }
        assert_eq!(high, 4);
    }

    #[test]
    fn mode_bit_outputs_constant_volume() {
        let mut vrc6 = vrc6_with(&[
            (Vrc6Register::Pulse2Control, 0x8F),
            (Vrc6Register::Pulse2PeriodHigh, 0x81),
        ]);
        for _ in 0..1000 {
            vrc6.clock();
            assert_eq!(vrc6.pulse[1].output(), 15);
        }
    }

    #[test]
    fn saw_ramps_and_resets() {
        let mut vrc6 = vrc6_with(&[
            (Vrc6Register::SawRate, 40),
            (Vrc6Register::SawPeriodLow, 0x00),
            (Vrc6Register::SawPeriodHigh, 0x80),
        ]);
        let levels: Vec<u8> = (0..14)
            .map(|_| {
                vrc6.clock();
                vrc6.saw.output()
            })
            .collect();
        assert_eq!(levels, [0, 5, 5, 10, 10, 15, 15, 20, 20, 25, 25, 30, 30, 0]);
    }

    #[test]
    fn halt_freezes_all_channels() {
        let mut vrc6 = vrc6_with(&[
            (Vrc6Register::FrequencyControl, 0x01),
            (Vrc6Register::SawRate, 20),
            (Vrc6Register::SawPeriodHigh, 0x80),
        ]);
        for _ in 0..100 {
            vrc6.clock();
        }
        assert_eq!(vrc6.saw.output(), 0);
    }
}
