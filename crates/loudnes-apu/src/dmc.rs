//! Delta modulation channel.
//!
//! Sample bytes are fetched through a caller-supplied reader the moment the
//! sample buffer empties; there is no CPU here to stall.

use crate::tables::{DMC_RATE_TABLE, DMC_SAMPLE_ADDR_STRIDE, DMC_SAMPLE_BASE, DMC_SAMPLE_LEN_STRIDE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Dmc {
    loop_flag: bool,
    timer: u16,
    /// Reload value; one output bit every `DMC_RATE_TABLE[rate]` cycles.
    timer_period: u16,
    output_level: u8,
    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    bytes_remaining: u16,
    sample_buffer: Option<u8>,
    shift_register: u8,
    bits_remaining: u8,
    silence: bool,
}

impl Default for Dmc {
    fn default() -> Self {
        Self {
            loop_flag: false,
            timer: DMC_RATE_TABLE[0] - 1,
            timer_period: DMC_RATE_TABLE[0] - 1,
            output_level: 0,
            sample_address: DMC_SAMPLE_BASE,
            sample_length: 1,
            current_address: DMC_SAMPLE_BASE,
            bytes_remaining: 0,
            sample_buffer: None,
            shift_register: 0,
            bits_remaining: 8,
            silence: true,
        }
    }
}

impl Dmc {
    pub(crate) fn write_control(&mut self, value: u8) {
        self.loop_flag = value & 0b0100_0000 != 0;
        self.timer_period = DMC_RATE_TABLE[(value & 0b0000_1111) as usize] - 1;
    }

    pub(crate) fn write_direct_load(&mut self, value: u8) {
        self.output_level = value & 0b0111_1111;
    }

    pub(crate) fn write_sample_address(&mut self, value: u8) {
        self.sample_address = DMC_SAMPLE_BASE.wrapping_add(value as u16 * DMC_SAMPLE_ADDR_STRIDE);
    }

    pub(crate) fn write_sample_length(&mut self, value: u8) {
        self.sample_length = value as u16 * DMC_SAMPLE_LEN_STRIDE + 1;
    }

    /// `$4015` bit 4. Enabling only restarts a sample that has run out.
    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.restart_sample();
        }
    }

    pub(crate) fn clock<R>(&mut self, reader: &mut R)
    where
        R: FnMut(u16) -> u8,
    {
        if self.timer == 0 {
            self.timer = self.timer_period;
            self.shift_output();
        } else {
            self.timer -= 1;
        }

        if self.sample_buffer.is_none() && self.bytes_remaining > 0 {
            self.fetch(reader);
        }
    }

    pub(crate) fn output(&self) -> u8 {
        self.output_level
    }

    fn restart_sample(&mut self) {
        self.current_address = self.sample_address;
        self.bytes_remaining = self.sample_length;
    }

    fn shift_output(&mut self) {
        if !self.silence {
            if self.shift_register & 1 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
            self.shift_register >>= 1;
        }

        self.bits_remaining -= 1;
        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            match self.sample_buffer.take() {
                Some(sample) => {
                    self.shift_register = sample;
                    self.silence = false;
                }
                None => self.silence = true,
            }
        }
    }

    fn fetch<R>(&mut self, reader: &mut R)
    where
        R: FnMut(u16) -> u8,
    {
        self.sample_buffer = Some(reader(self.current_address));
        // Address wraps from $FFFF back to $8000.
        self.current_address = if self.current_address == 0xFFFF {
            0x8000
        } else {
            self.current_address + 1
        };
        self.bytes_remaining -= 1;
        if self.bytes_remaining == 0 && self.loop_flag {
            self.restart_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetches_sample_bytes_in_order() {
        let mut dmc = Dmc::default();
        dmc.write_sample_address(0x02);
        dmc.write_sample_length(0x01);
        dmc.write_control(0x0F);
        dmc.set_enabled(true);

        let mut fetched = Vec::new();
        let mut reader = |addr: u16| {
            fetched.push(addr);
            0xFF
        };
        for _ in 0..20_000 {
            dmc.clock(&mut reader);
        }
        assert_eq!(fetched.len(), 17);
        assert_eq!(fetched[0], 0xC080);
        assert_eq!(fetched[16], 0xC090);
    }

    #[test]
    fn ones_raise_and_zeros_lower_the_dac() {
        let mut dmc = Dmc::default();
        dmc.write_direct_load(32);
        dmc.write_control(0x0F);
        dmc.set_enabled(true);
        for _ in 0..2_000 {
            dmc.clock(&mut |_| 0xFF);
        }
        assert!(dmc.output() > 32);

        let mut low = Dmc::default();
        low.write_direct_load(32);
        low.write_control(0x0F);
        low.set_enabled(true);
        for _ in 0..2_000 {
            low.clock(&mut |_| 0x00);
        }
        assert!(low.output() < 32);
    }

    #[test]
    fn looping_sample_keeps_fetching() {
        let mut dmc = Dmc::default();
        dmc.write_control(0x4F);
        dmc.set_enabled(true);
        let mut fetched = Vec::new();
        for _ in 0..20_000 {
            dmc.clock(&mut |addr| {
                fetched.push(addr);
                0x55
            });
        }
        // One byte per 8 bits of 54 cycles, after the power-on bit period.
        assert!((44..=48).contains(&fetched.len()), "{} fetches", fetched.len());
        assert!(fetched.iter().all(|&addr| addr == 0xC000));

        let mut once = Dmc::default();
        once.write_control(0x0F);
        once.set_enabled(true);
        let mut count = 0;
        for _ in 0..20_000 {
            once.clock(&mut |_| {
                count += 1;
                0x55
            });
        }
        assert_eq!(count, 1);
    }
}
