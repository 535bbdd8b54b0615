use loudnes_apu::{
    RegisterWriter,
    registers::{FRAME_COUNTER, Register},
};

use super::{ChannelCore, ChannelId};
use crate::envelope::Envelopes;

/// `$4017`: 4-step sequence, IRQ inhibited. Restarts the sequencer so it
/// cannot clock the sweep on its own mid-trick.
const FRAME_COUNTER_HOLD: u8 = 0x40;
/// `$4017`: 5-step sequence. Clocks the half-frame units immediately.
const FRAME_COUNTER_CLOCK: u8 = 0xC0;
/// Sweep enabled, period 0, shift 7, adding.
const SWEEP_STEP_UP: u8 = 0x87;
/// Sweep enabled, period 0, shift 7, negating.
const SWEEP_STEP_DOWN: u8 = 0x8F;
/// Sweep disabled with negate set, which keeps the unit from muting low notes.
const SWEEP_OFF: u8 = 0x08;
/// Constant volume with the length counter halted.
const CONSTANT_VOLUME: u8 = 0x30;

#[derive(Debug, Clone)]
pub(super) struct PulseChannel {
    pub(super) envelopes: Envelopes,
    /// `0` for pulse 1, `4` for pulse 2.
    reg_offset: u16,
    /// Coarse period last written to the chip.
    prev_period_hi: Option<u8>,
}

impl PulseChannel {
    pub(super) fn new(id: ChannelId) -> Self {
        Self {
            envelopes: Envelopes::default(),
            reg_offset: if id == ChannelId::Pulse2 { 4 } else { 0 },
            prev_period_hi: None,
        }
    }

    /// Forgets the coarse period so the next note writes `$4003` directly.
    pub(super) fn reset(&mut self) {
        self.envelopes.stop();
        self.prev_period_hi = None;
    }

    fn reg(&self, reg: Register) -> u16 {
        reg.addr() + self.reg_offset
    }

    pub(super) fn update_apu<W>(&mut self, core: &ChannelCore, out: &mut W)
    where
        W: RegisterWriter + ?Sized,
    {
        let duty = core.duty(&mut self.envelopes);
        let mut volume = 0;

        if !self.envelopes.arpeggio.is_off() {
            let period = core.period(&mut self.envelopes);
            volume = core.volume(&mut self.envelopes);

            let lo = (period & 0xFF) as u8;
            let hi = ((period >> 8) & 0x07) as u8;

            if self.prev_period_hi != Some(hi) {
                let delta = self.prev_period_hi.map(|prev| hi as i16 - prev as i16);
                match delta {
                    Some(step @ (-1 | 1)) => self.step_coarse_period(step < 0, out),
                    _ => out.write_register(self.reg(Register::Pulse1TimerHigh), hi),
                }
                self.prev_period_hi = Some(hi);
            }

            out.write_register(self.reg(Register::Pulse1TimerLow), lo);
        }

        out.write_register(
            self.reg(Register::Pulse1Control),
            (duty << 6) | CONSTANT_VOLUME | volume,
        );
    }

    /// Moves the coarse period by one without writing `$4003`, which would
    /// restart the waveform and click. The low byte is parked at `$FF`
    /// (`$00` going down) and a single sweep clock with shift 7 carries it
    /// into the high bits.
    fn step_coarse_period<W>(&self, down: bool, out: &mut W)
    where
        W: RegisterWriter + ?Sized,
    {
        out.write_register(FRAME_COUNTER, FRAME_COUNTER_HOLD);
        out.write_register(
            self.reg(Register::Pulse1TimerLow),
            if down { 0x00 } else { 0xFF },
        );
        out.write_register(
            self.reg(Register::Pulse1Sweep),
            if down { SWEEP_STEP_DOWN } else { SWEEP_STEP_UP },
        );
        out.write_register(FRAME_COUNTER, FRAME_COUNTER_CLOCK);
        out.write_register(self.reg(Register::Pulse1Sweep), SWEEP_OFF);
    }
}
