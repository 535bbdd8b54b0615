//! VRC6 expansion channels. Their period registers can be rewritten freely
//! without restarting the waveform, so no phase tricks are needed.

use loudnes_apu::{RegisterWriter, registers::Vrc6Register};

use super::{ChannelCore, ChannelId};
use crate::envelope::Envelopes;

/// `$9002`/`$A002`/`$B002` bit 7: channel enabled.
const ENABLE: u8 = 0x80;
/// Highest VRC6 pulse duty: 8/16 high.
const MAX_DUTY: i32 = 7;

#[derive(Debug, Clone)]
pub(super) struct Vrc6PulseChannel {
    pub(super) envelopes: Envelopes,
    /// `0` for pulse 1, `$1000` for pulse 2.
    reg_offset: u16,
}

impl Vrc6PulseChannel {
    pub(super) fn new(id: ChannelId) -> Self {
        Self {
            envelopes: Envelopes::default(),
            reg_offset: if id == ChannelId::Vrc6Pulse2 { 0x1000 } else { 0 },
        }
    }

    fn reg(&self, reg: Vrc6Register) -> u16 {
        reg.addr() + self.reg_offset
    }

    pub(super) fn update_apu<W>(&mut self, core: &ChannelCore, out: &mut W)
    where
        W: RegisterWriter + ?Sized,
    {
        // Eight duty settings instead of the 2A03's four.
        let duty = self.envelopes.duty.value_and_advance().clamp(0, MAX_DUTY) as u8;

        if self.envelopes.arpeggio.is_off() {
            out.write_register(self.reg(Vrc6Register::Pulse1Control), duty << 4);
            return;
        }

        let period = core.period(&mut self.envelopes);
        let volume = core.volume(&mut self.envelopes);

        out.write_register(self.reg(Vrc6Register::Pulse1PeriodLow), (period & 0xFF) as u8);
        out.write_register(
            self.reg(Vrc6Register::Pulse1PeriodHigh),
            ((period >> 8) & 0x0F) as u8 | ENABLE,
        );
        out.write_register(self.reg(Vrc6Register::Pulse1Control), (duty << 4) | volume);
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct Vrc6SawChannel {
    pub(super) envelopes: Envelopes,
}

impl Vrc6SawChannel {
    pub(super) fn update_apu<W>(&mut self, core: &ChannelCore, out: &mut W)
    where
        W: RegisterWriter + ?Sized,
    {
        if self.envelopes.arpeggio.is_off() {
            out.write_register(Vrc6Register::SawRate.addr(), 0);
            return;
        }

        let period = core.period(&mut self.envelopes);
        let volume = core.volume(&mut self.envelopes);

        out.write_register(Vrc6Register::SawPeriodLow.addr(), (period & 0xFF) as u8);
        out.write_register(
            Vrc6Register::SawPeriodHigh.addr(),
            ((period >> 8) & 0x0F) as u8 | ENABLE,
        );
        // Volume 15 maps to accumulator rate 60, just under the 6-bit
        // overflow that distorts the wave.
        out.write_register(Vrc6Register::SawRate.addr(), volume << 2);
    }
}
