use loudnes_apu::{RegisterWriter, registers::Register};

use super::ChannelCore;
use crate::envelope::Envelopes;

/// Length counter halted, constant volume.
const CONSTANT_VOLUME: u8 = 0xF0;

#[derive(Debug, Clone, Default)]
pub(super) struct NoiseChannel {
    pub(super) envelopes: Envelopes,
}

impl NoiseChannel {
    /// Pitch is one of 16 noise periods picked by `(note + arpeggio) & 15`,
    /// with higher notes selecting shorter periods. The fine pitch envelope
    /// does not apply. Odd duty values select the short (metallic) mode.
    pub(super) fn update_apu<W>(&mut self, core: &ChannelCore, out: &mut W)
    where
        W: RegisterWriter + ?Sized,
    {
        if self.envelopes.volume.is_off() {
            out.write_register(Register::NoiseControl.addr(), CONSTANT_VOLUME);
            return;
        }

        let volume = core.volume(&mut self.envelopes);
        let duty = core.duty(&mut self.envelopes);
        let period = ((core.base_note() + self.envelopes.arpeggio.value_and_advance()) & 0x0F) as u8;

        out.write_register(
            Register::NoiseModeAndPeriod.addr(),
            (period ^ 0x0F) | ((duty << 7) & 0x80),
        );
        out.write_register(Register::NoiseControl.addr(), CONSTANT_VOLUME | volume);
    }
}
