use loudnes_apu::{RegisterWriter, registers::Register};

use super::ChannelCore;
use crate::envelope::Envelopes;

/// Control flag set: linear counter reloads every quarter frame.
const LINEAR_HOLD: u8 = 0x80;
/// Linear reload of 0: silent.
const SILENT: u8 = LINEAR_HOLD;
/// Longest linear reload: sounding.
const SOUNDING: u8 = 0xFF;

#[derive(Debug, Clone, Default)]
pub(super) struct TriangleChannel {
    pub(super) envelopes: Envelopes,
}

impl TriangleChannel {
    /// The triangle has no volume control, so any non-zero volume step
    /// gates it on.
    pub(super) fn update_apu<W>(&mut self, core: &ChannelCore, out: &mut W)
    where
        W: RegisterWriter + ?Sized,
    {
        if self.envelopes.volume.is_off() {
            out.write_register(Register::TriangleControl.addr(), SILENT);
            return;
        }

        let gate = if self.envelopes.volume.value_and_advance() != 0 {
            SOUNDING
        } else {
            SILENT
        };
        let period = core.period(&mut self.envelopes);

        out.write_register(Register::TriangleTimerLow.addr(), (period & 0xFF) as u8);
        out.write_register(Register::TriangleTimerHigh.addr(), ((period >> 8) & 0x07) as u8);
        out.write_register(Register::TriangleControl.addr(), LINEAR_HOLD | gate);
    }
}
