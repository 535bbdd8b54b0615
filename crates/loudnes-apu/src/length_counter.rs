//! Length counter gating the pulse, triangle, and noise channels.

use crate::tables::LENGTH_TABLE;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct LengthCounter {
    value: u8,
}

impl LengthCounter {
    pub(crate) fn clear(&mut self) {
        self.value = 0;
    }

    pub(crate) fn active(&self) -> bool {
        self.value > 0
    }

    /// Loads from the length table; ignored while the channel is disabled.
    pub(crate) fn load(&mut self, index: u8, enabled: bool) {
        if enabled {
            self.value = LENGTH_TABLE[(index & 0x1F) as usize];
        }
    }

    pub(crate) fn clock(&mut self, halt: bool) {
        if self.value > 0 && !halt {
            self.value -= 1;
        }
    }
}
