//! Frame sequencer clocking envelopes, linear/length counters and sweeps.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameCounterMode {
    #[default]
    FourStep,
    FiveStep,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FrameTick {
    pub(crate) quarter: bool,
    pub(crate) half: bool,
}

/// 4-step timeline in CPU cycles: (cycle, quarter, half).
const FRAME_STEP_4: &[(u32, bool, bool)] = &[
    (7457, true, false),
    (14913, true, true),
    (22371, true, false),
    (29829, true, true),
];
const FRAME_STEP_4_PERIOD: u32 = 29830;

/// 5-step timeline; the fourth step clocks nothing.
const FRAME_STEP_5: &[(u32, bool, bool)] = &[
    (7457, true, false),
    (14913, true, true),
    (22371, true, false),
    (37281, true, true),
];
const FRAME_STEP_5_PERIOD: u32 = 37282;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FrameCounter {
    mode: FrameCounterMode,
    cycle: u32,
}

impl FrameCounter {
    pub(crate) fn mode(&self) -> FrameCounterMode {
        self.mode
    }

    /// Applies a `$4017` write. The sequencer restarts, and selecting 5-step
    /// mode clocks the quarter and half frame units immediately.
    pub(crate) fn configure(&mut self, value: u8) -> FrameTick {
        self.mode = if value & 0b1000_0000 == 0 {
            FrameCounterMode::FourStep
        } else {
            FrameCounterMode::FiveStep
        };
        self.cycle = 0;
        let immediate = self.mode == FrameCounterMode::FiveStep;
        FrameTick {
            quarter: immediate,
            half: immediate,
        }
    }

    pub(crate) fn step(&mut self) -> FrameTick {
        self.cycle += 1;
        let (schedule, period) = match self.mode {
            FrameCounterMode::FourStep => (FRAME_STEP_4, FRAME_STEP_4_PERIOD),
            FrameCounterMode::FiveStep => (FRAME_STEP_5, FRAME_STEP_5_PERIOD),
        };

        let mut tick = FrameTick::default();
        for &(at, quarter, half) in schedule {
            if self.cycle == at {
                tick.quarter |= quarter;
                tick.half |= half;
            }
        }
        if self.cycle >= period {
            self.cycle = 0;
        }
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_step_write_clocks_immediately() {
        let mut fc = FrameCounter::default();
        let tick = fc.configure(0xC0);
        assert!(tick.quarter && tick.half);
        assert_eq!(fc.mode(), FrameCounterMode::FiveStep);

        let tick = fc.configure(0x40);
        assert!(!tick.quarter && !tick.half);
        assert_eq!(fc.mode(), FrameCounterMode::FourStep);
    }

    #[test]
    fn four_step_sequence_has_four_quarters_and_two_halves() {
        let mut fc = FrameCounter::default();
        let (mut quarters, mut halves) = (0, 0);
        for _ in 0..FRAME_STEP_4_PERIOD {
            let tick = fc.step();
            quarters += tick.quarter as u32;
            halves += tick.half as u32;
        }
        assert_eq!((quarters, halves), (4, 2));
    }
}
