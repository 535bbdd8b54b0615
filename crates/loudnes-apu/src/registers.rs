//! CPU-visible register map of the 2A03 sound block and the VRC6 expansion.

/// Start of the 2A03 sound register window.
pub const APU_REGISTER_BASE: u16 = 0x4000;
/// Channel enable / status register.
pub const STATUS: u16 = 0x4015;
/// Frame counter mode register.
pub const FRAME_COUNTER: u16 = 0x4017;

/// 2A03 sound registers in the `$4000-$4017` range.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// `$4000` - Pulse 1: duty, length halt, constant volume, volume.
    Pulse1Control = 0x4000,
    /// `$4001` - Pulse 1: sweep unit.
    Pulse1Sweep = 0x4001,
    /// `$4002` - Pulse 1: timer low byte.
    Pulse1TimerLow = 0x4002,
    /// `$4003` - Pulse 1: timer high 3 bits + length load.
    Pulse1TimerHigh = 0x4003,
    Pulse2Control = 0x4004,
    Pulse2Sweep = 0x4005,
    Pulse2TimerLow = 0x4006,
    Pulse2TimerHigh = 0x4007,
    /// `$4008` - Triangle: control flag + linear counter reload.
    TriangleControl = 0x4008,
    TriangleTimerLow = 0x400A,
    TriangleTimerHigh = 0x400B,
    /// `$400C` - Noise: length halt, constant volume, volume.
    NoiseControl = 0x400C,
    /// `$400E` - Noise: mode flag and period index.
    NoiseModeAndPeriod = 0x400E,
    NoiseLength = 0x400F,
    /// `$4010` - DMC: IRQ enable, loop flag, rate index.
    DmcControl = 0x4010,
    /// `$4011` - DMC: direct 7-bit DAC load.
    DmcDirectLoad = 0x4011,
    DmcSampleAddress = 0x4012,
    DmcSampleLength = 0x4013,
    Status = 0x4015,
    FrameCounter = 0x4017,
}

impl Register {
    pub const fn addr(self) -> u16 {
        self as u16
    }

    /// Resolves an address to a 2A03 register. Holes such as `$4009` and
    /// `$4014` resolve to `None`.
    pub const fn from_addr(addr: u16) -> Option<Self> {
        match addr {
            0x4000 => Some(Self::Pulse1Control),
            0x4001 => Some(Self::Pulse1Sweep),
            0x4002 => Some(Self::Pulse1TimerLow),
            0x4003 => Some(Self::Pulse1TimerHigh),
            0x4004 => Some(Self::Pulse2Control),
            0x4005 => Some(Self::Pulse2Sweep),
            0x4006 => Some(Self::Pulse2TimerLow),
            0x4007 => Some(Self::Pulse2TimerHigh),
            0x4008 => Some(Self::TriangleControl),
            0x400A => Some(Self::TriangleTimerLow),
            0x400B => Some(Self::TriangleTimerHigh),
            0x400C => Some(Self::NoiseControl),
            0x400E => Some(Self::NoiseModeAndPeriod),
            0x400F => Some(Self::NoiseLength),
            0x4010 => Some(Self::DmcControl),
            0x4011 => Some(Self::DmcDirectLoad),
            0x4012 => Some(Self::DmcSampleAddress),
            0x4013 => Some(Self::DmcSampleLength),
            0x4015 => Some(Self::Status),
            0x4017 => Some(Self::FrameCounter),
            _ => None,
        }
    }
}

/// VRC6 expansion sound registers.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vrc6Register {
    /// `$9000` - Pulse 1: mode, duty (3 bits), volume.
    Pulse1Control = 0x9000,
    Pulse1PeriodLow = 0x9001,
    /// `$9002` - Pulse 1: enable flag + period high 4 bits.
    Pulse1PeriodHigh = 0x9002,
    /// `$9003` - Halt and frequency scaling for all three channels.
    FrequencyControl = 0x9003,
    Pulse2Control = 0xA000,
    Pulse2PeriodLow = 0xA001,
    Pulse2PeriodHigh = 0xA002,
    /// `$B000` - Saw: accumulator rate (6 bits).
    SawRate = 0xB000,
    SawPeriodLow = 0xB001,
    SawPeriodHigh = 0xB002,
}

impl Vrc6Register {
    pub const fn addr(self) -> u16 {
        self as u16
    }

    pub const fn from_addr(addr: u16) -> Option<Self> {
        match addr {
            0x9000 => Some(Self::Pulse1Control),
            0x9001 => Some(Self::Pulse1PeriodLow),
            0x9002 => Some(Self::Pulse1PeriodHigh),
            0x9003 => Some(Self::FrequencyControl),
            0xA000 => Some(Self::Pulse2Control),
            0xA001 => Some(Self::Pulse2PeriodLow),
            0xA002 => Some(Self::Pulse2PeriodHigh),
            0xB000 => Some(Self::SawRate),
            0xB001 => Some(Self::SawPeriodLow),
            0xB002 => Some(Self::SawPeriodHigh),
            _ => None,
        }
    }
}
