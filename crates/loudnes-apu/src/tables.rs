//! Lookup tables shared by the 2A03 channels (NTSC timings).

/// Length counter load values indexed by the 5-bit value written to the
/// channel's length register.
pub(crate) const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

/// Pulse waveforms for the four duty settings (12.5%, 25%, 50%, 25% inverted).
pub(crate) const PULSE_DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

pub(crate) const TRIANGLE_SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
    13, 14, 15,
];

/// Noise timer periods in CPU cycles.
pub(crate) const NOISE_PERIOD_TABLE: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

/// DMC bit periods in CPU cycles.
pub(crate) const DMC_RATE_TABLE: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// `$4012` selects the sample start as `$C000 + value * 64`.
pub(crate) const DMC_SAMPLE_BASE: u16 = 0xC000;
pub(crate) const DMC_SAMPLE_ADDR_STRIDE: u16 = 64;
/// `$4013` selects the sample length as `value * 16 + 1` bytes.
pub(crate) const DMC_SAMPLE_LEN_STRIDE: u16 = 16;
