//! Output stage: 2A03 non-linear DAC approximation plus the VRC6 linear sum.

use crate::ApuChannel;

/// Full-scale amplitude handed to the resampler for a mix level of 1.0.
pub(crate) const OUTPUT_SCALE: f32 = 15_000.0;

/// Instantaneous DAC level per oscillator, indexed by [`ApuChannel`].
pub(crate) type Levels = [u8; ApuChannel::COUNT];

pub(crate) fn mix(levels: &Levels) -> f32 {
    let level = |ch: ApuChannel| levels[ch as usize] as f32;

    let pulse = level(ApuChannel::Pulse1) + level(ApuChannel::Pulse2);
    let pulse_out = if pulse == 0.0 {
        0.0
    } else {
        95.88 / ((8128.0 / pulse) + 100.0)
    };

    let t = level(ApuChannel::Triangle);
    let n = level(ApuChannel::Noise);
    let d = level(ApuChannel::Dmc);
    let tnd_out = if t == 0.0 && n == 0.0 && d == 0.0 {
        0.0
    } else {
        159.79 / ((1.0 / (t / 8227.0 + n / 12241.0 + d / 22638.0)) + 100.0)
    };

    pulse_out + tnd_out + vrc6_out(levels)
}

/// VRC6 output scaled so a full-volume VRC6 pulse matches a full-volume
/// 2A03 pulse.
fn vrc6_out(levels: &Levels) -> f32 {
    let sum = levels[ApuChannel::Vrc6Pulse1 as usize] as f32
        + levels[ApuChannel::Vrc6Pulse2 as usize] as f32
        + levels[ApuChannel::Vrc6Saw as usize] as f32;
    if sum == 0.0 {
        return 0.0;
    }
    let nes_pulse_full = 95.88 / ((8128.0 / 15.0) + 100.0);
    let vrc6_pulse_full = 15.0 / 61.0;
    (sum / 61.0) * (nes_pulse_full / vrc6_pulse_full)
}
