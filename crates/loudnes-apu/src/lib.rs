//! NES 2A03 sound block plus the Konami VRC6 expansion.
//!
//! The chip is driven purely through register writes. Each write is stamped
//! four CPU cycles after the previous one in the current frame and queued;
//! [`Apu::end_frame`] then runs the frame cycle by cycle, applying every write
//! at its stamp and feeding output steps into a band-limited resampler.
//! Finished PCM is pulled with [`Apu::read_samples`].

mod dmc;
mod envelope;
mod error;
mod frame_counter;
mod length_counter;
mod mixer;
mod noise;
mod pulse;
pub mod registers;
mod tables;
mod triangle;
mod vrc6;

use bitflags::bitflags;
use loudnes_blip::BlipBuf;
use tracing::{debug, trace};

pub use error::ApuError;
pub use frame_counter::FrameCounterMode;

use dmc::Dmc;
use frame_counter::{FrameCounter, FrameTick};
use mixer::Levels;
use noise::Noise;
use pulse::{Pulse, PulseSlot};
use registers::{Register, Vrc6Register};
use triangle::Triangle;
use vrc6::Vrc6;

/// NTSC CPU clock in Hz.
pub const CPU_CLOCK_NTSC: u32 = 1_789_773;
/// CPU cycles per emulated video frame; consecutive frames alternate so the
/// long-run rate matches the NTSC 60.0988 Hz refresh.
pub const FRAME_CYCLES: [u32; 2] = [29_780, 29_781];
/// Supported output sample rates.
pub const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 8_000..=192_000;

const WRITE_SPACING: u32 = 4;
const PENDING_WRITE_CAPACITY: usize = 256;

/// Sink for chip register writes.
pub trait RegisterWriter {
    fn write_register(&mut self, addr: u16, value: u8);
}

/// One oscillator of the 2A03 or VRC6.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApuChannel {
    Pulse1 = 0,
    Pulse2 = 1,
    Triangle = 2,
    Noise = 3,
    Dmc = 4,
    Vrc6Pulse1 = 5,
    Vrc6Pulse2 = 6,
    Vrc6Saw = 7,
}

impl ApuChannel {
    pub const COUNT: usize = 8;
    pub const ALL: [ApuChannel; Self::COUNT] = [
        ApuChannel::Pulse1,
        ApuChannel::Pulse2,
        ApuChannel::Triangle,
        ApuChannel::Noise,
        ApuChannel::Dmc,
        ApuChannel::Vrc6Pulse1,
        ApuChannel::Vrc6Pulse2,
        ApuChannel::Vrc6Saw,
    ];

    fn mask(self) -> ChannelMask {
        ChannelMask::from_bits_retain(1 << self as u8)
    }
}

bitflags! {
    /// One bit per [`ApuChannel`]. The low five bits share the layout of the
    /// `$4015` enable register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u8 {
        const PULSE1 = 1 << 0;
        const PULSE2 = 1 << 1;
        const TRIANGLE = 1 << 2;
        const NOISE = 1 << 3;
        const DMC = 1 << 4;
        const VRC6_PULSE1 = 1 << 5;
        const VRC6_PULSE2 = 1 << 6;
        const VRC6_SAW = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    time: u32,
    addr: u16,
    value: u8,
}

pub struct Apu {
    pulse: [Pulse; 2],
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    frame_counter: FrameCounter,
    vrc6: Vrc6,
    muted: ChannelMask,
    blip: BlipBuf,
    sample_rate: u32,
    pending: Vec<PendingWrite>,
    next_write_time: u32,
    odd_frame: bool,
    amplitude: i32,
}

impl std::fmt::Debug for Apu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Apu")
            .field("sample_rate", &self.sample_rate)
            .field("muted", &self.muted)
            .field("pending", &self.pending.len())
            .field("samples_avail", &self.blip.samples_avail())
            .finish()
    }
}

impl Apu {
    /// Creates a powered-on chip rendering at `sample_rate` Hz.
    pub fn new(sample_rate: u32) -> Result<Self, ApuError> {
        if !SAMPLE_RATE_RANGE.contains(&sample_rate) {
            return Err(ApuError::InvalidSampleRate(sample_rate));
        }
        // One second of output plus a frame of slack.
        let capacity = sample_rate as usize + sample_rate as usize / 30;
        let blip = BlipBuf::new(CPU_CLOCK_NTSC as f64, sample_rate as f64, capacity)?;
        debug!(sample_rate, capacity, "apu created");

        let mut apu = Self {
            pulse: [Pulse::new(PulseSlot::Pulse1), Pulse::new(PulseSlot::Pulse2)],
            triangle: Triangle::default(),
            noise: Noise::default(),
            dmc: Dmc::default(),
            frame_counter: FrameCounter::default(),
            vrc6: Vrc6::default(),
            muted: ChannelMask::empty(),
            blip,
            sample_rate,
            pending: Vec::with_capacity(PENDING_WRITE_CAPACITY),
            next_write_time: 0,
            odd_frame: false,
            amplitude: 0,
        };
        apu.amplitude = apu.mixed_amplitude();
        Ok(apu)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns every oscillator to power-on state and drops buffered output.
    /// Channel mutes are kept.
    pub fn reset(&mut self) {
        self.pulse = [Pulse::new(PulseSlot::Pulse1), Pulse::new(PulseSlot::Pulse2)];
        self.triangle = Triangle::default();
        self.noise = Noise::default();
        self.dmc = Dmc::default();
        self.frame_counter = FrameCounter::default();
        self.vrc6 = Vrc6::default();
        self.blip.clear();
        self.pending.clear();
        self.next_write_time = 0;
        self.odd_frame = false;
        self.amplitude = self.mixed_amplitude();
    }

    /// Queues a register write for the current frame.
    ///
    /// Addresses outside `$4000-$4017` and the VRC6 sound registers are
    /// ignored.
    pub fn write_register(&mut self, addr: u16, value: u8) {
        let last_cycle = FRAME_CYCLES[self.odd_frame as usize] - 1;
        self.pending.push(PendingWrite {
            time: self.next_write_time.min(last_cycle),
            addr,
            value,
        });
        self.next_write_time += WRITE_SPACING;
    }

    /// Runs one full frame and publishes its samples.
    ///
    /// `reader` supplies DMC sample bytes for CPU addresses `$8000-$FFFF`.
    pub fn end_frame<R>(&mut self, mut reader: R)
    where
        R: FnMut(u16) -> u8,
    {
        let frame_cycles = FRAME_CYCLES[self.odd_frame as usize];
        let mut next = 0;

        for cycle in 0..frame_cycles {
            while let Some(&write) = self.pending.get(next) {
                if write.time > cycle {
                    break;
                }
                self.apply_write(write.addr, write.value);
                next += 1;
            }
            self.step(&mut reader);
            self.push_output(cycle);
        }

        self.pending.clear();
        self.next_write_time = 0;
        self.odd_frame = !self.odd_frame;
        self.blip.end_frame(frame_cycles);
    }

    pub fn samples_avail(&self) -> usize {
        self.blip.samples_avail()
    }

    /// Reads up to `out.len()` signed 16-bit samples, returning the count.
    pub fn read_samples(&mut self, out: &mut [i16]) -> usize {
        self.blip.read_samples(out)
    }

    /// Mutes or unmutes one oscillator at the output stage. The oscillator
    /// keeps running either way.
    pub fn enable_channel(&mut self, channel: ApuChannel, enabled: bool) {
        self.muted.set(channel.mask(), !enabled);
    }

    pub fn is_channel_enabled(&self, channel: ApuChannel) -> bool {
        !self.muted.contains(channel.mask())
    }

    pub fn frame_counter_mode(&self) -> FrameCounterMode {
        self.frame_counter.mode()
    }

    fn apply_write(&mut self, addr: u16, value: u8) {
        if let Some(reg) = Register::from_addr(addr) {
            self.write_2a03(reg, value);
        } else if let Some(reg) = Vrc6Register::from_addr(addr) {
            self.vrc6.write(reg, value);
        } else {
            trace!(addr, value, "write to unmapped sound register ignored");
        }
    }

    fn write_2a03(&mut self, reg: Register, value: u8) {
        match reg {
            Register::Pulse1Control => self.pulse[0].write_control(value),
            Register::Pulse1Sweep => self.pulse[0].write_sweep(value),
            Register::Pulse1TimerLow => self.pulse[0].write_timer_low(value),
            Register::Pulse1TimerHigh => self.pulse[0].write_timer_high(value),
            Register::Pulse2Control => self.pulse[1].write_control(value),
            Register::Pulse2Sweep => self.pulse[1].write_sweep(value),
            Register::Pulse2TimerLow => self.pulse[1].write_timer_low(value),
            Register::Pulse2TimerHigh => self.pulse[1].write_timer_high(value),
            Register::TriangleControl => self.triangle.write_control(value),
            Register::TriangleTimerLow => self.triangle.write_timer_low(value),
            Register::TriangleTimerHigh => self.triangle.write_timer_high(value),
            Register::NoiseControl => self.noise.write_control(value),
            Register::NoiseModeAndPeriod => self.noise.write_mode_and_period(value),
            Register::NoiseLength => self.noise.write_length(value),
            Register::DmcControl => self.dmc.write_control(value),
            Register::DmcDirectLoad => self.dmc.write_direct_load(value),
            Register::DmcSampleAddress => self.dmc.write_sample_address(value),
            Register::DmcSampleLength => self.dmc.write_sample_length(value),
            Register::Status => self.write_status(value),
            Register::FrameCounter => {
                let tick = self.frame_counter.configure(value);
                self.apply_frame_tick(tick);
            }
        }
    }

    fn write_status(&mut self, value: u8) {
        let enabled = ChannelMask::from_bits_truncate(value & 0b0001_1111);
        self.pulse[0].set_enabled(enabled.contains(ChannelMask::PULSE1));
        self.pulse[1].set_enabled(enabled.contains(ChannelMask::PULSE2));
        self.triangle.set_enabled(enabled.contains(ChannelMask::TRIANGLE));
        self.noise.set_enabled(enabled.contains(ChannelMask::NOISE));
        self.dmc.set_enabled(enabled.contains(ChannelMask::DMC));
    }

    fn apply_frame_tick(&mut self, tick: FrameTick) {
        if tick.quarter {
            for pulse in &mut self.pulse {
                pulse.clock_envelope();
            }
            self.noise.clock_envelope();
            self.triangle.clock_linear_counter();
        }
        if tick.half {
            for pulse in &mut self.pulse {
                pulse.clock_length_and_sweep();
            }
            self.triangle.clock_length();
            self.noise.clock_length();
        }
    }

    fn step<R>(&mut self, reader: &mut R)
    where
        R: FnMut(u16) -> u8,
    {
        let tick = self.frame_counter.step();
        self.apply_frame_tick(tick);

        for pulse in &mut self.pulse {
            pulse.clock_timer();
        }
        self.triangle.clock_timer();
        self.noise.clock_timer();
        self.dmc.clock(reader);
        self.vrc6.clock();
    }

    fn levels(&self) -> Levels {
        let mut levels = [
            self.pulse[0].output(),
            self.pulse[1].output(),
            self.triangle.output(),
            self.noise.output(),
            self.dmc.output(),
            self.vrc6.pulse[0].output(),
            self.vrc6.pulse[1].output(),
            self.vrc6.saw.output(),
        ];
        for channel in ApuChannel::ALL {
            if self.muted.contains(channel.mask()) {
                levels[channel as usize] = 0;
            }
        }
        levels
    }

    /// The power-on DAC levels (the triangle rests at 15) count as the
    /// zero line, so they never reach the output as a step.
    fn mixed_amplitude(&self) -> i32 {
        (mixer::mix(&self.levels()) * mixer::OUTPUT_SCALE) as i32
    }

    fn push_output(&mut self, cycle: u32) {
        let amplitude = self.mixed_amplitude();
        let delta = amplitude - self.amplitude;
        if delta != 0 {
            self.blip.add_delta(cycle, delta);
            self.amplitude = amplitude;
        }
    }
}

impl RegisterWriter for Apu {
    fn write_register(&mut self, addr: u16, value: u8) {
        Apu::write_register(self, addr, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent(_: u16) -> u8 {
        0x55
    }

    fn render(apu: &mut Apu, frames: usize) -> Vec<i16> {
        let mut out = Vec::new();
        for _ in 0..frames {
            apu.end_frame(silent);
            let mut chunk = vec![0i16; apu.samples_avail()];
            let n = apu.read_samples(&mut chunk);
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }

    fn start_pulse1(apu: &mut Apu) {
        for (addr, value) in [(0x4015, 0x0F), (0x4000, 0xBF), (0x4002, 0xFD), (0x4003, 0x00)] {
            apu.write_register(addr, value);
        }
    }

    fn peak_to_peak(samples: &[i16]) -> i32 {
        let max = samples.iter().copied().max().unwrap_or_default() as i32;
        let min = samples.iter().copied().min().unwrap_or_default() as i32;
        max - min
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        assert_eq!(
            Apu::new(1_000).unwrap_err(),
            ApuError::InvalidSampleRate(1_000)
        );
    }

    #[test]
    fn frames_alternate_length() {
        let mut apu = Apu::new(44_100).expect("apu");
        apu.end_frame(silent);
        let first = apu.samples_avail();
        apu.end_frame(silent);
        let total = apu.samples_avail();
        assert!((733..=734).contains(&first), "{first}");
        assert!((1466..=1468).contains(&total), "{total}");
    }

    #[test]
    fn pulse_tone_is_audible() {
        let mut apu = Apu::new(48_000).expect("apu");
        start_pulse1(&mut apu);
        let out = render(&mut apu, 3);
        assert!(peak_to_peak(&out[200..]) > 1000);
    }

    #[test]
    fn muted_channel_is_silent() {
        let mut apu = Apu::new(48_000).expect("apu");
        apu.enable_channel(ApuChannel::Pulse1, false);
        assert!(!apu.is_channel_enabled(ApuChannel::Pulse1));
        start_pulse1(&mut apu);
        let out = render(&mut apu, 3);
        assert!(out.iter().all(|s| s.abs() < 50));
    }

    #[test]
    fn sweep_steps_coarse_period_without_high_write() {
        let mut apu = Apu::new(44_100).expect("apu");
        for (addr, value) in [
            (0x4015, 0x0F),
            (0x4001, 0x08),
            (0x4000, 0xB8),
            (0x4002, 0xF0),
            (0x4003, 0x01),
        ] {
            apu.write_register(addr, value);
        }
        apu.end_frame(silent);
        assert_eq!(apu.pulse[0].timer_period(), 0x1F0);

        for (addr, value) in [
            (0x4017, 0x40),
            (0x4002, 0xFF),
            (0x4001, 0x87),
            (0x4017, 0xC0),
            (0x4001, 0x08),
            (0x4002, 0x10),
        ] {
            apu.write_register(addr, value);
        }
        apu.end_frame(silent);
        assert_eq!(apu.pulse[0].timer_period(), 0x210);

        for (addr, value) in [
            (0x4017, 0x40),
            (0x4002, 0x00),
            (0x4001, 0x8F),
            (0x4017, 0xC0),
            (0x4001, 0x08),
            (0x4002, 0x80),
        ] {
            apu.write_register(addr, value);
        }
        apu.end_frame(silent);
        assert_eq!(apu.pulse[0].timer_period(), 0x180);
        assert_eq!(apu.frame_counter_mode(), FrameCounterMode::FiveStep);
    }

    #[test]
    fn dmc_reads_through_supplied_reader() {
        let mut apu = Apu::new(44_100).expect("apu");
        for (addr, value) in [
            (0x4015, 0x0F),
            (0x4012, 0x01),
            (0x4013, 0x01),
            (0x4010, 0x0F),
            (0x4011, 32),
            (0x4015, 0x1F),
        ] {
            apu.write_register(addr, value);
        }
        let mut addrs = Vec::new();
        apu.end_frame(|addr| {
            addrs.push(addr);
            0xFF
        });
        assert_eq!(addrs.len(), 17);
        assert_eq!(addrs[0], 0xC040);
        assert!(apu.dmc.output() > 32);
    }

    #[test]
    fn vrc6_writes_reach_expansion() {
        let mut apu = Apu::new(44_100).expect("apu");
        for (addr, value) in [(0x9003, 0x00), (0x9000, 0x8F), (0x9001, 0x00), (0x9002, 0x81)] {
            apu.write_register(addr, value);
        }
        apu.end_frame(silent);
        assert_eq!(apu.vrc6.pulse[0].output(), 15);
    }

    #[test]
    fn unmapped_writes_are_ignored() {
        let mut apu = Apu::new(44_100).expect("apu");
        apu.write_register(0x4009, 0xFF);
        apu.write_register(0x2000, 0xFF);
        apu.write_register(0xA003, 0xFF);
        let out = render(&mut apu, 1);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn reset_drops_buffered_output() {
        let mut apu = Apu::new(44_100).expect("apu");
        start_pulse1(&mut apu);
        apu.end_frame(silent);
        assert!(apu.samples_avail() > 0);
        apu.reset();
        assert_eq!(apu.samples_avail(), 0);
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_writes_keep_frames_in_step(
            writes in proptest::collection::vec((0x4000u16..0x4018, proptest::num::u8::ANY), 0..64),
            vrc6 in proptest::collection::vec((0x9000u16..0xB003, proptest::num::u8::ANY), 0..16),
        ) {
            let mut apu = Apu::new(48_000).expect("apu");
            for (addr, value) in writes.into_iter().chain(vrc6) {
                apu.write_register(addr, value);
            }
            let mut total = 0;
            for _ in 0..4 {
                apu.end_frame(silent);
                let mut chunk = vec![0i16; apu.samples_avail()];
                total += apu.read_samples(&mut chunk);
            }
            // 48 kHz at ~60.1 frames per second.
            proptest::prop_assert!((3190..=3200).contains(&total), "{total} samples");
        }
    }
}
