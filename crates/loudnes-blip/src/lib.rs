//! Band-limited step synthesis for chip audio.
//!
//! Oscillator output is recorded as clock-tagged amplitude deltas at the chip
//! clock rate. [`BlipBuf::end_frame`] closes a frame and makes the band-limited
//! PCM for it readable at the host sample rate. The fixed-point layout and the
//! sinc step kernel follow Shay Green's blip_buf 1.1.0
//! (<http://www.slack.net/~ant/blip_buf.html>, LGPL-2.1).
//!
//! Nothing here allocates after construction, and out-of-range input is
//! dropped instead of panicking, so the buffer is safe to drive from an audio
//! callback.

use thiserror::Error;

const PRE_SHIFT: u32 = 32;
const TIME_BITS: u32 = PRE_SHIFT + 20;
const TIME_UNIT: u64 = 1 << TIME_BITS;
const FRAC_BITS: u32 = TIME_BITS - PRE_SHIFT;
const MAX_RATIO: u64 = 1 << 20;
const BASS_SHIFT: u32 = 9;
const END_FRAME_EXTRA: usize = 2;
const HALF_WIDTH: usize = 8;
const BUF_EXTRA: usize = HALF_WIDTH * 2 + END_FRAME_EXTRA;
const PHASE_BITS: u32 = 5;
const PHASE_COUNT: usize = 1 << PHASE_BITS;
const DELTA_BITS: u32 = 15;
const DELTA_UNIT: i64 = 1 << DELTA_BITS;

/// Half of a windowed-sinc step, one row per sub-sample phase.
const STEP_KERNEL: [[i16; HALF_WIDTH]; PHASE_COUNT + 1] = [
    [43, -115, 350, -488, 1136, -914, 5861, 21022],
    [44, -118, 348, -473, 1076, -799, 5274, 21001],
    [45, -121, 344, -454, 1011, -677, 4706, 20936],
    [46, -122, 336, -431, 942, -549, 4156, 20829],
    [47, -123, 327, -404, 868, -418, 3629, 20679],
    [47, -122, 316, -375, 792, -285, 3124, 20488],
    [47, -120, 303, -344, 714, -151, 2644, 20256],
    [46, -117, 289, -310, 634, -17, 2188, 19985],
    [46, -114, 273, -275, 553, 117, 1758, 19675],
    [44, -108, 255, -237, 471, 247, 1356, 19327],
    [43, -103, 237, -199, 390, 373, 981, 18944],
    [42, -98, 218, -160, 310, 495, 633, 18527],
    [40, -91, 198, -121, 231, 611, 314, 18078],
    [38, -84, 178, -81, 153, 722, 22, 17599],
    [36, -76, 157, -43, 80, 824, -241, 17092],
    [34, -68, 135, -3, 8, 919, -476, 16558],
    [32, -61, 115, 34, -60, 1006, -683, 16001],
    [29, -52, 94, 70, -123, 1083, -862, 15422],
    [27, -44, 73, 106, -184, 1152, -1015, 14824],
    [25, -36, 53, 139, -239, 1211, -1142, 14210],
    [22, -27, 34, 170, -290, 1261, -1244, 13582],
    [20, -20, 16, 199, -335, 1301, -1322, 12942],
    [18, -12, -3, 226, -375, 1331, -1376, 12293],
    [15, -4, -19, 250, -410, 1351, -1408, 11638],
    [13, 3, -35, 272, -439, 1361, -1419, 10979],
    [11, 9, -49, 292, -464, 1362, -1410, 10319],
    [9, 16, -63, 309, -483, 1354, -1383, 9660],
    [7, 22, -75, 322, -496, 1337, -1339, 9005],
    [6, 26, -85, 333, -504, 1312, -1280, 8355],
    [4, 31, -94, 341, -507, 1278, -1205, 7713],
    [3, 35, -102, 347, -506, 1238, -1119, 7082],
    [1, 40, -110, 350, -499, 1190, -1021, 6464],
    [0, 43, -115, 350, -488, 1136, -914, 5861],
];

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum BlipError {
    #[error("unsupported rate pair: clock {clock_rate} Hz, output {sample_rate} Hz")]
    InvalidRates { clock_rate: f64, sample_rate: f64 },
    #[error("buffer capacity must hold at least one sample")]
    ZeroCapacity,
}

/// Delta buffer that resamples a chip clock down to the host sample rate.
#[derive(Debug, Clone)]
pub struct BlipBuf {
    factor: u64,
    offset: u64,
    avail: usize,
    capacity: usize,
    integrator: i32,
    samples: Vec<i32>,
}

impl BlipBuf {
    /// Creates a buffer holding up to `capacity` unread output samples.
    pub fn new(clock_rate: f64, sample_rate: f64, capacity: usize) -> Result<Self, BlipError> {
        let rates_ok = clock_rate.is_finite()
            && sample_rate.is_finite()
            && clock_rate > 0.0
            && sample_rate > 0.0
            && clock_rate <= sample_rate * MAX_RATIO as f64;
        if !rates_ok {
            return Err(BlipError::InvalidRates {
                clock_rate,
                sample_rate,
            });
        }
        if capacity == 0 {
            return Err(BlipError::ZeroCapacity);
        }

        let factor = rate_factor(clock_rate, sample_rate);
        Ok(Self {
            factor,
            offset: factor / 2,
            avail: 0,
            capacity,
            integrator: 0,
            samples: vec![0; capacity + BUF_EXTRA],
        })
    }

    /// Drops every buffered sample and resets the high-pass integrator.
    pub fn clear(&mut self) {
        self.offset = self.factor / 2;
        self.avail = 0;
        self.integrator = 0;
        self.samples.fill(0);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples ready to be read.
    pub fn samples_avail(&self) -> usize {
        self.avail
    }

    /// Clocks a frame must span so that `count` more samples become readable.
    pub fn clocks_needed(&self, count: usize) -> u64 {
        let count = count.min(self.capacity - self.avail) as u64;
        let needed = count * TIME_UNIT;
        if needed <= self.offset {
            return 0;
        }
        (needed - self.offset).div_ceil(self.factor)
    }

    /// Records an amplitude change at `time` clocks into the current frame.
    ///
    /// Deltas landing past the end of the buffer are discarded.
    pub fn add_delta(&mut self, time: u32, delta: i32) {
        if delta == 0 {
            return;
        }
        let Some(fixed) = (time as u64)
            .checked_mul(self.factor)
            .and_then(|t| t.checked_add(self.offset))
            .map(|t| t >> PRE_SHIFT)
        else {
            return;
        };

        let pos = self.avail + (fixed >> FRAC_BITS) as usize;
        if pos + HALF_WIDTH * 2 > self.samples.len() {
            return;
        }

        let phase_shift = FRAC_BITS - PHASE_BITS;
        let phase = (fixed >> phase_shift) as usize & (PHASE_COUNT - 1);
        let interp = (fixed >> (phase_shift - DELTA_BITS)) as i64 & (DELTA_UNIT - 1);
        let delta2 = ((delta as i64 * interp) >> DELTA_BITS) as i32;
        let delta1 = delta - delta2;

        let near = &STEP_KERNEL[phase];
        let next = &STEP_KERNEL[phase + 1];
        let leading = &mut self.samples[pos..pos + HALF_WIDTH];
        for (k, slot) in leading.iter_mut().enumerate() {
            let inc = near[k] as i32 * delta1 + next[k] as i32 * delta2;
            *slot = slot.wrapping_add(inc);
        }

        let mirror = &STEP_KERNEL[PHASE_COUNT - phase];
        let mirror_prev = &STEP_KERNEL[PHASE_COUNT - phase - 1];
        let trailing = &mut self.samples[pos + HALF_WIDTH..pos + HALF_WIDTH * 2];
        for (k, slot) in trailing.iter_mut().enumerate() {
            let idx = HALF_WIDTH - 1 - k;
            let inc = mirror[idx] as i32 * delta1 + mirror_prev[idx] as i32 * delta2;
            *slot = slot.wrapping_add(inc);
        }
    }

    /// Closes a frame of `duration` clocks. Times passed to
    /// [`add_delta`](Self::add_delta) restart from zero afterwards.
    pub fn end_frame(&mut self, duration: u32) {
        let off = (duration as u64)
            .saturating_mul(self.factor)
            .saturating_add(self.offset);
        self.avail = (self.avail + (off >> TIME_BITS) as usize).min(self.capacity);
        self.offset = off & (TIME_UNIT - 1);
    }

    /// Reads up to `out.len()` samples and returns how many were written.
    pub fn read_samples(&mut self, out: &mut [i16]) -> usize {
        let count = out.len().min(self.avail);
        if count == 0 {
            return 0;
        }

        let mut sum = self.integrator;
        for (dst, &input) in out[..count].iter_mut().zip(self.samples.iter()) {
            let level = (sum >> DELTA_BITS).clamp(i16::MIN as i32, i16::MAX as i32);
            sum = sum.wrapping_add(input);
            *dst = level as i16;
            sum = sum.wrapping_sub(level << (DELTA_BITS - BASS_SHIFT));
        }
        self.integrator = sum;
        self.remove_samples(count);
        count
    }

    fn remove_samples(&mut self, count: usize) {
        let remain = self.avail + BUF_EXTRA - count;
        self.avail -= count;
        self.samples.copy_within(count..count + remain, 0);
        self.samples[remain..remain + count].fill(0);
    }
}

fn rate_factor(clock_rate: f64, sample_rate: f64) -> u64 {
    let exact = TIME_UNIT as f64 * sample_rate / clock_rate;
    let factor = exact as u64;
    if (factor as f64) < exact {
        factor + 1
    } else {
        factor
    }
}
