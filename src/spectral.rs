//! Block-wise spectral transform over ring buffer frames.
//!
//! A [`SpectralBlock`] owns one fixed-length block with two typed views: a
//! real time-domain view of `n` samples and a complex frequency view whose
//! first `n / 2 + 1` bins carry the real-input spectrum. Conversion between
//! the views is always explicit - there is no untyped reinterpretation.
//!
//! Blocks are cut with no window function and no overlap-add, so masking
//! introduces audible discontinuities at block boundaries. That is the
//! documented baseline behavior, kept rather than silently smoothed over.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::PassBand;
use crate::ring::RingBuffer;
use crate::MonitorError;

/// Fixed-size time/frequency dual-view buffer plus transform plans.
///
/// Created once per pipeline run and reused for every block; no per-block
/// allocation. The forward/inverse pair is unnormalized, so a round trip
/// scales by the block length and [`inverse`](Self::inverse) divides it
/// back out.
pub struct SpectralBlock {
    n: usize,
    sample_rate: u32,
    channels: usize,
    forward_plan: Arc<dyn Fft<f64>>,
    inverse_plan: Arc<dyn Fft<f64>>,
    /// Real-sample view of the current channel.
    time: Vec<f64>,
    /// Complex frequency view; bins `0..=n/2` are the real-input spectrum,
    /// the upper half mirrors them conjugated.
    freq: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    /// Normalized magnitude snapshot, `n/2 + 1` entries.
    spectrum: Vec<f64>,
    /// Interleaved i16 staging block of `n` frames.
    frames: Vec<i16>,
}

impl SpectralBlock {
    /// Creates a block of `block_len` frames (power of two).
    ///
    /// Frequency resolution is `sample_rate / block_len` Hz per bin.
    pub fn new(block_len: usize, sample_rate: u32, channels: usize) -> Result<Self, MonitorError> {
        if block_len == 0 || !block_len.is_power_of_two() {
            return Err(MonitorError::invalid_config(format!(
                "block length {block_len} is not a power of two"
            )));
        }
        if channels == 0 {
            return Err(MonitorError::invalid_config(
                "block needs at least one channel".to_string(),
            ));
        }

        let mut planner = FftPlanner::<f64>::new();
        let forward_plan = planner.plan_fft_forward(block_len);
        let inverse_plan = planner.plan_fft_inverse(block_len);
        let scratch_len = forward_plan
            .get_inplace_scratch_len()
            .max(inverse_plan.get_inplace_scratch_len());

        Ok(Self {
            n: block_len,
            sample_rate,
            channels,
            forward_plan,
            inverse_plan,
            time: vec![0.0; block_len],
            freq: vec![Complex::new(0.0, 0.0); block_len],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            spectrum: vec![0.0; block_len / 2 + 1],
            frames: vec![0i16; block_len * channels],
        })
    }

    /// Block length in frames.
    #[must_use]
    pub fn block_len(&self) -> usize {
        self.n
    }

    /// Number of meaningful frequency bins, `n / 2 + 1`.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.n / 2 + 1
    }

    /// Frequency spacing between adjacent bins in Hz.
    #[must_use]
    pub fn resolution(&self) -> f64 {
        f64::from(self.sample_rate) / self.n as f64
    }

    /// The real-sample view of the most recently loaded channel.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.time
    }

    /// Copies one full block of frames from the ring, starting `offset`
    /// frames past the read cursor, into the staging block.
    ///
    /// Returns `Ok(0)` without touching the staging block if fewer than a
    /// full block is available - the pipeline defers processing rather than
    /// block-waiting. Otherwise returns the block length.
    pub fn gather(&mut self, ring: &RingBuffer, offset: usize) -> Result<usize, MonitorError> {
        if ring.available() < offset + self.n {
            return Ok(0);
        }
        ring.peek(offset, &mut self.frames)?;
        Ok(self.n)
    }

    /// Writes the staging block back over exactly the frames it was
    /// gathered from.
    pub fn scatter(&self, ring: &mut RingBuffer, offset: usize) -> Result<(), MonitorError> {
        ring.overwrite(offset, &self.frames)
    }

    /// Converts channel `ch` of the staging block into the real-sample view.
    pub fn load_channel(&mut self, ch: usize) {
        debug_assert!(ch < self.channels);
        for (i, sample) in self.time.iter_mut().enumerate() {
            *sample = f64::from(self.frames[i * self.channels + ch]);
        }
    }

    /// Converts the real-sample view back into channel `ch` of the staging
    /// block, saturating to the i16 range.
    pub fn store_channel(&mut self, ch: usize) {
        debug_assert!(ch < self.channels);
        for (i, &sample) in self.time.iter().enumerate() {
            self.frames[i * self.channels + ch] = sample as i16;
        }
    }

    /// Loads channel `ch` from an external interleaved slice, zero-padding
    /// when fewer than a full block of frames is given (tail of a stream).
    pub fn load_samples(&mut self, frames: &[i16], ch: usize) {
        let count = (frames.len() / self.channels).min(self.n);
        for i in 0..count {
            self.time[i] = f64::from(frames[i * self.channels + ch]);
        }
        self.time[count..].fill(0.0);
    }

    /// Stores up to a block of the real-sample view into channel `ch` of an
    /// external interleaved slice, saturating to the i16 range.
    pub fn store_samples(&self, out: &mut [i16], ch: usize) {
        let count = (out.len() / self.channels).min(self.n);
        for i in 0..count {
            out[i * self.channels + ch] = self.time[i] as i16;
        }
    }

    /// Computes the real-input DFT of the time view, producing the complex
    /// bins in place (unnormalized).
    pub fn forward(&mut self) {
        for (bin, &sample) in self.freq.iter_mut().zip(self.time.iter()) {
            *bin = Complex::new(sample, 0.0);
        }
        self.forward_plan
            .process_with_scratch(&mut self.freq, &mut self.scratch);
    }

    /// Zeroes every bin whose center frequency falls in none of `bands`.
    ///
    /// Bin `i` sits at `i * sample_rate / n` Hz; band bounds are inclusive,
    /// and bins inside any band are left untouched. The conjugate mirror of
    /// each zeroed bin is zeroed with it so the inverse stays real. Callers
    /// decide the bands - there is no implicit default here.
    pub fn apply_mask(&mut self, bands: &[PassBand]) {
        let rate = f64::from(self.sample_rate);
        for i in 0..=self.n / 2 {
            let freq_hz = (i as f64 * rate) / self.n as f64;
            if bands.iter().any(|b| b.contains(freq_hz)) {
                continue;
            }
            self.freq[i] = Complex::new(0.0, 0.0);
            if i > 0 && i < self.n - i {
                self.freq[self.n - i] = Complex::new(0.0, 0.0);
            }
        }
    }

    /// Refreshes and returns the magnitude snapshot, `sqrt(re^2 + im^2)`
    /// per bin, normalized so the array sums to 1.0.
    ///
    /// An all-zero block skips normalization and reports zero magnitudes.
    pub fn magnitude(&mut self) -> &[f64] {
        let mut sum = 0.0;
        for (mag, bin) in self.spectrum.iter_mut().zip(self.freq.iter()) {
            *mag = bin.norm();
            sum += *mag;
        }
        if sum > 0.0 {
            for mag in &mut self.spectrum {
                *mag /= sum;
            }
        }
        &self.spectrum
    }

    /// The magnitude snapshot from the last [`magnitude`](Self::magnitude)
    /// refresh, for lending to a visualizer.
    #[must_use]
    pub fn spectrum(&self) -> &[f64] {
        &self.spectrum
    }

    /// Computes the inverse transform back into the time view, dividing
    /// every sample by the block length to undo the unnormalized scaling.
    pub fn inverse(&mut self) {
        self.inverse_plan
            .process_with_scratch(&mut self.freq, &mut self.scratch);
        let scale = self.n as f64;
        for (sample, bin) in self.time.iter_mut().zip(self.freq.iter()) {
            *sample = bin.re / scale;
        }
    }

    /// Refreshes the magnitude snapshot from channel 0 of the staged block
    /// without rewriting any samples.
    ///
    /// The visualization-only path: no mask, no inverse, no store, so the
    /// staged frames stay bit-exact.
    pub fn analyze_block(&mut self) {
        self.load_channel(0);
        self.forward();
        self.magnitude();
    }

    /// Runs the full per-channel sequence over the staged block:
    /// load -> forward -> mask -> inverse -> store for every channel.
    ///
    /// The magnitude snapshot is refreshed from channel 0's pre-mask
    /// spectrum, matching what a visualizer wants to show. With
    /// `bands = None` the spectrum passes through unmodified (transform
    /// round trip only).
    pub fn filter_block(&mut self, bands: Option<&[PassBand]>) {
        for ch in 0..self.channels {
            self.load_channel(ch);
            self.forward();
            if ch == 0 {
                self.magnitude();
            }
            if let Some(bands) = bands {
                self.apply_mask(bands);
            }
            self.inverse();
            self.store_channel(ch);
        }
    }
}
