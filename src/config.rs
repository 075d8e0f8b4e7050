//! Configuration types for the monitor pipeline.

use std::time::Duration;

use crate::MonitorError;

/// Stream direction of an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Records from the device into the pipeline.
    Capture,
    /// Plays pipeline output through the device.
    Playback,
}

/// Parameters a device is opened with.
///
/// The sample format is fixed: signed 16-bit little-endian PCM, interleaved.
/// A descriptor is immutable once a device has been opened from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Backend device identifier, e.g. `"default"` or `"hw:1,0"`.
    pub name: String,
    /// Capture or playback.
    pub direction: Direction,
    /// Channel count (1 or 2).
    pub channels: usize,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl DeviceDescriptor {
    /// Creates a descriptor for the system default device.
    pub fn default_device(direction: Direction) -> Self {
        Self {
            name: "default".to_string(),
            direction,
            channels: 1,
            sample_rate: 44_100,
        }
    }

    /// Interleaved samples per frame.
    #[must_use]
    pub fn frame_stride(&self) -> usize {
        self.channels
    }
}

/// A frequency interval whose bins survive masking.
///
/// Bounds are inclusive and must satisfy `0 <= low_hz <= high_hz`, with
/// `high_hz` no greater than the Nyquist frequency of the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassBand {
    /// Lower bound in Hz.
    pub low_hz: f64,
    /// Upper bound in Hz.
    pub high_hz: f64,
}

impl PassBand {
    /// The human voice fundamental range, 80-260 Hz.
    ///
    /// Used by the CLI when filtering is requested without explicit bands
    /// (male voices roughly 85-180 Hz, female roughly 165-255 Hz). The
    /// spectral component itself never defaults bands.
    pub const VOICE: PassBand = PassBand {
        low_hz: 80.0,
        high_hz: 260.0,
    };

    /// Creates a band after checking its bounds against the sample rate.
    pub fn new(low_hz: f64, high_hz: f64, sample_rate: u32) -> Result<Self, MonitorError> {
        let nyquist = f64::from(sample_rate) / 2.0;
        if low_hz < 0.0 || high_hz < low_hz || high_hz > nyquist {
            return Err(MonitorError::invalid_config(format!(
                "pass band {low_hz}:{high_hz} Hz outside [0, {nyquist}]"
            )));
        }
        Ok(Self { low_hz, high_hz })
    }

    /// Returns true if `freq_hz` lies within the band (inclusive).
    #[must_use]
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.low_hz && freq_hz <= self.high_hz
    }
}

/// Pipeline behavior configuration.
///
/// Use [`MonitorConfig::default()`] for the baseline monitor (10 s of ring
/// retention, 8192-frame blocks, no filtering) and customize as needed.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How much audio the ring buffer retains.
    ///
    /// Ring capacity is `sample_rate x retention` frames and must exceed one
    /// processing block. Default: 10 seconds.
    pub retention: Duration,

    /// Processing block length in frames. Must be a power of two.
    ///
    /// Frequency resolution is `sample_rate / block_len`; the default 8192
    /// gives ~5.4 Hz per bin at 44.1 kHz.
    pub block_len: usize,

    /// Pass bands for spectral filtering, or `None` for plain pass-through.
    pub filter: Option<Vec<PassBand>>,

    /// Timeout for each capture wait, bounding cancellation latency.
    ///
    /// The device wait is the loop's single blocking point; a bounded
    /// timeout keeps the cancellation token polled. Default: 100ms.
    pub wait_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(10),
            block_len: 8192,
            filter: None,
            wait_timeout: Duration::from_millis(100),
        }
    }
}

impl MonitorConfig {
    /// Ring buffer capacity in frames for the given sample rate.
    #[must_use]
    pub fn ring_capacity(&self, sample_rate: u32) -> usize {
        (f64::from(sample_rate) * self.retention.as_secs_f64()) as usize
    }

    /// Validates block length and bands against the stream rate.
    pub fn validate(&self, sample_rate: u32) -> Result<(), MonitorError> {
        if !self.block_len.is_power_of_two() {
            return Err(MonitorError::invalid_config(format!(
                "block length {} is not a power of two",
                self.block_len
            )));
        }
        if self.block_len >= self.ring_capacity(sample_rate) {
            return Err(MonitorError::invalid_config(format!(
                "block length {} does not fit the {} frame ring",
                self.block_len,
                self.ring_capacity(sample_rate)
            )));
        }
        if let Some(bands) = &self.filter {
            let nyquist = f64::from(sample_rate) / 2.0;
            for band in bands {
                if band.low_hz < 0.0 || band.high_hz < band.low_hz || band.high_hz > nyquist {
                    return Err(MonitorError::invalid_config(format!(
                        "pass band {}:{} Hz outside [0, {nyquist}]",
                        band.low_hz, band.high_hz
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let desc = DeviceDescriptor::default_device(Direction::Capture);
        assert_eq!(desc.name, "default");
        assert_eq!(desc.channels, 1);
        assert_eq!(desc.sample_rate, 44_100);
        assert_eq!(desc.frame_stride(), 1);
    }

    #[test]
    fn test_pass_band_bounds() {
        assert!(PassBand::new(80.0, 260.0, 44_100).is_ok());
        assert!(PassBand::new(-1.0, 260.0, 44_100).is_err());
        assert!(PassBand::new(300.0, 200.0, 44_100).is_err());
        assert!(PassBand::new(0.0, 30_000.0, 44_100).is_err());
    }

    #[test]
    fn test_pass_band_contains_inclusive() {
        let band = PassBand::VOICE;
        assert!(band.contains(80.0));
        assert!(band.contains(260.0));
        assert!(band.contains(150.0));
        assert!(!band.contains(79.9));
        assert!(!band.contains(260.1));
    }

    #[test]
    fn test_config_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.retention, Duration::from_secs(10));
        assert_eq!(config.block_len, 8192);
        assert!(config.filter.is_none());
        assert_eq!(config.ring_capacity(44_100), 441_000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = MonitorConfig::default();
        assert!(config.validate(44_100).is_ok());

        config.block_len = 1000;
        assert!(config.validate(44_100).is_err());

        config.block_len = 1 << 20;
        assert!(config.validate(44_100).is_err());

        config.block_len = 8192;
        config.filter = Some(vec![PassBand {
            low_hz: 0.0,
            high_hz: 40_000.0,
        }]);
        assert!(config.validate(44_100).is_err());
    }
}
