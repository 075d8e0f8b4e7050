//! Offline band-pass filtering of whole sample buffers.
//!
//! The file-to-file variant of the live filter: every channel is processed
//! independently in blocks, the tail chunk zero-padded up to a full block.
//! The same no-window, no-overlap block cutting as the live path applies,
//! with the same audible boundary artifact.

use std::path::Path;

use crate::config::PassBand;
use crate::spectral::SpectralBlock;
use crate::wav::{read_wav, write_wav};
use crate::MonitorError;

/// Band-pass filters an interleaved sample buffer block by block.
///
/// The output has exactly the input's length; a tail shorter than one
/// block is zero-padded for the transform and truncated back on store.
pub fn filter_samples(
    samples: &[i16],
    channels: usize,
    sample_rate: u32,
    bands: &[PassBand],
    block_len: usize,
) -> Result<Vec<i16>, MonitorError> {
    if channels == 0 || samples.len() % channels != 0 {
        return Err(MonitorError::invalid_config(
            "samples do not divide into whole frames".to_string(),
        ));
    }
    for band in bands {
        PassBand::new(band.low_hz, band.high_hz, sample_rate)?;
    }

    let mut block = SpectralBlock::new(block_len, sample_rate, channels)?;
    let frames = samples.len() / channels;
    let mut out = vec![0i16; samples.len()];

    let mut pos = 0;
    while pos < frames {
        let take = (frames - pos).min(block_len);
        let start = pos * channels;
        let end = start + take * channels;
        for ch in 0..channels {
            block.load_samples(&samples[start..end], ch);
            block.forward();
            block.apply_mask(bands);
            block.inverse();
            block.store_samples(&mut out[start..end], ch);
        }
        pos += take;
    }

    Ok(out)
}

/// Reads a 16-bit PCM WAV, filters it, and writes the result.
pub fn filter_wav(
    input: &Path,
    output: &Path,
    bands: &[PassBand],
    block_len: usize,
) -> Result<(), MonitorError> {
    let (spec, samples) = read_wav(input)?;
    tracing::info!(
        input = %input.display(),
        rate = spec.sample_rate,
        channels = spec.channels,
        frames = samples.len() / spec.channels as usize,
        "filtering wav"
    );
    let filtered = filter_samples(
        &samples,
        spec.channels as usize,
        spec.sample_rate,
        bands,
        block_len,
    )?;
    write_wav(output, spec, &filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, frames: usize, rate: f64, amplitude: f64) -> Vec<i16> {
        (0..frames)
            .map(|t| {
                let x = (2.0 * PI * freq * t as f64 / rate).sin();
                (x * amplitude * 32_767.0) as i16
            })
            .collect()
    }

    fn energy(samples: &[i16]) -> f64 {
        samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum()
    }

    #[test]
    fn test_output_length_matches_input() {
        let samples = vec![100i16; 3000]; // not a multiple of the block
        let out = filter_samples(&samples, 1, 44_100, &[PassBand::VOICE], 1024).unwrap();
        assert_eq!(out.len(), samples.len());
    }

    #[test]
    fn test_in_band_tone_survives_out_of_band_tone_dies() {
        let rate = 44_100.0;
        let frames = 8192;
        let in_band = sine(150.0, frames, rate, 0.4);
        let out_of_band = sine(4000.0, frames, rate, 0.4);

        let kept = filter_samples(&in_band, 1, 44_100, &[PassBand::VOICE], 8192).unwrap();
        let removed = filter_samples(&out_of_band, 1, 44_100, &[PassBand::VOICE], 8192).unwrap();

        assert!(energy(&kept) > energy(&in_band) * 0.5);
        assert!(energy(&removed) < energy(&out_of_band) / 1000.0);
    }

    #[test]
    fn test_stereo_channels_independent() {
        let rate = 44_100.0;
        let frames = 2048;
        let left = sine(150.0, frames, rate, 0.4);
        let right = sine(4000.0, frames, rate, 0.4);
        let mut interleaved = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            interleaved.push(left[i]);
            interleaved.push(right[i]);
        }

        let out = filter_samples(&interleaved, 2, 44_100, &[PassBand::VOICE], 2048).unwrap();
        let out_left: Vec<i16> = out.iter().step_by(2).copied().collect();
        let out_right: Vec<i16> = out.iter().skip(1).step_by(2).copied().collect();

        assert!(energy(&out_left) > energy(&left) * 0.3);
        assert!(energy(&out_right) < energy(&right) / 100.0);
    }

    #[test]
    fn test_rejects_partial_frames() {
        assert!(filter_samples(&[1, 2, 3], 2, 44_100, &[PassBand::VOICE], 1024).is_err());
    }

    #[test]
    fn test_wav_to_wav() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        let spec = crate::wav::WavSpec {
            channels: 1,
            sample_rate: 44_100,
        };
        let samples = sine(150.0, 4096, 44_100.0, 0.4);
        crate::wav::write_wav(&input, spec, &samples).unwrap();

        filter_wav(&input, &output, &[PassBand::VOICE], 1024).unwrap();

        let (out_spec, out_samples) = read_wav(&output).unwrap();
        assert_eq!(out_spec, spec);
        assert_eq!(out_samples.len(), samples.len());
    }
}
