//! Offline WAV container collaborator.
//!
//! Out of the live path: the pipeline itself only ever sees raw interleaved
//! PCM buffers plus channel/rate metadata. This module maps the canonical
//! 44-byte RIFF/WAVE header for 16-bit PCM to and from that representation.
//!
//! See: <http://soundfile.sapp.org/doc/WaveFormat/>

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::MonitorError;

/// Size of the canonical WAV header (RIFF + fmt + data chunk headers).
const HEADER_SIZE: usize = 44;

/// Size of the fmt chunk data for PCM.
const FMT_CHUNK_SIZE: u32 = 16;

/// Audio format code for uncompressed PCM.
const FORMAT_PCM: u16 = 1;

/// The only supported sample width.
const BITS_PER_SAMPLE: u16 = 16;

/// Channel/rate metadata of a 16-bit PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

/// Reads a 16-bit PCM WAV file into interleaved samples.
///
/// Rejects anything that is not canonical-layout uncompressed 16-bit PCM
/// with consistent chunk sizes.
pub fn read_wav(path: &Path) -> Result<(WavSpec, Vec<i16>), MonitorError> {
    let bytes = std::fs::read(path).map_err(|e| MonitorError::File {
        path: path.to_path_buf(),
        source: e,
    })?;

    if bytes.len() < HEADER_SIZE {
        return Err(bad_format("file shorter than a wav header"));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(bad_format("missing RIFF/WAVE magic"));
    }
    if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
        return Err(bad_format("non-canonical chunk layout"));
    }
    if read_u16(&bytes, 20) != FORMAT_PCM {
        return Err(bad_format("not uncompressed PCM"));
    }
    if read_u16(&bytes, 34) != BITS_PER_SAMPLE {
        return Err(bad_format("only 16 bits per sample supported"));
    }
    let file_size = read_u32(&bytes, 4) as usize;
    if file_size != bytes.len() - 8 {
        return Err(bad_format("RIFF size disagrees with file size"));
    }
    let data_size = read_u32(&bytes, 40) as usize;
    if data_size > bytes.len() - HEADER_SIZE {
        return Err(bad_format("data chunk extends past end of file"));
    }

    let channels = read_u16(&bytes, 22);
    if channels == 0 {
        return Err(bad_format("zero channels"));
    }
    let spec = WavSpec {
        channels,
        sample_rate: read_u32(&bytes, 24),
    };

    let samples = bytes[HEADER_SIZE..HEADER_SIZE + data_size]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok((spec, samples))
}

/// Writes interleaved samples as a canonical 16-bit PCM WAV file.
pub fn write_wav(path: &Path, spec: WavSpec, samples: &[i16]) -> Result<(), MonitorError> {
    let file_err = |e: std::io::Error| MonitorError::File {
        path: path.to_path_buf(),
        source: e,
    };

    let data_size = (samples.len() * 2) as u32;
    let byte_rate = spec.sample_rate * u32::from(spec.channels) * 2;
    let block_align = spec.channels * 2;

    let mut out = BufWriter::new(File::create(path).map_err(file_err)?);
    out.write_all(b"RIFF").map_err(file_err)?;
    out.write_all(&(HEADER_SIZE as u32 - 8 + data_size).to_le_bytes())
        .map_err(file_err)?;
    out.write_all(b"WAVE").map_err(file_err)?;
    out.write_all(b"fmt ").map_err(file_err)?;
    out.write_all(&FMT_CHUNK_SIZE.to_le_bytes()).map_err(file_err)?;
    out.write_all(&FORMAT_PCM.to_le_bytes()).map_err(file_err)?;
    out.write_all(&spec.channels.to_le_bytes()).map_err(file_err)?;
    out.write_all(&spec.sample_rate.to_le_bytes())
        .map_err(file_err)?;
    out.write_all(&byte_rate.to_le_bytes()).map_err(file_err)?;
    out.write_all(&block_align.to_le_bytes()).map_err(file_err)?;
    out.write_all(&BITS_PER_SAMPLE.to_le_bytes())
        .map_err(file_err)?;
    out.write_all(b"data").map_err(file_err)?;
    out.write_all(&data_size.to_le_bytes()).map_err(file_err)?;

    for sample in samples {
        out.write_all(&sample.to_le_bytes()).map_err(file_err)?;
    }
    out.flush().map_err(file_err)?;
    Ok(())
}

fn bad_format(reason: &str) -> MonitorError {
    MonitorError::BadFormat {
        reason: reason.to_string(),
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
