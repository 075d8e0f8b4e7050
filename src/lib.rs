//! # monitor-audio
//!
//! Real-time audio monitor/pass-through with spectral band filtering.
//!
//! Frames are pulled from a capture device into a circular store,
//! optionally rewritten in the frequency domain (band-pass masking, with a
//! magnitude snapshot for visualization), and pushed to a playback device.
//! Transient hardware underruns/overruns are recovered in place without
//! losing stream synchronization.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use monitor_audio::{
//!     AlsaDevice, CancelToken, DeviceDescriptor, Direction, MonitorConfig,
//!     PassBand, PipelineLoop,
//! };
//!
//! let cancel = CancelToken::new();
//! let capture = AlsaDevice::open(DeviceDescriptor::default_device(Direction::Capture))?;
//! let playback = AlsaDevice::open(DeviceDescriptor::default_device(Direction::Playback))?;
//!
//! let config = MonitorConfig {
//!     filter: Some(vec![PassBand::VOICE]),
//!     ..Default::default()
//! };
//!
//! let mut pipeline =
//!     PipelineLoop::new(Box::new(capture), Box::new(playback), &config, cancel.clone())?;
//! pipeline.run()?; // until `cancel.cancel()` or a fatal device error
//! ```
//!
//! ## Architecture
//!
//! One cooperative flow of control drives wait, capture, transform,
//! playback and recovery strictly in sequence:
//!
//! - **RingBuffer**: wrap-aware circular frame store, the sole shared
//!   mutable state, owned by the loop - no locking anywhere.
//! - **AudioDevice**: one capability trait over the ALSA backend (capture
//!   and playback variants) and deterministic test mocks.
//! - **SpectralBlock**: block transform with typed time/frequency views,
//!   bin masking and a normalized magnitude snapshot.
//! - **PipelineLoop**: the per-iteration state machine, including xrun
//!   recovery and cooperative cancellation.
//!
//! The offline WAV reader/writer and band filter live outside the live
//! path and exchange only raw PCM buffers with the core.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]

mod cancel;
mod config;
pub mod device;
mod error;
pub mod offline;
mod pipeline;
mod ring;
mod spectral;
mod viz;
pub mod wav;

pub use cancel::CancelToken;
pub use config::{DeviceDescriptor, Direction, MonitorConfig, PassBand};
#[cfg(all(target_os = "linux", feature = "alsa-backend"))]
pub use device::AlsaDevice;
pub use device::{AudioDevice, MockCapture, MockPlayback, MockStats};
pub use error::{MonitorError, TransferError};
pub use pipeline::{PipelineLoop, PipelineState};
pub use ring::RingBuffer;
pub use spectral::SpectralBlock;
pub use viz::{TerminalVisualizer, Visualizer};
