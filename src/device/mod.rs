//! Audio device abstraction.
//!
//! A device owns one hardware stream and its negotiated parameters. The
//! capability surface is one trait implemented by the ALSA backend (capture
//! and playback variants share one negotiation path) and by deterministic
//! mocks, so the pipeline is testable without a sound card.
//!
//! Closing is [`Drop`]: a device releases what it acquired when it goes out
//! of scope, including after a partial initialization failure.

#[cfg(all(target_os = "linux", feature = "alsa-backend"))]
mod alsa;
mod mock;

#[cfg(all(target_os = "linux", feature = "alsa-backend"))]
pub use alsa::AlsaDevice;
pub use mock::{MockCapture, MockPlayback, MockStats};

use std::time::Duration;

use crate::config::DeviceDescriptor;
use crate::error::{MonitorError, TransferError};

/// One hardware (or fake) audio stream.
///
/// Lifecycle: open (negotiate, backend constructor) -> [`start`](Self::start)
/// -> repeated wait/transfer -> drop. Transfers are non-blocking by
/// construction; [`wait_ready`](Self::wait_ready) is the only call that
/// suspends.
pub trait AudioDevice {
    /// The parameters this device was opened with.
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Begins streaming. Idempotent once started.
    fn start(&mut self) -> Result<(), MonitorError>;

    /// Suspends until at least the negotiated minimum of frames is
    /// transferable, or `timeout` elapses.
    ///
    /// Returns `Ok(true)` when ready, `Ok(false)` on timeout. The pipeline
    /// bounds the timeout so its cancellation token stays polled.
    fn wait_ready(&mut self, timeout: Option<Duration>) -> Result<bool, TransferError>;

    /// Frames transferable right now without blocking.
    fn avail(&mut self) -> Result<usize, TransferError>;

    /// Non-blocking capture of up to `buf.len() / channels` frames.
    ///
    /// Returns the number of frames moved, which may be zero.
    fn read_frames(&mut self, buf: &mut [i16]) -> Result<usize, TransferError>;

    /// Non-blocking playback of up to `buf.len() / channels` frames.
    ///
    /// Returns the number of frames moved, which may be zero.
    fn write_frames(&mut self, buf: &[i16]) -> Result<usize, TransferError>;

    /// Applies the xrun recovery policy for a classified transfer error.
    ///
    /// - Underrun/overrun: reset to the prepared state, restart streaming.
    /// - Suspended: retry resume with a fixed delay while it reports
    ///   try-again; definitive resume failure falls back to the underrun
    ///   path; any other resume error escalates.
    /// - Other: always escalates to [`MonitorError::Fatal`]; the loop must
    ///   not attempt further transfers on this device.
    fn recover(&mut self, error: &TransferError) -> Result<(), MonitorError>;

    /// Flushes in-flight playback data at shutdown. No-op for capture.
    fn drain(&mut self) -> Result<(), MonitorError> {
        Ok(())
    }
}
