//! Error types for monitor-audio.
//!
//! Errors are split into two categories:
//! - **Setup and fatal errors** ([`MonitorError`]): prevent the pipeline from
//!   starting, or end it.
//! - **Recoverable transfer conditions** ([`TransferError`]): classified
//!   hardware buffer exhaustion, handled inside the loop iteration that
//!   triggered them and never surfaced past it.

use std::path::PathBuf;

/// Fatal and setup errors for the monitor pipeline.
///
/// These are returned from device opening, configuration validation and
/// [`PipelineLoop::run()`](crate::PipelineLoop::run). Transient buffer
/// exhaustion is *not* represented here; see [`TransferError`].
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The requested audio device could not be opened.
    #[error("cannot open device '{name}': {reason}")]
    DeviceOpen {
        /// Name of the device that failed to open.
        name: String,
        /// Reason reported by the backend.
        reason: String,
    },

    /// The hardware rejected a negotiated stream parameter.
    #[error("device rejected {parameter}: {reason}")]
    Negotiation {
        /// The parameter that was rejected (access, format, rate, ...).
        parameter: &'static str,
        /// Reason reported by the backend.
        reason: String,
    },

    /// A ring buffer request exceeded the queried capacity.
    ///
    /// This is a caller contract violation - callers must bound transfers by
    /// `available()`/`free()` first - so it indicates a defect, not a runtime
    /// condition to recover from.
    #[error("ring buffer capacity exceeded: requested {requested} frames, {available} available")]
    Capacity {
        /// Frames requested by the caller.
        requested: usize,
        /// Frames actually available for the operation.
        available: usize,
    },

    /// A configuration value is out of its documented range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: String,
    },

    /// File I/O failed on the offline WAV collaborator.
    #[error("file error: {path}: {source}")]
    File {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A WAV file does not hold 16-bit PCM in the expected layout.
    #[error("unsupported wav format: {reason}")]
    BadFormat {
        /// What was wrong with the container.
        reason: String,
    },

    /// Escalation target for anything xrun recovery cannot resolve.
    ///
    /// Once emitted, the pipeline performs full teardown and no further
    /// transfers are attempted on the failed device.
    #[error("fatal device error: {reason}")]
    Fatal {
        /// Description of the unrecoverable condition.
        reason: String,
    },
}

impl MonitorError {
    /// Creates a fatal error with the given reason.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    /// Creates an invalid-configuration error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Classified result of a failed device transfer.
///
/// Every transfer failure maps to exactly one variant; the recovery policy
/// in [`AudioDevice::recover`](crate::device::AudioDevice::recover) depends
/// only on this classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The device ran dry (playback) or overflowed (capture).
    ///
    /// Recovered by resetting the device to its prepared state and
    /// restarting streaming.
    #[error("buffer underrun/overrun")]
    Underrun,

    /// The device is temporarily unavailable, e.g. after a power
    /// management suspend. Recovered by retrying resume.
    #[error("device suspended")]
    Suspended,

    /// A non-retryable transfer failure. Always escalates to
    /// [`MonitorError::Fatal`].
    #[error("transfer failed: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_error_display() {
        let err = MonitorError::DeviceOpen {
            name: "hw:1,0".to_string(),
            reason: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "cannot open device 'hw:1,0': busy");
    }

    #[test]
    fn test_capacity_error_display() {
        let err = MonitorError::Capacity {
            requested: 100,
            available: 10,
        };
        assert!(err.to_string().contains("requested 100"));
        assert!(err.to_string().contains("10 available"));
    }

    #[test]
    fn test_transfer_error_classification_is_exclusive() {
        assert_ne!(TransferError::Underrun, TransferError::Suspended);
        assert_ne!(
            TransferError::Underrun,
            TransferError::Other("io".to_string())
        );
    }

    #[test]
    fn test_fatal_helper() {
        let err = MonitorError::fatal("device unplugged");
        assert_eq!(err.to_string(), "fatal device error: device unplugged");
    }
}
