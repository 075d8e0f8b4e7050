//! Deterministic fake devices for testing without hardware.
//!
//! `MockCapture` replays a scripted sample sequence in bounded chunks;
//! `MockPlayback` collects everything written into a shared sink. Both can
//! have classified transfer errors injected on upcoming calls, and both
//! count recovery actions, so recovery policy and ordering guarantees are
//! testable in CI with no sound stack.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::{DeviceDescriptor, Direction};
use crate::device::AudioDevice;
use crate::error::{MonitorError, TransferError};

/// Counters for lifecycle and recovery actions on a mock device.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MockStats {
    /// Times the device was started.
    pub starts: usize,
    /// Prepare + restart cycles performed for underrun recovery.
    pub prepares: usize,
    /// Resume operations performed for suspend recovery.
    pub resumes: usize,
    /// Frames moved across all transfers.
    pub frames_moved: usize,
    /// Times the playback stream was drained.
    pub drains: usize,
}

fn apply_recovery(
    stats: &Arc<Mutex<MockStats>>,
    error: &TransferError,
) -> Result<(), MonitorError> {
    let mut stats = stats.lock().expect("mock stats poisoned");
    match error {
        TransferError::Underrun => {
            stats.prepares += 1;
            Ok(())
        }
        TransferError::Suspended => {
            stats.resumes += 1;
            Ok(())
        }
        TransferError::Other(reason) => Err(MonitorError::fatal(reason.clone())),
    }
}

/// A fake capture device replaying a known sample sequence.
pub struct MockCapture {
    descriptor: DeviceDescriptor,
    samples: Vec<i16>,
    pos: usize,
    chunk_frames: usize,
    injected: VecDeque<TransferError>,
    stats: Arc<Mutex<MockStats>>,
    cancel_on_drain: Option<CancelToken>,
}

impl MockCapture {
    /// Creates a capture fake that offers `samples` in chunks of at most
    /// `chunk_frames` frames per wait.
    pub fn new(samples: Vec<i16>, channels: usize, chunk_frames: usize) -> Self {
        let mut descriptor = DeviceDescriptor::default_device(Direction::Capture);
        descriptor.channels = channels;
        Self {
            descriptor,
            samples,
            pos: 0,
            chunk_frames,
            injected: VecDeque::new(),
            stats: Arc::new(Mutex::new(MockStats::default())),
            cancel_on_drain: None,
        }
    }

    /// Cancels `token` once the scripted samples run out, so a pipeline
    /// driving this fake shuts down cleanly by itself.
    #[must_use]
    pub fn cancel_when_drained(mut self, token: CancelToken) -> Self {
        self.cancel_on_drain = Some(token);
        self
    }

    /// Queues a transfer error to be returned by an upcoming transfer call.
    pub fn inject_error(&mut self, error: TransferError) {
        self.injected.push_back(error);
    }

    /// Shared handle to this device's action counters.
    #[must_use]
    pub fn stats(&self) -> Arc<Mutex<MockStats>> {
        Arc::clone(&self.stats)
    }

    fn remaining_frames(&self) -> usize {
        (self.samples.len() - self.pos) / self.descriptor.channels
    }
}

impl AudioDevice for MockCapture {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn start(&mut self) -> Result<(), MonitorError> {
        self.stats.lock().expect("mock stats poisoned").starts += 1;
        Ok(())
    }

    fn wait_ready(&mut self, _timeout: Option<Duration>) -> Result<bool, TransferError> {
        if self.remaining_frames() == 0 {
            if let Some(token) = &self.cancel_on_drain {
                token.cancel();
            }
            return Ok(false); // behaves like a timeout
        }
        Ok(true)
    }

    fn avail(&mut self) -> Result<usize, TransferError> {
        Ok(self.remaining_frames().min(self.chunk_frames))
    }

    fn read_frames(&mut self, buf: &mut [i16]) -> Result<usize, TransferError> {
        if let Some(err) = self.injected.pop_front() {
            return Err(err);
        }
        let channels = self.descriptor.channels;
        let frames = (buf.len() / channels)
            .min(self.remaining_frames())
            .min(self.chunk_frames);
        let count = frames * channels;
        buf[..count].copy_from_slice(&self.samples[self.pos..self.pos + count]);
        self.pos += count;
        self.stats.lock().expect("mock stats poisoned").frames_moved += frames;
        Ok(frames)
    }

    fn write_frames(&mut self, _buf: &[i16]) -> Result<usize, TransferError> {
        Err(TransferError::Other(
            "capture device is not writable".to_string(),
        ))
    }

    fn recover(&mut self, error: &TransferError) -> Result<(), MonitorError> {
        apply_recovery(&self.stats, error)
    }
}

/// A fake playback device collecting everything written to it.
pub struct MockPlayback {
    descriptor: DeviceDescriptor,
    sink: Arc<Mutex<Vec<i16>>>,
    injected: VecDeque<TransferError>,
    stats: Arc<Mutex<MockStats>>,
    max_frames_per_write: usize,
}

impl MockPlayback {
    /// Creates a playback fake accepting any amount per write.
    pub fn new(channels: usize) -> Self {
        let mut descriptor = DeviceDescriptor::default_device(Direction::Playback);
        descriptor.channels = channels;
        Self {
            descriptor,
            sink: Arc::new(Mutex::new(Vec::new())),
            injected: VecDeque::new(),
            stats: Arc::new(Mutex::new(MockStats::default())),
            max_frames_per_write: usize::MAX,
        }
    }

    /// Caps how many frames a single write accepts, to exercise the
    /// pipeline's partial-transfer handling.
    #[must_use]
    pub fn with_write_limit(mut self, frames: usize) -> Self {
        self.max_frames_per_write = frames;
        self
    }

    /// Queues a transfer error to be returned by an upcoming write.
    pub fn inject_error(&mut self, error: TransferError) {
        self.injected.push_back(error);
    }

    /// Shared handle to the samples played so far.
    #[must_use]
    pub fn sink(&self) -> Arc<Mutex<Vec<i16>>> {
        Arc::clone(&self.sink)
    }

    /// Shared handle to this device's action counters.
    #[must_use]
    pub fn stats(&self) -> Arc<Mutex<MockStats>> {
        Arc::clone(&self.stats)
    }
}

impl AudioDevice for MockPlayback {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn start(&mut self) -> Result<(), MonitorError> {
        self.stats.lock().expect("mock stats poisoned").starts += 1;
        Ok(())
    }

    fn wait_ready(&mut self, _timeout: Option<Duration>) -> Result<bool, TransferError> {
        Ok(true)
    }

    fn avail(&mut self) -> Result<usize, TransferError> {
        Ok(self.max_frames_per_write)
    }

    fn read_frames(&mut self, _buf: &mut [i16]) -> Result<usize, TransferError> {
        Err(TransferError::Other(
            "playback device is not readable".to_string(),
        ))
    }

    fn write_frames(&mut self, buf: &[i16]) -> Result<usize, TransferError> {
        if let Some(err) = self.injected.pop_front() {
            return Err(err);
        }
        let channels = self.descriptor.channels;
        let frames = (buf.len() / channels).min(self.max_frames_per_write);
        self.sink
            .lock()
            .expect("mock sink poisoned")
            .extend_from_slice(&buf[..frames * channels]);
        self.stats.lock().expect("mock stats poisoned").frames_moved += frames;
        Ok(frames)
    }

    fn recover(&mut self, error: &TransferError) -> Result<(), MonitorError> {
        apply_recovery(&self.stats, error)
    }

    fn drain(&mut self) -> Result<(), MonitorError> {
        self.stats.lock().expect("mock stats poisoned").drains += 1;
        Ok(())
    }
}
