//! The monitor loop: wait, capture, transform, play back, recover.
//!
//! One cooperative flow of control drives every step in sequence, so the
//! ring buffer and spectral block need no locking - they are owned by the
//! loop for its whole lifetime and never shared. The capture device's wait
//! is the single suspension point; it is bounded by a timeout so the
//! cancellation token stays polled.
//!
//! Known limitation: with a single flow, an unexpectedly blocking device
//! wait stalls both directions. Running capture and playback on independent
//! flows would add headroom but is deliberately not done here.

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::{MonitorConfig, PassBand};
use crate::device::AudioDevice;
use crate::error::{MonitorError, TransferError};
use crate::ring::RingBuffer;
use crate::spectral::SpectralBlock;
use crate::viz::Visualizer;

/// Lifecycle of a [`PipelineLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Devices opened, streaming not yet started.
    Idle,
    /// Normal operation.
    Running,
    /// A device transfer failed and recovery is in progress.
    Recovering,
    /// Shutdown requested; flushing in-flight playback.
    Draining,
    /// All devices and buffers released.
    Stopped,
}

/// Orchestrates capture, spectral processing and playback over one ring.
///
/// Frames are captured, optionally transformed, and played back strictly in
/// arrival order; nothing is reordered across blocks. Recoverable transfer
/// errors are handled inside the iteration that hit them, anything else
/// tears the pipeline down with devices released in reverse acquisition
/// order.
pub struct PipelineLoop {
    // Declared before `capture` so teardown releases the playback side
    // first, the reverse of acquisition.
    playback: Box<dyn AudioDevice>,
    capture: Box<dyn AudioDevice>,
    ring: RingBuffer,
    block: SpectralBlock,
    bands: Option<Vec<PassBand>>,
    visualizer: Option<Box<dyn Visualizer>>,
    /// Frames past the read cursor that have already been transformed and
    /// await playback. Always 0 in plain pass-through.
    processed: usize,
    cancel: CancelToken,
    state: PipelineState,
    wait_timeout: Duration,
}

impl PipelineLoop {
    /// Builds a pipeline over an opened device pair.
    ///
    /// The devices must agree on rate and channel count; the ring and the
    /// spectral block are sized from the capture descriptor and `config`.
    pub fn new(
        capture: Box<dyn AudioDevice>,
        playback: Box<dyn AudioDevice>,
        config: &MonitorConfig,
        cancel: CancelToken,
    ) -> Result<Self, MonitorError> {
        let rate = capture.descriptor().sample_rate;
        let channels = capture.descriptor().channels;
        if playback.descriptor().sample_rate != rate
            || playback.descriptor().channels != channels
        {
            return Err(MonitorError::invalid_config(format!(
                "device formats differ: capture {} Hz x{}, playback {} Hz x{}",
                rate,
                channels,
                playback.descriptor().sample_rate,
                playback.descriptor().channels
            )));
        }
        config.validate(rate)?;

        Ok(Self {
            playback,
            capture,
            ring: RingBuffer::new(config.ring_capacity(rate), channels),
            block: SpectralBlock::new(config.block_len, rate, channels)?,
            bands: config.filter.clone(),
            visualizer: None,
            processed: 0,
            cancel,
            state: PipelineState::Idle,
            wait_timeout: config.wait_timeout,
        })
    }

    /// Attaches a magnitude consumer polled once per processed block.
    ///
    /// Visualization is best-effort: a slow consumer may skip frames but is
    /// never allowed to sit between the devices and the ring.
    #[must_use]
    pub fn with_visualizer(mut self, visualizer: Box<dyn Visualizer>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Runs until cancellation or a fatal error.
    ///
    /// Returns `Ok(())` on clean, cancellation-driven shutdown. On a fatal
    /// error the loop stops immediately; dropping the pipeline releases the
    /// devices.
    pub fn run(&mut self) -> Result<(), MonitorError> {
        self.capture.start()?;
        self.playback.start()?;
        self.state = PipelineState::Running;
        tracing::info!(
            rate = self.capture.descriptor().sample_rate,
            channels = self.capture.descriptor().channels,
            block = self.block.block_len(),
            filtered = self.bands.is_some(),
            "pipeline running"
        );

        let result = self.run_loop();
        self.state = PipelineState::Stopped;
        if let Err(e) = &result {
            tracing::error!(error = %e, "pipeline stopped on error");
        }
        result
    }

    fn run_loop(&mut self) -> Result<(), MonitorError> {
        loop {
            if self.cancel.is_cancelled() {
                return self.drain();
            }

            match self.capture.wait_ready(Some(self.wait_timeout)) {
                Ok(true) => {}
                Ok(false) => continue, // timeout: re-check cancellation
                Err(e) => {
                    self.recover(true, &e)?;
                    continue;
                }
            }
            if self.cancel.is_cancelled() {
                return self.drain();
            }

            if let Err(e) = self.capture_into_ring() {
                self.recover(true, &e)?;
                continue;
            }

            if let Err(e) = self.process_and_play() {
                self.recover(false, &e)?;
                continue;
            }
        }
    }

    /// Moves min(device avail, ring free) frames straight into the ring's
    /// writable region, split at the physical wraparound.
    fn capture_into_ring(&mut self) -> Result<(), TransferError> {
        let avail = self.capture.avail()?;
        let mut wanted = avail.min(self.ring.free());
        let channels = self.ring.channels();

        while wanted > 0 {
            let (first, _) = self.ring.write_slices();
            let take = wanted.min(first.len() / channels);
            if take == 0 {
                break;
            }
            let moved = self.capture.read_frames(&mut first[..take * channels])?;
            self.ring
                .advance_write(moved)
                .map_err(|e| TransferError::Other(e.to_string()))?;
            wanted -= moved;
            if moved < take {
                break; // device had less than advertised
            }
        }
        Ok(())
    }

    /// Drains every block (or, unfiltered, every frame) that is ready,
    /// playing it back before waiting on the capture device again.
    ///
    /// `processed` marks how far past the read cursor frames have already
    /// been transformed. Gathering starts there, so each block goes through
    /// the transform exactly once no matter how the playback device slices
    /// its writes; a partially played block is never re-filtered.
    fn process_and_play(&mut self) -> Result<(), TransferError> {
        let spectral = self.bands.is_some() || self.visualizer.is_some();
        if !spectral {
            let ready = self.ring.available();
            if ready > 0 {
                self.play_frames(ready)?;
            }
            return Ok(());
        }

        loop {
            let gathered = self
                .block
                .gather(&self.ring, self.processed)
                .map_err(|e| TransferError::Other(e.to_string()))?;
            if gathered == 0 {
                // Less than one untransformed block buffered: defer.
                break;
            }

            match self.bands.as_deref() {
                Some(bands) => {
                    self.block.filter_block(Some(bands));
                    self.block
                        .scatter(&mut self.ring, self.processed)
                        .map_err(|e| TransferError::Other(e.to_string()))?;
                }
                // Visualization only: take the spectrum, leave the audio
                // untouched - no inverse, no write-back.
                None => self.block.analyze_block(),
            }
            self.processed += gathered;

            if let Some(viz) = &mut self.visualizer {
                if viz.render(self.block.spectrum()) {
                    tracing::info!("stop requested by visualizer");
                    self.cancel.cancel();
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }
        }

        self.play_frames(self.processed)
    }

    /// Plays `wanted` frames from the ring's readable region, wrap-aware,
    /// advancing the read cursor (and shrinking the processed watermark) by
    /// exactly what the device accepted.
    fn play_frames(&mut self, mut wanted: usize) -> Result<(), TransferError> {
        let channels = self.ring.channels();
        while wanted > 0 {
            let (first, _) = self.ring.read_slices();
            let take = wanted.min(first.len() / channels);
            if take == 0 {
                break;
            }
            let moved = self.playback.write_frames(&first[..take * channels])?;
            self.ring
                .advance_read(moved)
                .map_err(|e| TransferError::Other(e.to_string()))?;
            self.processed = self.processed.saturating_sub(moved);
            wanted -= moved;
            if moved < take {
                break; // playback buffer full; frames stay queued
            }
        }
        Ok(())
    }

    /// Applies the recovery policy to the failed device, then resumes
    /// normal operation. Escalation ends the loop.
    fn recover(&mut self, capture_side: bool, error: &TransferError) -> Result<(), MonitorError> {
        self.state = PipelineState::Recovering;
        let device = if capture_side {
            &mut self.capture
        } else {
            &mut self.playback
        };
        tracing::warn!(
            device = %device.descriptor().name,
            capture = capture_side,
            error = %error,
            "recovering device"
        );
        device.recover(error)?;
        self.state = PipelineState::Running;
        Ok(())
    }

    /// Stops accepting capture and flushes in-flight playback.
    ///
    /// Frames already transformed (or, pass-through, every queued frame)
    /// are played out best-effort before the device drains. In filtered
    /// mode a sub-block tail never went through the transform and is
    /// dropped; the count is logged so the loss is observable.
    fn drain(&mut self) -> Result<(), MonitorError> {
        self.state = PipelineState::Draining;
        let spectral = self.bands.is_some() || self.visualizer.is_some();
        let playable = if spectral {
            self.processed
        } else {
            self.ring.available()
        };
        tracing::info!(
            pending = playable,
            dropped = self.ring.available() - playable,
            "draining"
        );
        loop {
            let before = if spectral {
                self.processed
            } else {
                self.ring.available()
            };
            if before == 0 {
                break;
            }
            if let Err(e) = self.play_frames(before) {
                tracing::warn!(error = %e, "pending frames dropped during drain");
                break;
            }
            let after = if spectral {
                self.processed
            } else {
                self.ring.available()
            };
            if after == before {
                break; // device stopped accepting
            }
        }
        self.playback.drain()
    }
}
