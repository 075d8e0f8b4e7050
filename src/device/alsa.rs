//! ALSA hardware backend.
//!
//! One open path negotiates both directions: interleaved access, S16LE,
//! rate and channel count against hardware capability, then the software
//! thresholds (`avail_min` before a wait returns, `start_threshold` = 0 so
//! transfer begins on the first queued data). The PCM is opened in
//! non-blocking mode; `EAGAIN` on a transfer simply means zero frames moved.

use std::thread;
use std::time::Duration;

use alsa::pcm::{Access, Format, Frames, HwParams, State, PCM};
use alsa::ValueOr;

use crate::config::{DeviceDescriptor, Direction};
use crate::device::AudioDevice;
use crate::error::{MonitorError, TransferError};

/// Minimum frames available before a wait returns.
const AVAIL_MIN: Frames = 1024;

/// Delay between resume attempts while a suspended device reports try-again.
const RESUME_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Bound on resume attempts before falling back to prepare + restart.
const RESUME_RETRY_LIMIT: u32 = 100;

/// An ALSA PCM stream, capture or playback depending on its descriptor.
pub struct AlsaDevice {
    pcm: PCM,
    descriptor: DeviceDescriptor,
}

impl AlsaDevice {
    /// Opens and negotiates a PCM stream from the descriptor, leaving the
    /// device in the prepared state.
    ///
    /// A parameter the hardware rejects surfaces as
    /// [`MonitorError::Negotiation`] naming that parameter.
    pub fn open(descriptor: DeviceDescriptor) -> Result<Self, MonitorError> {
        let direction = match descriptor.direction {
            Direction::Capture => alsa::Direction::Capture,
            Direction::Playback => alsa::Direction::Playback,
        };

        let pcm = PCM::new(&descriptor.name, direction, true).map_err(|e| {
            MonitorError::DeviceOpen {
                name: descriptor.name.clone(),
                reason: e.to_string(),
            }
        })?;

        {
            let hwp = HwParams::any(&pcm).map_err(negotiation("hardware parameter space"))?;
            hwp.set_access(Access::RWInterleaved)
                .map_err(negotiation("interleaved access"))?;
            hwp.set_format(Format::S16LE)
                .map_err(negotiation("S16LE sample format"))?;
            hwp.set_rate(descriptor.sample_rate, ValueOr::Nearest)
                .map_err(negotiation("sample rate"))?;
            let negotiated = hwp.get_rate().map_err(negotiation("sample rate"))?;
            if negotiated != descriptor.sample_rate {
                return Err(MonitorError::Negotiation {
                    parameter: "sample rate",
                    reason: format!(
                        "requested {} Hz, hardware offers {} Hz",
                        descriptor.sample_rate, negotiated
                    ),
                });
            }
            hwp.set_channels(descriptor.channels as u32)
                .map_err(negotiation("channel count"))?;
            pcm.hw_params(&hwp)
                .map_err(negotiation("hardware parameters"))?;
        }

        {
            let swp = pcm
                .sw_params_current()
                .map_err(negotiation("software parameters"))?;
            swp.set_avail_min(AVAIL_MIN)
                .map_err(negotiation("avail_min threshold"))?;
            swp.set_start_threshold(0)
                .map_err(negotiation("start threshold"))?;
            pcm.sw_params(&swp)
                .map_err(negotiation("software parameters"))?;
        }

        pcm.prepare().map_err(|e| MonitorError::DeviceOpen {
            name: descriptor.name.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(
            device = %descriptor.name,
            direction = ?descriptor.direction,
            rate = descriptor.sample_rate,
            channels = descriptor.channels,
            "pcm opened"
        );

        Ok(Self { pcm, descriptor })
    }

    fn prepare_and_restart(&mut self) -> Result<(), MonitorError> {
        self.pcm
            .prepare()
            .map_err(|e| MonitorError::fatal(format!("prepare failed: {e}")))?;
        self.pcm
            .start()
            .map_err(|e| MonitorError::fatal(format!("restart failed: {e}")))?;
        Ok(())
    }
}

/// Maps an ALSA error on a transfer call to its recovery class.
fn classify(err: &alsa::Error) -> TransferError {
    match err.errno() {
        libc::EPIPE => TransferError::Underrun,
        libc::ESTRPIPE => TransferError::Suspended,
        _ => TransferError::Other(err.to_string()),
    }
}

fn negotiation(parameter: &'static str) -> impl Fn(alsa::Error) -> MonitorError {
    move |e| MonitorError::Negotiation {
        parameter,
        reason: e.to_string(),
    }
}

impl AudioDevice for AlsaDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn start(&mut self) -> Result<(), MonitorError> {
        if self.pcm.state() == State::Running {
            return Ok(());
        }
        self.pcm
            .start()
            .map_err(|e| MonitorError::fatal(format!("start failed: {e}")))
    }

    fn wait_ready(&mut self, timeout: Option<Duration>) -> Result<bool, TransferError> {
        let timeout_ms = timeout.map(|t| t.as_millis() as u32);
        self.pcm.wait(timeout_ms).map_err(|e| classify(&e))
    }

    fn avail(&mut self) -> Result<usize, TransferError> {
        self.pcm
            .avail_update()
            .map(|frames| frames.max(0) as usize)
            .map_err(|e| classify(&e))
    }

    fn read_frames(&mut self, buf: &mut [i16]) -> Result<usize, TransferError> {
        let io = self.pcm.io_i16().map_err(|e| classify(&e))?;
        match io.readi(buf) {
            Ok(frames) => Ok(frames),
            Err(e) if e.errno() == libc::EAGAIN => Ok(0),
            Err(e) => Err(classify(&e)),
        }
    }

    fn write_frames(&mut self, buf: &[i16]) -> Result<usize, TransferError> {
        let io = self.pcm.io_i16().map_err(|e| classify(&e))?;
        match io.writei(buf) {
            Ok(frames) => Ok(frames),
            Err(e) if e.errno() == libc::EAGAIN => Ok(0),
            Err(e) => Err(classify(&e)),
        }
    }

    fn recover(&mut self, error: &TransferError) -> Result<(), MonitorError> {
        match error {
            TransferError::Underrun => {
                tracing::warn!(device = %self.descriptor.name, "xrun, preparing and restarting");
                self.prepare_and_restart()
            }
            TransferError::Suspended => {
                tracing::warn!(device = %self.descriptor.name, "suspended, resuming");
                let mut attempts = 0;
                loop {
                    match self.pcm.resume() {
                        Ok(()) => {
                            return self
                                .pcm
                                .start()
                                .map_err(|e| MonitorError::fatal(format!("restart failed: {e}")));
                        }
                        Err(e) if e.errno() == libc::EAGAIN => {
                            attempts += 1;
                            if attempts >= RESUME_RETRY_LIMIT {
                                // Device never came back; treat like an xrun.
                                return self.prepare_and_restart();
                            }
                            thread::sleep(RESUME_RETRY_DELAY);
                        }
                        Err(e) if e.errno() == libc::ENOSYS => {
                            // Resume unsupported: definitive failure.
                            return self.prepare_and_restart();
                        }
                        Err(e) => {
                            return Err(MonitorError::fatal(format!("resume failed: {e}")));
                        }
                    }
                }
            }
            TransferError::Other(reason) => Err(MonitorError::fatal(reason.clone())),
        }
    }

    fn drain(&mut self) -> Result<(), MonitorError> {
        if self.descriptor.direction == Direction::Playback {
            self.pcm
                .drain()
                .map_err(|e| MonitorError::fatal(format!("drain failed: {e}")))?;
        }
        Ok(())
    }
}
