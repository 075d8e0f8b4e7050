//! Command-line front end for monitor-audio.
//!
//! `live` monitors a capture device through to a playback device, with
//! optional band filtering and a terminal spectrum view; `filter` applies
//! the same band mask to a WAV file offline. SIGINT only sets the
//! pipeline's cancellation token - shutdown is always cooperative.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
#[cfg(unix)]
use std::sync::OnceLock;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use monitor_audio::{CancelToken, MonitorError, PassBand};

#[derive(Parser)]
#[command(name = "monitor-audio")]
#[command(about = "Real-time audio monitor with spectral band filtering")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor a capture device through to a playback device.
    Live {
        /// Capture device name.
        #[arg(long, default_value = "default")]
        ipcm: String,

        /// Playback device name.
        #[arg(long, default_value = "default")]
        opcm: String,

        /// Channel count (1 or 2).
        #[arg(long, default_value_t = 1)]
        channels: usize,

        /// Sample rate in Hz.
        #[arg(long, default_value_t = 44_100)]
        rate: u32,

        /// Enable spectral band filtering.
        #[arg(long)]
        filter: bool,

        /// Pass band as "low:high" in Hz; repeatable. An open bound
        /// defaults to 0 or the Nyquist frequency. With --filter and no
        /// bands, the voice band 80:260 is used.
        #[arg(long = "band", value_name = "LOW:HIGH")]
        bands: Vec<BandArg>,

        /// Processing block length in frames (power of two).
        #[arg(long, default_value_t = 8192)]
        block_len: usize,

        /// Draw the magnitude spectrum in the terminal.
        #[arg(long)]
        visualize: bool,
    },

    /// Band-pass filter a 16-bit PCM WAV file offline.
    Filter {
        /// Input WAV path.
        #[arg(long)]
        ipath: PathBuf,

        /// Output WAV path.
        #[arg(long)]
        opath: PathBuf,

        /// Pass band as "low:high" in Hz; repeatable. Defaults to the
        /// voice band 80:260.
        #[arg(long = "band", value_name = "LOW:HIGH")]
        bands: Vec<BandArg>,

        /// Processing block length in frames (power of two).
        #[arg(long, default_value_t = 8192)]
        block_len: usize,
    },
}

/// A "low:high" band with either bound optional.
#[derive(Debug, Clone)]
struct BandArg {
    low: f64,
    high: Option<f64>,
}

impl FromStr for BandArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = s
            .split_once(':')
            .ok_or_else(|| format!("band '{s}' is not in low:high form"))?;
        let low = if low.is_empty() {
            0.0
        } else {
            low.parse::<f64>().map_err(|e| format!("bad low bound: {e}"))?
        };
        let high = if high.is_empty() {
            None
        } else {
            Some(high.parse::<f64>().map_err(|e| format!("bad high bound: {e}"))?)
        };
        Ok(Self { low, high })
    }
}

/// Resolves CLI band arguments against a stream's sample rate, falling back
/// to the documented voice band when none were given.
fn resolve_bands(args: &[BandArg], sample_rate: u32) -> Result<Vec<PassBand>, MonitorError> {
    if args.is_empty() {
        return Ok(vec![PassBand::VOICE]);
    }
    let nyquist = f64::from(sample_rate) / 2.0;
    args.iter()
        .map(|arg| PassBand::new(arg.low, arg.high.unwrap_or(nyquist), sample_rate))
        .collect()
}

#[cfg(unix)]
static SIGINT_TOKEN: OnceLock<CancelToken> = OnceLock::new();

#[cfg(unix)]
extern "C" fn on_sigint(_: libc::c_int) {
    if let Some(token) = SIGINT_TOKEN.get() {
        token.cancel();
    }
}

#[cfg(unix)]
fn register_sigint(token: CancelToken) {
    let _ = SIGINT_TOKEN.set(token);
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_sigint as libc::sighandler_t;
        libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut());
    }
}

#[cfg(not(unix))]
fn register_sigint(_token: CancelToken) {}

#[cfg(all(target_os = "linux", feature = "alsa-backend"))]
#[allow(clippy::too_many_arguments)]
fn run_live(
    ipcm: String,
    opcm: String,
    channels: usize,
    rate: u32,
    filter: bool,
    bands: &[BandArg],
    block_len: usize,
    visualize: bool,
    cancel: CancelToken,
) -> Result<(), MonitorError> {
    use monitor_audio::{
        AlsaDevice, DeviceDescriptor, Direction, MonitorConfig, PipelineLoop, TerminalVisualizer,
    };

    let config = MonitorConfig {
        block_len,
        filter: if filter {
            Some(resolve_bands(bands, rate)?)
        } else {
            None
        },
        ..Default::default()
    };

    let capture = AlsaDevice::open(DeviceDescriptor {
        name: ipcm,
        direction: Direction::Capture,
        channels,
        sample_rate: rate,
    })?;
    let playback = AlsaDevice::open(DeviceDescriptor {
        name: opcm,
        direction: Direction::Playback,
        channels,
        sample_rate: rate,
    })?;

    let mut pipeline = PipelineLoop::new(Box::new(capture), Box::new(playback), &config, cancel)?;
    if visualize {
        pipeline = pipeline.with_visualizer(Box::new(TerminalVisualizer::new()));
    }
    pipeline.run()
}

#[cfg(not(all(target_os = "linux", feature = "alsa-backend")))]
#[allow(clippy::too_many_arguments)]
fn run_live(
    _ipcm: String,
    _opcm: String,
    _channels: usize,
    _rate: u32,
    _filter: bool,
    _bands: &[BandArg],
    _block_len: usize,
    _visualize: bool,
    _cancel: CancelToken,
) -> Result<(), MonitorError> {
    Err(MonitorError::invalid_config(
        "live monitoring needs the alsa-backend feature on Linux".to_string(),
    ))
}

fn run(cli: Cli) -> Result<(), MonitorError> {
    match cli.command {
        Command::Live {
            ipcm,
            opcm,
            channels,
            rate,
            filter,
            bands,
            block_len,
            visualize,
        } => {
            let cancel = CancelToken::new();
            register_sigint(cancel.clone());
            run_live(
                ipcm, opcm, channels, rate, filter, &bands, block_len, visualize, cancel,
            )
        }
        Command::Filter {
            ipath,
            opath,
            bands,
            block_len,
        } => {
            let (spec, samples) = monitor_audio::wav::read_wav(&ipath)?;
            let bands = resolve_bands(&bands, spec.sample_rate)?;
            let filtered = monitor_audio::offline::filter_samples(
                &samples,
                spec.channels as usize,
                spec.sample_rate,
                &bands,
                block_len,
            )?;
            monitor_audio::wav::write_wav(&opath, spec, &filtered)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
