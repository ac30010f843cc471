use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tone_pipeline::backend::{AudioOutput, NullOutput, WavOutput};
use tone_pipeline::{Pipeline, PipelineConfig};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "tone_pipeline",
    about = "Real-time sine tone generator feeding a blocking PCM sink"
)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the pipeline and run until the first fatal error
    Run {
        #[command(flatten)]
        settings: Settings,
        #[arg(long, value_enum, default_value_t = SinkKind::Null)]
        sink: SinkKind,
        /// Output file for the wav sink
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = 1000)]
        stats_interval_ms: u64,
    },
    /// Print the resolved configuration, or the reason it is rejected
    Check {
        #[command(flatten)]
        settings: Settings,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SinkKind {
    /// Discard samples at the real-time byte rate
    Null,
    /// Write a 16-bit PCM WAV file
    Wav,
    /// Default output device (needs the `device` feature)
    Device,
}

/// Configuration file plus per-field overrides
#[derive(Args, Debug)]
struct Settings {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    sample_rate: Option<u32>,
    #[arg(long)]
    channels: Option<u16>,
    #[arg(long)]
    frequency: Option<u32>,
    #[arg(long, allow_negative_numbers = true)]
    amplitude: Option<i16>,
    #[arg(long)]
    slots: Option<usize>,
    #[arg(long)]
    samples_per_slot: Option<usize>,
    #[arg(long)]
    capacity: Option<usize>,
}

impl Settings {
    fn resolve(&self) -> PipelineConfig {
        let mut config = self
            .config
            .as_ref()
            .map(PipelineConfig::load_from_file)
            .unwrap_or_default();

        if let Some(rate) = self.sample_rate {
            config.format.sample_rate = rate;
        }
        if let Some(channels) = self.channels {
            config.format.channel_count = channels;
        }
        if let Some(frequency) = self.frequency {
            config.tone.frequency = frequency;
        }
        if let Some(amplitude) = self.amplitude {
            config.tone.amplitude = amplitude;
        }
        if let Some(slots) = self.slots {
            config.buffers.slot_count = slots;
        }
        if let Some(samples) = self.samples_per_slot {
            config.buffers.samples_per_slot = samples;
        }
        if let Some(capacity) = self.capacity {
            config.buffers.channel_capacity = capacity;
        }
        config
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            settings,
            sink,
            output,
            stats_interval_ms,
        } => {
            let config = settings.resolve();
            let interval = Duration::from_millis(stats_interval_ms.max(1));
            match sink {
                SinkKind::Null => run_pipeline(&config, &NullOutput::paced(), interval),
                SinkKind::Wav => {
                    let Some(path) = output else {
                        bail!("--output is required with --sink wav");
                    };
                    run_pipeline(&config, &WavOutput::new(path), interval)
                }
                SinkKind::Device => run_device(&config, interval),
            }
        }
        Commands::Check { settings } => run_check(&settings.resolve()),
    }
}

#[cfg(feature = "device")]
fn run_device(config: &PipelineConfig, interval: Duration) -> Result<ExitCode> {
    run_pipeline(config, &tone_pipeline::backend::CpalOutput, interval)
}

#[cfg(not(feature = "device"))]
fn run_device(_config: &PipelineConfig, _interval: Duration) -> Result<ExitCode> {
    bail!("device sink unavailable: rebuild with `--features device`")
}

fn run_pipeline<O: AudioOutput>(
    config: &PipelineConfig,
    output: &O,
    interval: Duration,
) -> Result<ExitCode> {
    let handle = Pipeline::start(config, output).context("starting pipeline")?;

    let failure = loop {
        if let Some(failure) = handle.wait_timeout(interval) {
            break failure;
        }
        let stats = handle.stats();
        tracing::info!(
            produced = stats.buffers_produced,
            written = stats.buffers_written,
            bytes = stats.bytes_written,
            short_writes = stats.short_writes,
            "pipeline running"
        );
    };

    tracing::error!(
        "Pipeline stopped: {:?} task failed: {}",
        failure.task,
        failure.error
    );
    Ok(ExitCode::from(1))
}

fn run_check(config: &PipelineConfig) -> Result<ExitCode> {
    match config.validate() {
        Ok(()) => {
            println!("{}", serde_json::to_string_pretty(config)?);
            Ok(ExitCode::from(0))
        }
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            Ok(ExitCode::from(2))
        }
    }
}
