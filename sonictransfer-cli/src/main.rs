mod config;
mod logging;
mod telemetry;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use config::CliConfig;
use logging::{LogEvent, StructuredLogger};
use sonictransfer_core::audio_io::{BufferSink, BufferSource};
use sonictransfer_core::calibration::{CalibrationResult, Calibrator};
use sonictransfer_core::config::{AudioParams, CalibrationKind, Profile};
use sonictransfer_core::logging::{SessionEvent, SignalLogger, TransferStatus};
use sonictransfer_core::protocol::preamble_sample_count;
use sonictransfer_core::session::{ReceiverSession, SenderSession};
use telemetry::TelemetryAggregator;

#[derive(Parser, Debug)]
#[command(author, version, about = "SonicTransfer acoustic file-transfer modem", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file overriding sender/power/logging defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the channel and write the chosen carrier frequencies to a JSON file.
    Calibrate {
        /// WAV recording of ambient channel noise.
        #[arg(short, long)]
        input: PathBuf,

        /// Profile name: fast, standard, or robust.
        #[arg(short, long, default_value = "standard")]
        profile: String,

        /// Where to write the calibration result JSON.
        #[arg(short, long)]
        output: PathBuf,

        /// Use the quick (2s) preset instead of the full (3s) one.
        #[arg(long)]
        quick: bool,
    },

    /// Encode a file as audio and write it to a WAV file.
    Send {
        /// File to transmit.
        #[arg(short, long)]
        input: PathBuf,

        /// WAV file to write the modulated signal to.
        #[arg(short, long)]
        output: PathBuf,

        /// Profile name: fast, standard, or robust.
        #[arg(short, long, default_value = "standard")]
        profile: String,

        /// Calibration result JSON produced by `calibrate`.
        #[arg(long)]
        calibration: PathBuf,
    },

    /// Decode a WAV recording back into a file.
    Receive {
        /// WAV recording of the received signal.
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the decoded file.
        #[arg(short, long)]
        output: PathBuf,

        /// Profile name: fast, standard, or robust.
        #[arg(short, long, default_value = "standard")]
        profile: String,

        /// Calibration result JSON produced by `calibrate`.
        #[arg(long)]
        calibration: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => {
            CliConfig::from_file(path).wrap_err_with(|| format!("Failed to load config from {}", path.display()))?
        }
        None => CliConfig::default(),
    };

    let mut logger = StructuredLogger::new(config.terminal.logging.clone())?;

    match args.command {
        Command::Calibrate { input, profile, output, quick } => {
            run_calibrate(&mut logger, input, profile, output, quick)
        }
        Command::Send { input, output, profile, calibration } => {
            run_send(&config, &mut logger, input, output, profile, calibration)
        }
        Command::Receive { input, output, profile, calibration } => {
            run_receive(&config, &mut logger, input, output, profile, calibration)
        }
    }
}

fn profile_by_name(name: &str) -> Result<Profile> {
    Profile::by_name(name).ok_or_else(|| eyre!("unknown profile \"{}\" (expected fast, standard, or robust)", name))
}

fn read_wav_mono_f32(path: &PathBuf) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).wrap_err_with(|| format!("failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let mono = if spec.channels > 1 {
        samples
            .chunks(spec.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        samples
    };

    Ok((mono, sample_rate))
}

fn write_wav_mono_f32(path: &PathBuf, pcm: &[f32], sample_rate_hz: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .wrap_err_with(|| format!("failed to create WAV file: {}", path.display()))?;
    for &sample in pcm {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn run_calibrate(
    logger: &mut StructuredLogger,
    input: PathBuf,
    profile_name: String,
    output: PathBuf,
    quick: bool,
) -> Result<()> {
    let profile = profile_by_name(&profile_name)?;
    let audio = AudioParams::default();
    let (pcm, sample_rate_hz) = read_wav_mono_f32(&input)?;

    let mut source = BufferSource::new(pcm, sample_rate_hz, audio.fft_size);
    let calibrator = Calibrator::new(audio);
    let duration_ms = if quick {
        CalibrationKind::Quick.duration_ms()
    } else {
        CalibrationKind::Full.duration_ms()
    };

    let result = calibrator
        .calibrate(duration_ms, &profile, || {
            source.next_spectrum().unwrap_or_else(|| vec![0u8; audio.fft_size / 2])
        })
        .map_err(|e| eyre!("calibration failed: {}", e))?;

    std::fs::write(&output, result.to_json()?).wrap_err_with(|| format!("failed to write {}", output.display()))?;

    logger.log(LogEvent::Info {
        message: format!("calibrated {} carriers, wrote {}", result.frequencies_hz.len(), output.display()),
    })?;
    Ok(())
}

fn run_send(
    config: &CliConfig,
    logger: &mut StructuredLogger,
    input: PathBuf,
    output: PathBuf,
    profile_name: String,
    calibration_path: PathBuf,
) -> Result<()> {
    let profile = profile_by_name(&profile_name)?;
    let audio = AudioParams::default();
    let calibration_json = std::fs::read_to_string(&calibration_path)
        .wrap_err_with(|| format!("failed to read calibration file: {}", calibration_path.display()))?;
    let calibration = CalibrationResult::from_json(&calibration_json)?;

    let file_bytes = std::fs::read(&input).wrap_err_with(|| format!("failed to read input file: {}", input.display()))?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "payload.bin".to_string());
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut session = SenderSession::new(profile, audio, calibration, config.sender, config.power);
    let mut sink = BufferSink::default();
    let mut core_logger = SignalLogger::new(config.terminal.logging.to_core_log_config());

    let bar = ProgressBar::new(file_bytes.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} ({eta})") {
        bar.set_style(style);
    }
    let mut telemetry = TelemetryAggregator::new(0.5);

    session
        .send(&file_bytes, &filename, timestamp, &mut sink, &mut core_logger, |event| {
            if let SessionEvent::ChunkSent { index, total } = event {
                let chunk_bytes = file_bytes.len() / total.max(1) as usize;
                telemetry.record_chunk(index, total, chunk_bytes);
                bar.set_position(telemetry.bytes_done());
                if let Some(sample) = telemetry.sample() {
                    bar.set_message(format!("{}/{} chunks", sample.chunks_done, sample.chunks_total));
                }
            }
        })
        .map_err(|e| eyre!("send failed: {}", e))?;
    bar.finish_and_clear();

    write_wav_mono_f32(&output, &sink.samples, audio.sample_rate_hz)?;

    for entry in core_logger.entries() {
        logger.log(LogEvent::Info {
            message: format!("[{}] {}", entry.subsystem, entry.message),
        })?;
    }

    logger.log(LogEvent::Summary(telemetry.summary("sent")))?;
    logger.log(LogEvent::Info {
        message: format!("wrote {} samples to {}", sink.samples.len(), output.display()),
    })?;
    Ok(())
}

fn run_receive(
    config: &CliConfig,
    logger: &mut StructuredLogger,
    input: PathBuf,
    output: PathBuf,
    profile_name: String,
    calibration_path: PathBuf,
) -> Result<()> {
    let profile = profile_by_name(&profile_name)?;
    let audio = AudioParams::default();
    let calibration_json = std::fs::read_to_string(&calibration_path)
        .wrap_err_with(|| format!("failed to read calibration file: {}", calibration_path.display()))?;
    let calibration = CalibrationResult::from_json(&calibration_json)?;

    let (pcm, sample_rate_hz) = read_wav_mono_f32(&input)?;
    let mut source = BufferSource::aligned_to_symbol(
        pcm,
        sample_rate_hz,
        audio.fft_size,
        profile.symbol_duration_ms,
        preamble_sample_count(&audio),
    );

    let mut receiver = ReceiverSession::new(profile, audio, calibration);
    let mut core_logger = SignalLogger::new(config.terminal.logging.to_core_log_config());
    let mut telemetry = TelemetryAggregator::new(0.5);

    let received = receiver
        .run(&mut source, &mut core_logger, |event| {
            if let SessionEvent::ChunkReceived { index } = event {
                telemetry.record_chunk(index, index + 1, 0);
            }
        })
        .ok_or_else(|| eyre!("no End packet recovered from {}", input.display()))?;

    std::fs::write(&output, &received.bytes).wrap_err_with(|| format!("failed to write {}", output.display()))?;

    for entry in core_logger.entries() {
        logger.log(LogEvent::Info {
            message: format!("[{}] {}", entry.subsystem, entry.message),
        })?;
    }

    let status = match received.status {
        TransferStatus::Verified => "verified",
        TransferStatus::IntegrityMismatch => "integrity-mismatch",
    };
    logger.log(LogEvent::Summary(telemetry.summary(status)))?;
    logger.log(LogEvent::Info {
        message: format!(
            "wrote {} bytes ({}) to {}",
            received.bytes.len(),
            received.metadata.filename,
            output.display()
        ),
    })?;

    if received.status == TransferStatus::IntegrityMismatch {
        return Err(eyre!("integrity check failed for {}", received.metadata.filename));
    }
    Ok(())
}
