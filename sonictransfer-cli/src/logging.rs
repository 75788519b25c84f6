//! Structured logging for the CLI's own lifecycle messages, distinct from
//! the core's in-memory `SignalLogger` (which the session state machines
//! log through and which this logger never touches directly — the CLI
//! drains it separately after a run completes, see `main.rs`).

use crate::config::{LogFormat, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Progress(ProgressEvent),
    Summary(SummaryEvent),
    Info { message: String },
    Warn { message: String },
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    pub chunks_done: u32,
    pub chunks_total: u32,
    pub bytes_done: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub bytes_transferred: u64,
    pub throughput_bytes_per_sec: f64,
    pub status: String,
}

/// Logger that renders `LogEvent`s in one of three formats, mirroring how a
/// production pipeline splits wire-format choice from the events themselves.
pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config
                    .file_path
                    .as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("file_path required for file logging target"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self {
            config,
            writer,
            start_time: Utc::now(),
        })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => serde_json::to_string(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event),
            LogFormat::Pretty => self.format_pretty(&event),
        };

        writeln!(self.writer, "{}", output)?;
        self.writer.flush()?;
        Ok(())
    }

    fn format_logfmt(&self, event: &LogEvent) -> String {
        let ts = Utc::now().to_rfc3339();
        match event {
            LogEvent::Progress(p) => format!(
                "ts=\"{}\" type=progress chunks={}/{} bytes={}",
                ts, p.chunks_done, p.chunks_total, p.bytes_done
            ),
            LogEvent::Summary(s) => format!(
                "ts=\"{}\" type=summary duration_secs={:.2} bytes={} throughput_bps={:.1} status={}",
                ts, s.duration_secs, s.bytes_transferred, s.throughput_bytes_per_sec, s.status
            ),
            LogEvent::Info { message } => format!("ts=\"{}\" level=info msg=\"{}\"", ts, message),
            LogEvent::Warn { message } => format!("ts=\"{}\" level=warn msg=\"{}\"", ts, message),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("ts=\"{}\" level=error msg=\"{}\" details=\"{}\"", ts, message, d),
                None => format!("ts=\"{}\" level=error msg=\"{}\"", ts, message),
            },
        }
    }

    fn format_pretty(&self, event: &LogEvent) -> String {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match event {
            LogEvent::Progress(p) => {
                format!("[{}] PROGRESS: chunk {}/{} ({} bytes sent)", ts, p.chunks_done, p.chunks_total, p.bytes_done)
            }
            LogEvent::Summary(s) => format!(
                "[{}] SUMMARY ({:.2}s): {} bytes at {:.1} B/s | {}",
                ts, s.duration_secs, s.bytes_transferred, s.throughput_bytes_per_sec, s.status
            ),
            LogEvent::Info { message } => format!("[{}] INFO: {}", ts, message),
            LogEvent::Warn { message } => format!("[{}] WARN: {}", ts, message),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("[{}] ERROR: {} | {}", ts, message, d),
                None => format!("[{}] ERROR: {}", ts, message),
            },
        }
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
