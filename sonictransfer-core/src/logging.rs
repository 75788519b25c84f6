//! Structured logging and host-facing session events for SonicTransfer.
//!
//! No external logging facade is used here: log entries are collected into
//! an in-memory `SignalLogger` that a host (CLI, GUI, ...) can drain and
//! render however it likes, mirroring how the rest of the core exposes
//! state to its callers rather than writing to a global sink.

use std::fmt;

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to record.
    pub level: LogLevel,

    /// Enable logging for specific subsystems.
    pub enable_calibration: bool,
    pub enable_modem: bool,
    pub enable_framing: bool,
    pub enable_session: bool,

    /// Maximum number of log entries to keep (for memory management).
    pub max_entries: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_calibration: true,
            enable_modem: true,
            enable_framing: true,
            enable_session: true,
            max_entries: 1000,
        }
    }
}

impl LogConfig {
    /// Verbose logging for debugging.
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            max_entries: 5000,
            ..Self::default()
        }
    }

    /// Quiet logging for production.
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Warn,
            enable_calibration: false,
            enable_modem: false,
            enable_framing: false,
            enable_session: true,
            max_entries: 100,
        }
    }

    /// Disable all logging.
    pub fn disabled() -> Self {
        Self {
            level: LogLevel::Error,
            enable_calibration: false,
            enable_modem: false,
            enable_framing: false,
            enable_session: false,
            max_entries: 0,
        }
    }
}

/// A single log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub subsystem: &'static str,
    pub message: String,
}

/// Logger that collects structured log entries.
#[derive(Debug, Clone)]
pub struct SignalLogger {
    config: LogConfig,
    entries: Vec<LogEntry>,
}

impl SignalLogger {
    pub fn new(config: LogConfig) -> Self {
        let capacity = config.max_entries.min(1000);
        Self {
            config,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Log a message at the specified level.
    pub fn log(&mut self, level: LogLevel, subsystem: &'static str, message: impl fmt::Display) {
        if level < self.config.level {
            return;
        }

        let enabled = match subsystem {
            "CALIBRATION" => self.config.enable_calibration,
            "MODEM" | "SYNC" | "FSK" | "PSK" => self.config.enable_modem,
            "FRAME" | "PACKET" | "CODEC" => self.config.enable_framing,
            "SESSION" => self.config.enable_session,
            _ => true,
        };

        if !enabled {
            return;
        }

        let entry = LogEntry {
            level,
            subsystem,
            message: message.to_string(),
        };

        if self.config.max_entries > 0 {
            if self.entries.len() >= self.config.max_entries {
                self.entries.remove(0);
            }
            self.entries.push(entry);
        }

        #[cfg(any(test, debug_assertions))]
        {
            eprintln!("[{}] {}: {}", level, subsystem, message);
        }
    }

    pub fn trace(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Trace, subsystem, message);
    }

    pub fn debug(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Debug, subsystem, message);
    }

    pub fn info(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Info, subsystem, message);
    }

    pub fn warn(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Warn, subsystem, message);
    }

    pub fn error(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Error, subsystem, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn entries_for_subsystem(&self, subsystem: &str) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.subsystem == subsystem).collect()
    }

    pub fn entries_at_level(&self, level: LogLevel) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.level >= level).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SignalLogger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl fmt::Display for SignalLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "[{}] {}: {}", entry.level, entry.subsystem, entry.message)?;
        }
        Ok(())
    }
}

/// Host-facing lifecycle events (spec.md §6 "Events emitted").
///
/// Sessions push these through a caller-supplied sink rather than a fixed
/// channel type, so the host decides whether that means a callback, an
/// mpsc queue, or a UI dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CalibrationDone { frequencies_hz: Vec<u32> },
    ChunkSent { index: u32, total: u32 },
    ChunkReceived { index: u32 },
    TransferDone { status: TransferStatus },
    Error { kind: &'static str, message: String },
}

/// Final status attached to a completed transfer (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Verified,
    IntegrityMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filtering_by_level() {
        let config = LogConfig {
            level: LogLevel::Info,
            ..Default::default()
        };
        let mut logger = SignalLogger::new(config);

        logger.trace("SESSION", "trace message");
        logger.debug("SESSION", "debug message");
        logger.info("SESSION", "info message");
        logger.warn("SESSION", "warn message");

        assert_eq!(logger.entries().len(), 2);
    }

    #[test]
    fn subsystem_filtering() {
        let config = LogConfig {
            level: LogLevel::Debug,
            enable_calibration: false,
            enable_modem: true,
            ..Default::default()
        };
        let mut logger = SignalLogger::new(config);

        logger.info("CALIBRATION", "probing band");
        logger.info("MODEM", "locked");

        assert_eq!(logger.entries().len(), 1);
        assert_eq!(logger.entries()[0].subsystem, "MODEM");
    }

    #[test]
    fn max_entries_limit_drops_oldest() {
        let config = LogConfig {
            level: LogLevel::Debug,
            max_entries: 3,
            ..Default::default()
        };
        let mut logger = SignalLogger::new(config);

        logger.info("SESSION", "message 1");
        logger.info("SESSION", "message 2");
        logger.info("SESSION", "message 3");
        logger.info("SESSION", "message 4");

        assert_eq!(logger.entries().len(), 3);
        assert!(logger.entries()[0].message.contains("message 2"));
    }
}
