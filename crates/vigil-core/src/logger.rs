//! Session-scoped, leveled, dual-sink logger.
//!
//! A [`Logger`] is created by the orchestrator when a session starts and is
//! handed to every component. Each accepted entry goes to:
//! - the console sink, emitted as a `tracing` event carrying `component`
//! - the file sink, appended as `timestamp - LEVEL - component - message`
//!
//! Logging never fails the caller. If the file sink cannot be opened or a
//! write fails, the logger downgrades to console-only for the rest of the
//! session.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;

const RULE: &str = "================================================================================";

/// Ordered severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink toggles and level filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerOptions {
    pub console: bool,
    pub file: bool,
    pub min_level: LogLevel,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            console: true,
            file: true,
            min_level: LogLevel::Info,
        }
    }
}

impl LoggerOptions {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            console: config.console_logging,
            file: config.file_logging,
            min_level: if config.verbose_logging {
                LogLevel::Debug
            } else {
                LogLevel::Info
            },
        }
    }
}

/// Per-level entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCounts {
    pub debug: u64,
    pub info: u64,
    pub warning: u64,
    pub error: u64,
    pub critical: u64,
}

impl LogCounts {
    pub fn total(&self) -> u64 {
        self.debug + self.info + self.warning + self.error + self.critical
    }
}

struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

struct Inner {
    session_id: String,
    options: LoggerOptions,
    file: Mutex<Option<FileSink>>,
    counts: [AtomicU64; 5],
    started: Instant,
    closed: AtomicBool,
}

/// Cloneable handle to a session logger.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("session_id", &self.inner.session_id)
            .field("options", &self.inner.options)
            .field("log_path", &self.log_path())
            .finish()
    }
}

impl Logger {
    /// Open a session logger writing to `log_dir/<session_id>.log`.
    ///
    /// Creates `log_dir` and writes a header block naming `component`, the
    /// start time and the log path. Any failure leaves the logger console-only.
    pub fn open(session_id: &str, log_dir: &Path, component: &str, options: LoggerOptions) -> Self {
        let started_at = Utc::now();
        let file = if options.file {
            match open_file_sink(session_id, log_dir, component, started_at) {
                Ok(sink) => Some(sink),
                Err(e) => {
                    tracing::warn!(
                        event = "logger.file_sink_unavailable",
                        log_dir = %log_dir.display(),
                        error = %e,
                    );
                    None
                }
            }
        } else {
            None
        };
        Self::with_sink(session_id, options, file)
    }

    /// Logger without a file sink.
    pub fn console_only(session_id: &str, min_level: LogLevel) -> Self {
        let options = LoggerOptions {
            console: true,
            file: false,
            min_level,
        };
        Self::with_sink(session_id, options, None)
    }

    /// Logger that discards everything but still counts entries.
    pub fn silent() -> Self {
        let options = LoggerOptions {
            console: false,
            file: false,
            min_level: LogLevel::Debug,
        };
        Self::with_sink("silent", options, None)
    }

    fn with_sink(session_id: &str, options: LoggerOptions, file: Option<FileSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                session_id: session_id.to_string(),
                options,
                file: Mutex::new(file),
                counts: Default::default(),
                started: Instant::now(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn min_level(&self) -> LogLevel {
        self.inner.options.min_level
    }

    /// Path of the active file sink, if any.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.file_guard().as_ref().map(|s| s.path.clone())
    }

    pub fn file_sink_active(&self) -> bool {
        self.file_guard().is_some()
    }

    /// Record one entry. Entries below the minimum level are dropped.
    pub fn log(&self, level: LogLevel, component: &str, message: impl AsRef<str>) {
        if level < self.inner.options.min_level {
            return;
        }
        let message = message.as_ref();
        self.inner.counts[level.index()].fetch_add(1, Ordering::Relaxed);

        if self.inner.options.console {
            emit_console(level, component, message);
        }

        let mut guard = self.file_guard();
        if let Some(sink) = guard.as_mut() {
            let line = format!(
                "{} - {:<8} - {} - {}\n",
                Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                level.as_str(),
                component,
                message
            );
            let written = sink
                .writer
                .write_all(line.as_bytes())
                .and_then(|_| sink.writer.flush());
            if let Err(e) = written {
                let path = sink.path.clone();
                *guard = None;
                tracing::warn!(
                    event = "logger.file_sink_disabled",
                    path = %path.display(),
                    error = %e,
                );
            }
        }
    }

    pub fn debug(&self, component: &str, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, component, message);
    }

    pub fn info(&self, component: &str, message: impl AsRef<str>) {
        self.log(LogLevel::Info, component, message);
    }

    pub fn warning(&self, component: &str, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, component, message);
    }

    pub fn error(&self, component: &str, message: impl AsRef<str>) {
        self.log(LogLevel::Error, component, message);
    }

    pub fn critical(&self, component: &str, message: impl AsRef<str>) {
        self.log(LogLevel::Critical, component, message);
    }

    /// Handle that tags every entry with `component`.
    pub fn scoped(&self, component: impl Into<String>) -> ScopedLogger {
        ScopedLogger {
            logger: self.clone(),
            component: component.into(),
        }
    }

    pub fn counts(&self) -> LogCounts {
        let c = |l: LogLevel| self.inner.counts[l.index()].load(Ordering::Relaxed);
        LogCounts {
            debug: c(LogLevel::Debug),
            info: c(LogLevel::Info),
            warning: c(LogLevel::Warning),
            error: c(LogLevel::Error),
            critical: c(LogLevel::Critical),
        }
    }

    /// Write the footer block and flush. Only the first call has an effect.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let counts = self.counts();
        let elapsed = self.inner.started.elapsed().as_secs_f64();
        let mut guard = self.file_guard();
        if let Some(sink) = guard.as_mut() {
            let footer = format!(
                "{RULE}\nSession {} closed at {}\nElapsed: {:.2}s | entries: {} (warnings: {}, errors: {}, critical: {})\n{RULE}\n",
                self.inner.session_id,
                Utc::now().to_rfc3339(),
                elapsed,
                counts.total(),
                counts.warning,
                counts.error,
                counts.critical,
            );
            if sink
                .writer
                .write_all(footer.as_bytes())
                .and_then(|_| sink.writer.flush())
                .is_err()
            {
                *guard = None;
            }
        }
    }

    fn file_guard(&self) -> MutexGuard<'_, Option<FileSink>> {
        // A panic while holding the lock leaves the sink usable.
        self.inner
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn open_file_sink(
    session_id: &str,
    log_dir: &Path,
    component: &str,
    started_at: DateTime<Utc>,
) -> std::io::Result<FileSink> {
    std::fs::create_dir_all(log_dir)?;
    let path = log_dir.join(format!("{session_id}.log"));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let mut writer = BufWriter::new(file);
    write!(
        writer,
        "{RULE}\nComponent: {component}\nSession: {session_id}\nStarted: {}\nLog file: {}\n{RULE}\n",
        started_at.to_rfc3339(),
        path.display()
    )?;
    writer.flush()?;
    Ok(FileSink { path, writer })
}

fn emit_console(level: LogLevel, component: &str, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!(component = %component, "{}", message),
        LogLevel::Info => tracing::info!(component = %component, "{}", message),
        LogLevel::Warning => tracing::warn!(component = %component, "{}", message),
        LogLevel::Error => tracing::error!(component = %component, "{}", message),
        LogLevel::Critical => {
            tracing::error!(component = %component, severity = "critical", "{}", message)
        }
    }
}

/// Logger bound to one component name.
#[derive(Debug, Clone)]
pub struct ScopedLogger {
    logger: Logger,
    component: String,
}

impl ScopedLogger {
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Nested scope, e.g. `performance/memory_usage`.
    pub fn child(&self, name: &str) -> ScopedLogger {
        self.logger.scoped(format!("{}/{}", self.component, name))
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.logger.log(level, &self.component, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    pub fn critical(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Critical, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file_only(min_level: LogLevel) -> LoggerOptions {
        LoggerOptions {
            console: false,
            file: true,
            min_level,
        }
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
    }

    #[test]
    fn test_header_and_lines_written() {
        let dir = tempdir().expect("tempdir");
        let log_dir = dir.path().join("logs");
        let logger = Logger::open(
            "validation_20260101_000000",
            &log_dir,
            "orchestrator",
            file_only(LogLevel::Info),
        );

        logger.info("integration", "phase started");
        logger.error("integration", "test exploded");
        logger.close();

        let path = logger.log_path().expect("file sink active");
        assert_eq!(path, log_dir.join("validation_20260101_000000.log"));
        let content = std::fs::read_to_string(&path).expect("read log");
        assert!(content.contains("Component: orchestrator"));
        assert!(content.contains("Session: validation_20260101_000000"));
        assert!(content.contains("Log file:"));
        assert!(content.contains("INFO     - integration - phase started"));
        assert!(content.contains("ERROR    - integration - test exploded"));
        assert!(content.contains("closed at"));
    }

    #[test]
    fn test_min_level_filters_both_sinks() {
        let dir = tempdir().expect("tempdir");
        let logger = Logger::open("s", dir.path(), "c", file_only(LogLevel::Warning));

        logger.debug("c", "hidden debug");
        logger.info("c", "hidden info");
        logger.warning("c", "visible warning");

        let content =
            std::fs::read_to_string(logger.log_path().expect("path")).expect("read log");
        assert!(!content.contains("hidden"));
        assert!(content.contains("visible warning"));

        let counts = logger.counts();
        assert_eq!(counts.debug, 0);
        assert_eq!(counts.info, 0);
        assert_eq!(counts.warning, 1);
    }

    #[test]
    fn test_unwritable_dir_downgrades_to_console() {
        let dir = tempdir().expect("tempdir");
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").expect("write blocker");

        let logger = Logger::open("s", &blocker.join("logs"), "c", file_only(LogLevel::Debug));
        assert!(!logger.file_sink_active());

        // Must not panic or error.
        logger.critical("c", "still counted");
        assert_eq!(logger.counts().critical, 1);
    }

    #[test]
    fn test_scoped_logger_tags_component() {
        let dir = tempdir().expect("tempdir");
        let logger = Logger::open("s", dir.path(), "root", file_only(LogLevel::Debug));
        let perf = logger.scoped("performance");
        perf.child("memory_usage").info("measured");

        let content =
            std::fs::read_to_string(logger.log_path().expect("path")).expect("read log");
        assert!(content.contains("performance/memory_usage - measured"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let logger = Logger::open("s", dir.path(), "c", file_only(LogLevel::Info));
        logger.close();
        logger.close();
        let content =
            std::fs::read_to_string(logger.log_path().expect("path")).expect("read log");
        assert_eq!(content.matches("closed at").count(), 1);
    }

    #[test]
    fn test_options_from_config() {
        let config = ValidationConfig {
            verbose_logging: true,
            file_logging: false,
            ..ValidationConfig::default()
        };
        let options = LoggerOptions::from_config(&config);
        assert_eq!(options.min_level, LogLevel::Debug);
        assert!(!options.file);
        assert!(options.console);
    }
}
