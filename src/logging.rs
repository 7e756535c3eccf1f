use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_core::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const LOG_PREFIX: &str = "[Bitbucket Build Status]";
const LOG_FILE_PREFIX: &str = "build_status";

pub type LogLevel = Level;

/// Sink for human-readable diagnostics shown on the build's own console
pub trait BuildListener {
    fn info(&mut self, message: &str);
    fn warn(&mut self, message: &str);
    fn error(&mut self, message: &str);
}

/// Writes prefixed diagnostics to stderr, which the CI host captures in the build log.
#[derive(Debug, Default)]
pub struct ConsoleListener;

impl ConsoleListener {
    fn write(&self, level: LogLevel, message: &str) {
        let _ = writeln!(std::io::stderr(), "{}", LogEntry::new(level, message));
    }
}

impl BuildListener for ConsoleListener {
    fn info(&mut self, message: &str) {
        self.write(Level::INFO, message);
    }

    fn warn(&mut self, message: &str) {
        self.write(Level::WARN, message);
    }

    fn error(&mut self, message: &str) {
        self.write(Level::ERROR, message);
    }
}

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
        }
    }
}

/// `2026-10-19T08:17:00Z ERROR [Bitbucket Build Status] message`
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<5} {} {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            self.level,
            LOG_PREFIX,
            self.message
        )
    }
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default)]
pub struct BuildLog {
    entries: Vec<LogEntry>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn get_logs_by_level(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.level == level)
            .cloned()
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.get_logs_by_level(Level::ERROR)
            .into_iter()
            .map(|entry| entry.message)
            .collect()
    }

    fn push(&mut self, level: LogLevel, message: &str) {
        self.entries.push(LogEntry::new(level, message));
    }
}

impl BuildListener for BuildLog {
    fn info(&mut self, message: &str) {
        self.push(Level::INFO, message);
    }

    fn warn(&mut self, message: &str) {
        self.push(Level::WARN, message);
    }

    fn error(&mut self, message: &str) {
        self.push(Level::ERROR, message);
    }
}

/// Daily-rotated application log files
pub struct FileLogger {
    log_directory: PathBuf,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            rotation: Rotation::DAILY,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn setup_file_logging(&self) -> std::io::Result<(NonBlocking, WorkerGuard)> {
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender =
            RollingFileAppender::new(self.rotation.clone(), &self.log_directory, LOG_FILE_PREFIX);

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// Installs the global subscriber: console output filtered by `RUST_LOG`
/// (default `info`), plus an ANSI-free file layer when `file_logger` is given.
///
/// The returned guard must be held until exit so buffered lines are flushed.
pub fn setup_logging(file_logger: Option<&FileLogger>) -> std::io::Result<Option<WorkerGuard>> {
    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter());

    match file_logger {
        Some(file_logger) => {
            let (writer, guard) = file_logger.setup_file_logging()?;
            tracing_subscriber::registry()
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_filter(env_filter()),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(console).init();
            Ok(None)
        }
    }
}
