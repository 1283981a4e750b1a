//! Injected logging capability.
//!
//! The original implementation reached into a process-global `logging`
//! module from every file. Here every sensor takes `&dyn Logger` instead, so
//! the [`Orchestrator`](crate::orchestrator::Orchestrator) is the only place
//! that decides what backs it — a file sink in production, an in-memory
//! recorder in tests.

use std::path::Path;
use std::sync::Mutex;

use crate::error::Result;

/// A thread-safe sink for the three severities the daemon emits.
///
/// Implementors must be safe to share across the watcher thread and both
/// monitor threads without external synchronization.
pub trait Logger: Send + Sync {
    /// Routine status, e.g. a periodic resource sample.
    fn info(&self, message: &str);
    /// An anomaly worth an operator's attention but not immediately fatal.
    fn warn(&self, message: &str);
    /// A condition serious enough that the daemon's own health is at risk.
    fn critical(&self, message: &str);
}

/// Forwards to the process-wide `log` crate macros.
///
/// This is the production logger. It carries no state of its own; all the
/// actual formatting and destination live in the `fern` dispatcher installed
/// by [`init_file_logging`]. `log` itself has no `CRITICAL` level, so
/// [`Logger::critical`] goes out through `log::error!` with the severity
/// spelled out in the message text, or an operator grepping the log file
/// for "CRITICAL" would get zero hits on a real one.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalLogger;

impl Logger for GlobalLogger {
    fn info(&self, message: &str) {
        log::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn critical(&self, message: &str) {
        log::error!("CRITICAL: {}", message);
    }
}

/// Buffers records in memory instead of writing them anywhere.
///
/// Used by tests in place of a real file sink, matching the role `caplog`
/// played in the original Python test suite.
#[derive(Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<String>>,
}

impl RecordingLogger {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        RecordingLogger::default()
    }

    /// Returns every record logged so far, in emission order.
    pub fn records(&self) -> Vec<String> {
        self.records.lock().expect("logger mutex poisoned").clone()
    }

    /// Returns `true` if any record at or above `level` contains `needle`.
    pub fn contains(&self, level: &str, needle: &str) -> bool {
        self.records
            .lock()
            .expect("logger mutex poisoned")
            .iter()
            .any(|r| r.starts_with(level) && r.contains(needle))
    }

    fn push(&self, level: &str, message: &str) {
        self.records
            .lock()
            .expect("logger mutex poisoned")
            .push(format!("{} {}", level, message));
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str) {
        self.push("INFO", message);
    }

    fn warn(&self, message: &str) {
        self.push("WARNING", message);
    }

    fn critical(&self, message: &str) {
        self.push("CRITICAL", message);
    }
}

/// Installs the production file-based logger.
///
/// Opens `path` in append mode and formats every record as
/// `<timestamp> - <level> - <message>`, matching the format the daemon has
/// always used so existing log-scraping tooling keeps working.
pub fn init_file_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M"),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(fern::log_file(path)?)
        .apply()?;

    Ok(())
}
