//! Wires the watcher, the two monitors, and logging into a running daemon.
//!
//! This is the one place that decides what a [`Logger`] actually is and
//! owns the full set of background threads, matching how the original
//! entry point assembled the same three pieces. Everything else in the
//! crate stays logger-agnostic and thread-agnostic.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::{self, GlobalLogger, Logger};
use crate::monitors::MonitorHandle;
use crate::watcher::FilesystemWatcher;

/// Runs the daemon to completion (in practice: forever, until the process
/// is killed, or a watch's `inotify` file descriptor errors out).
pub fn run(config: Config) -> Result<()> {
    logging::init_file_logging(&config.log_path)?;

    let logger = GlobalLogger;
    let shared_logger: Arc<dyn Logger> = Arc::new(GlobalLogger);

    run_with(config, &logger, shared_logger)
}

/// Inner entry point taking an explicit logger, so tests can exercise the
/// wiring without installing a real file sink or running forever.
fn run_with(config: Config, logger: &dyn Logger, shared_logger: Arc<dyn Logger>) -> Result<()> {
    let _memory_monitor = MonitorHandle::spawn_memory_monitor(Arc::clone(&shared_logger));
    let _disk_monitor = MonitorHandle::spawn_disk_monitor(shared_logger);

    logger.info(&format!(
        "starting irondome (pid {}), monitoring {:?}",
        std::process::id(),
        config.paths
    ));

    let mut watcher = FilesystemWatcher::new(&config.paths, logger)?;
    if !watcher.is_ready() {
        logger.critical("no watchable path found among the configured roots; exiting");
        return Err(Error::NoWatchablePaths(config.paths));
    }

    logger.info(&format!(
        "watching {} director{}",
        watcher.monitored_paths().count(),
        if watcher.monitored_paths().count() == 1 { "y" } else { "ies" }
    ));

    loop {
        watcher.run_once()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RecordingLogger;
    use std::path::PathBuf;

    #[test]
    fn unwatchable_roots_are_fatal() {
        let logger = RecordingLogger::new();
        let shared: Arc<dyn Logger> = Arc::new(RecordingLogger::new());
        let config = Config {
            paths: vec![PathBuf::from("/nonexistent/xyz/abc")],
            log_path: PathBuf::from("/tmp/irondome-test-unused.log"),
        };

        let result = run_with(config, &logger, shared);

        assert!(matches!(result, Err(Error::NoWatchablePaths(_))));
        assert!(logger.contains("CRITICAL", "no watchable path"));
    }
}
