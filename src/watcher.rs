//! Filesystem watcher: the core of the daemon (§4.3).
//!
//! Owns the monitored path set, the watch-descriptor map, and the per-file
//! entropy baseline. Everything else in this crate is either a pure
//! function this module calls ([`crate::entropy`], [`crate::procfs`]) or an
//! independent sensor that shares nothing with it ([`crate::monitors`]).

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use inotify::{EventMask, Inotify, WatchDescriptor, WatchMask};
use walkdir::WalkDir;

use crate::entropy::{shannon_entropy, ENTROPY_READ_SIZE};
use crate::logging::Logger;
use crate::procfs;

/// Absolute entropy level above which a write is suspicious on its own.
const HIGH_ENTROPY: f64 = 7.5;

/// Entropy jump, relative to a file's last known value, that is suspicious.
const ENTROPY_DELTA: f64 = 1.5;

/// Size of the scratch buffer used for a single `read_events_blocking` call.
///
/// Large enough to hold a substantial burst of events (each inotify event is
/// at least 16 bytes plus its name) without forcing a second syscall in the
/// common case.
const EVENT_BUFFER_SIZE: usize = 4096;

/// Watches one or more directory subtrees and flags entropy anomalies.
pub struct FilesystemWatcher<'a> {
    inotify: Inotify,
    watch_mask: WatchMask,
    paths: HashSet<PathBuf>,
    wd_to_path: HashMap<WatchDescriptor, PathBuf>,
    file_entropy: HashMap<PathBuf, f64>,
    baseline_readers: HashSet<u32>,
    logger: &'a dyn Logger,
}

impl<'a> FilesystemWatcher<'a> {
    /// Builds a watcher over `roots`, seeding watches and entropy baselines.
    ///
    /// Snapshots the current `/dev/urandom` readers once, before walking any
    /// root, so the correlation in [`Self::detect_entropy_anomaly`] only
    /// ever reports readers that appeared *after* the watcher came up.
    ///
    /// A root that doesn't exist is logged and skipped rather than failing
    /// construction outright; construction only fails if every root turns
    /// out to be unwatchable (see [`Self::is_ready`]).
    pub fn new(roots: &[PathBuf], logger: &'a dyn Logger) -> io::Result<Self> {
        let inotify = Inotify::init()?;

        let mut watcher = FilesystemWatcher {
            inotify,
            watch_mask: WatchMask::CREATE | WatchMask::CLOSE_WRITE,
            paths: HashSet::new(),
            wd_to_path: HashMap::new(),
            file_entropy: HashMap::new(),
            baseline_readers: procfs::urandom_readers(),
            logger,
        };

        for root in roots {
            watcher.watch_root(root);
        }

        Ok(watcher)
    }

    /// `true` once at least one directory is under watch.
    ///
    /// The [`crate::orchestrator::Orchestrator`] treats `false` after
    /// construction as fatal (§7: "Configuration error").
    pub fn is_ready(&self) -> bool {
        !self.paths.is_empty()
    }

    /// Read-only view over the monitored directories, for tests and tooling.
    pub fn monitored_paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// The last recorded entropy for `path`, if any.
    pub fn entropy_of(&self, path: &Path) -> Option<f64> {
        self.file_entropy.get(path).copied()
    }

    /// Seeds the entropy baseline for `path` without going through a real
    /// file read.
    ///
    /// Test-only: lets a test set up a known "previously seen at entropy
    /// E_prev" scenario (§8's delta-alarm seed scenario) without reaching
    /// into `file_entropy` directly from the test module.
    #[cfg(test)]
    fn seed_baseline_for_test(&mut self, path: &Path, entropy: f64) {
        self.file_entropy.insert(path.to_path_buf(), entropy);
    }

    /// Walks `root`, registering watches on every directory and an initial
    /// entropy sample for every regular file found.
    ///
    /// A file path is resolved to its parent directory, matching the
    /// behavior of monitoring a single file rather than a directory. Errors
    /// resolving `root` itself (it doesn't exist, or isn't readable) are
    /// logged and otherwise swallowed — they describe a single root among
    /// potentially several, not the watcher as a whole.
    fn watch_root(&mut self, root: &Path) {
        let dir_path = match self.resolve_dir(root) {
            Ok(dir_path) => dir_path,
            Err(e) => {
                self.logger
                    .warn(&format!("{}: not found - skipping ({})", root.display(), e));
                return;
            }
        };

        for entry in WalkDir::new(&dir_path).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if entry.file_type().is_dir() {
                self.add_directory(path);
            } else if entry.file_type().is_file() {
                self.seed_entropy(path);
            }
        }
    }

    fn resolve_dir(&self, path: &Path) -> io::Result<PathBuf> {
        let metadata = std::fs::metadata(path)?;
        if metadata.is_file() {
            Ok(path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| path.to_path_buf()))
        } else {
            Ok(path.to_path_buf())
        }
    }

    fn add_directory(&mut self, dir: &Path) {
        if self.paths.contains(dir) {
            return;
        }

        match self.inotify.add_watch(dir, self.watch_mask) {
            Ok(wd) => {
                self.paths.insert(dir.to_path_buf());
                self.wd_to_path.insert(wd, dir.to_path_buf());
            }
            Err(e) => {
                self.logger
                    .warn(&format!("failed to watch {}: {}", dir.display(), e));
            }
        }
    }

    fn seed_entropy(&mut self, file: &Path) {
        if self.file_entropy.contains_key(file) {
            return;
        }

        if let Ok(data) = read_prefix(file) {
            if !data.is_empty() {
                self.file_entropy
                    .insert(file.to_path_buf(), shannon_entropy(&data));
            }
        }
    }

    /// Blocks for one batch of kernel events and dispatches each of them.
    ///
    /// Directory-create events extend the watch set recursively; a
    /// close-after-write triggers entropy anomaly detection. Every other
    /// event combination — and any event whose watch descriptor or name we
    /// can no longer resolve — is silently ignored, matching §4.3.
    pub fn run_once(&mut self) -> io::Result<()> {
        let mut buffer = [0u8; EVENT_BUFFER_SIZE];
        let events = self.inotify.read_events_blocking(&mut buffer)?;

        let mut new_directories = Vec::new();
        let mut writes = Vec::new();

        for event in events {
            let dir = match self.wd_to_path.get(&event.wd) {
                Some(dir) => dir.clone(),
                None => continue,
            };
            let name = match event.name {
                Some(name) => name,
                None => continue,
            };
            let full_path = dir.join(name);

            if event.mask.contains(EventMask::CREATE) && event.mask.contains(EventMask::ISDIR) {
                new_directories.push(full_path);
            } else if event.mask.contains(EventMask::CLOSE_WRITE) {
                writes.push(full_path);
            }
        }

        for dir in new_directories {
            self.watch_root(&dir);
        }
        for path in writes {
            self.detect_entropy_anomaly(&path);
        }

        Ok(())
    }

    /// Scores `path` after a close-after-write event and logs an anomaly if
    /// warranted (§4.3, steps 1-7).
    ///
    /// The baseline is updated unconditionally on a successful, non-empty
    /// read — whether or not a warning was emitted — so later events always
    /// compare against the most recent observation.
    fn detect_entropy_anomaly(&mut self, path: &Path) {
        let data = match read_prefix(path) {
            Ok(data) => data,
            Err(_) => {
                self.logger
                    .warn(&format!("File deleted after write: {}", path.display()));
                return;
            }
        };

        if data.is_empty() {
            self.logger
                .warn(&format!("File empty after write: {}", path.display()));
            return;
        }

        let current_entropy = shannon_entropy(&data);
        let crypto_pids: Vec<u32> = procfs::urandom_readers()
            .difference(&self.baseline_readers)
            .copied()
            .collect();

        match self.file_entropy.get(path).copied() {
            None => {
                if current_entropy > HIGH_ENTROPY {
                    self.warn_new_file(path, current_entropy, &crypto_pids);
                }
            }
            Some(previous_entropy) => {
                let delta = current_entropy - previous_entropy;
                if current_entropy > HIGH_ENTROPY || delta > ENTROPY_DELTA {
                    self.warn_known_file(path, previous_entropy, current_entropy, delta, &crypto_pids);
                }
            }
        }

        self.file_entropy.insert(path.to_path_buf(), current_entropy);
    }

    fn warn_new_file(&self, path: &Path, entropy: f64, crypto_pids: &[u32]) {
        if crypto_pids.is_empty() {
            self.logger.warn(&format!(
                "New file high entropy detected: {} (entropy: {:.2})",
                path.display(),
                entropy
            ));
        } else {
            self.logger.warn(&format!(
                "Cryptographic activity detected: {} (entropy: {:.2}, suspicious PIDs {:?})",
                path.display(),
                entropy,
                crypto_pids
            ));
        }
    }

    fn warn_known_file(&self, path: &Path, previous: f64, current: f64, delta: f64, crypto_pids: &[u32]) {
        if crypto_pids.is_empty() {
            self.logger.warn(&format!(
                "High entropy detected: {} ({:.2} -> {:.2}, delta: {:.2})",
                path.display(),
                previous,
                current,
                delta
            ));
        } else {
            self.logger.warn(&format!(
                "Cryptographic activity detected: {} ({:.2} -> {:.2}, delta: {:.2}, suspicious PIDs: {:?})",
                path.display(),
                previous,
                current,
                delta,
                crypto_pids
            ));
        }
    }
}

fn read_prefix(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; ENTROPY_READ_SIZE];
    let bytes_read = file.read(&mut buffer)?;
    buffer.truncate(bytes_read);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RecordingLogger;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn watcher<'a>(roots: &[PathBuf], logger: &'a RecordingLogger) -> FilesystemWatcher<'a> {
        FilesystemWatcher::new(roots, logger).expect("failed to initialize inotify")
    }

    #[test]
    fn no_alarm_for_low_entropy_new_file() {
        let dir = tempdir().unwrap();
        let logger = RecordingLogger::new();
        let mut w = watcher(&[dir.path().to_path_buf()], &logger);

        let file = dir.path().join("plain.txt");
        fs::write(&file, "hello world ".repeat(500)).unwrap();
        w.detect_entropy_anomaly(&file);

        assert!(!logger.contains("WARNING", "detected"));
    }

    #[test]
    fn alarm_for_high_entropy_new_file() {
        let dir = tempdir().unwrap();
        let logger = RecordingLogger::new();
        let mut w = watcher(&[dir.path().to_path_buf()], &logger);

        let file = dir.path().join("encrypted.bin");
        let mut data = vec![0u8; 4096];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut data);
        fs::write(&file, &data).unwrap();
        w.detect_entropy_anomaly(&file);

        assert!(logger.contains("WARNING", "entropy"));
    }

    #[test]
    fn alarm_for_entropy_spike_on_known_file() {
        let dir = tempdir().unwrap();
        let logger = RecordingLogger::new();
        let mut w = watcher(&[dir.path().to_path_buf()], &logger);

        let file = dir.path().join("file.bin");
        fs::write(&file, "aaaa".repeat(1000)).unwrap();
        w.seed_baseline_for_test(&file, 0.5);

        let mut data = vec![0u8; 4096];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut data);
        fs::write(&file, &data).unwrap();
        w.detect_entropy_anomaly(&file);

        assert!(logger.contains("WARNING", "detected"));
    }

    #[test]
    fn baseline_updated_after_every_check() {
        let dir = tempdir().unwrap();
        let logger = RecordingLogger::new();
        let mut w = watcher(&[dir.path().to_path_buf()], &logger);

        let file = dir.path().join("file.bin");
        fs::write(&file, "aaaa".repeat(1000)).unwrap();
        w.detect_entropy_anomaly(&file);

        assert!(w.entropy_of(&file).is_some());
    }

    #[test]
    fn deleted_file_logs_warning_without_crashing() {
        let dir = tempdir().unwrap();
        let logger = RecordingLogger::new();
        let mut w = watcher(&[dir.path().to_path_buf()], &logger);

        let ghost = dir.path().join("ghost.txt");
        w.detect_entropy_anomaly(&ghost);

        assert!(logger.contains("WARNING", "deleted"));
    }

    #[test]
    fn empty_file_logs_warning() {
        let dir = tempdir().unwrap();
        let logger = RecordingLogger::new();
        let mut w = watcher(&[dir.path().to_path_buf()], &logger);

        let file = dir.path().join("empty.bin");
        File::create(&file).unwrap();
        w.detect_entropy_anomaly(&file);

        assert!(logger.contains("WARNING", "empty"));
    }

    #[test]
    fn crypto_correlation_names_new_readers() {
        let dir = tempdir().unwrap();
        let logger = RecordingLogger::new();
        // Construction snapshots the baseline readers before this test opens
        // its own handle below, so that handle is guaranteed to show up as
        // an excess reader without needing to touch the watcher's state.
        let mut w = watcher(&[dir.path().to_path_buf()], &logger);

        let file = dir.path().join("encrypted.bin");
        let mut data = vec![0u8; 4096];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut data);
        fs::write(&file, &data).unwrap();

        // Hold /dev/urandom open in this process for the duration of the
        // check, standing in for a helper process in the integration
        // scenario described in §8.
        let _reader = File::open("/dev/urandom").unwrap();
        w.detect_entropy_anomaly(&file);

        assert!(logger.contains("WARNING", "cryptographic activity"));
    }

    #[test]
    fn nonexistent_root_is_logged_and_skipped() {
        let logger = RecordingLogger::new();
        let w = watcher(&[PathBuf::from("/nonexistent/path/xyz")], &logger);

        assert!(!w.is_ready());
        assert!(logger.records().iter().any(|r| r.contains("not found")));
    }

    #[test]
    fn watching_a_file_monitors_its_parent_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "hello").unwrap();

        let logger = RecordingLogger::new();
        let w = watcher(&[file], &logger);

        assert!(w.monitored_paths().any(|p| p == dir.path()));
    }

    #[test]
    fn subdirectories_are_monitored_recursively() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        let logger = RecordingLogger::new();
        let w = watcher(&[dir.path().to_path_buf()], &logger);

        assert!(w.monitored_paths().any(|p| p == sub));
    }

    #[test]
    fn existing_files_get_initial_entropy_baseline() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("existing.txt");
        fs::write(&file, "hello world ".repeat(100)).unwrap();

        let logger = RecordingLogger::new();
        let w = watcher(&[dir.path().to_path_buf()], &logger);

        assert!(w.entropy_of(&file).is_some());
    }

    #[test]
    fn dynamic_directory_pickup_via_event_loop() {
        let dir = tempdir().unwrap();
        let logger = RecordingLogger::new();
        let mut w = watcher(&[dir.path().to_path_buf()], &logger);

        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        // Drain the CREATE+ISDIR event for `sub` and register its watch.
        w.run_once().unwrap();
        assert!(w.monitored_paths().any(|p| p == sub));

        let file = sub.join("payload.bin");
        let mut f = File::create(&file).unwrap();
        let mut data = vec![0u8; 4096];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut data);
        f.write_all(&data).unwrap();
        drop(f);

        w.run_once().unwrap();
        assert!(logger.contains("WARNING", "entropy"));
    }
}
