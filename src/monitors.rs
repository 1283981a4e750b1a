//! Host resource monitors (§4.4, §4.5).
//!
//! Both monitors are independent of the [`FilesystemWatcher`](crate::watcher::FilesystemWatcher)
//! and of each other: they share no state, only the [`Logger`] capability,
//! and run on their own threads for the life of the process.

use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::logging::Logger;

/// Resident-set-size level that only gets a routine informational log.
const MEMORY_WARN_MB: u64 = 80;
/// Resident-set-size level that triggers a critical log.
const MEMORY_CRITICAL_MB: u64 = 100;
/// How often the memory monitor samples `VmRSS`.
const MEMORY_SAMPLE_PERIOD: Duration = Duration::from_secs(5);

/// Aggregate read rate, across physical disks, that triggers a warning.
const DISK_READ_WARN_MB_S: f64 = 100.0;
/// How often the disk monitor re-samples `/proc/diskstats`.
const DISK_SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// Linux device-major numbers for whole physical disks (SCSI, NVMe,
/// virtio-blk); minor 0 selects the whole device rather than a partition.
const PHYSICAL_DISK_MAJORS: [u32; 7] = [8, 65, 66, 67, 252, 253, 259];

/// Granularity of the interruptible sleep used between samples, so a
/// shutdown request is noticed promptly instead of after a full period.
const SLEEP_STEP: Duration = Duration::from_millis(250);

/// Sleeps for `total`, waking early if `shutdown` is set.
fn interruptible_sleep(total: Duration, shutdown: &AtomicBool) {
    let mut remaining = total;
    while remaining > Duration::ZERO && !shutdown.load(Ordering::Relaxed) {
        let step = remaining.min(SLEEP_STEP);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}

/// Reads this process's resident set size, in MB, via `/proc/self/status`.
pub fn rss_mb() -> io::Result<u64> {
    crate::procfs::rss_mb()
}

/// Logs the daemon's own memory usage at the appropriate severity.
///
/// Exposed separately from the monitor loop so a single sample can be
/// exercised in tests without needing to stop a background thread.
pub fn log_memory_sample(logger: &dyn Logger, memory_mb: u64) {
    if memory_mb > MEMORY_CRITICAL_MB {
        logger.critical(&format!(
            "Memory limit exceeded: {} MB / {} MB",
            memory_mb, MEMORY_CRITICAL_MB
        ));
    } else if memory_mb > MEMORY_WARN_MB {
        logger.info(&format!(
            "Memory usage high: {} MB / {} MB",
            memory_mb, MEMORY_CRITICAL_MB
        ));
    } else {
        logger.info(&format!(
            "Memory usage: {} MB / {} MB",
            memory_mb, MEMORY_CRITICAL_MB
        ));
    }
}

/// Runs the memory monitor loop until `shutdown` is set.
///
/// `sample` is injected so tests can substitute a stub sampler, the same way
/// the original test suite patched `get_memory_usage`.
pub fn memory_monitor_loop<F>(logger: &dyn Logger, shutdown: &AtomicBool, mut sample: F)
where
    F: FnMut() -> io::Result<u64>,
{
    while !shutdown.load(Ordering::Relaxed) {
        match sample() {
            Ok(memory_mb) => log_memory_sample(logger, memory_mb),
            Err(e) => logger.warn(&format!("failed to sample memory usage: {}", e)),
        }
        interruptible_sleep(MEMORY_SAMPLE_PERIOD, shutdown);
    }
}

/// Sums "sectors read" across whole physical-disk entries in `/proc/diskstats`.
pub fn disk_sectors_read() -> io::Result<u64> {
    let stats = fs::read_to_string("/proc/diskstats")?;
    Ok(parse_disk_sectors_read(&stats))
}

fn parse_disk_sectors_read(stats: &str) -> u64 {
    let mut total = 0u64;
    for line in stats.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            continue;
        }
        let major: u32 = match fields[0].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let minor: u32 = match fields[1].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if minor == 0 && PHYSICAL_DISK_MAJORS.contains(&major) {
            if let Ok(sectors) = fields[5].parse::<u64>() {
                total += sectors;
            }
        }
    }
    total
}

/// Computes the read rate in MB/s given a sector delta and elapsed time.
fn read_rate_mb_s(sectors_delta: u64, elapsed: Duration) -> f64 {
    let bytes_read = sectors_delta as f64 * 512.0;
    let mb_read = bytes_read / (1024.0 * 1024.0);
    mb_read / elapsed.as_secs_f64()
}

/// Logs a warning if the computed read rate exceeds [`DISK_READ_WARN_MB_S`].
pub fn log_disk_rate_sample(logger: &dyn Logger, sectors_delta: u64, elapsed: Duration) {
    let rate = read_rate_mb_s(sectors_delta, elapsed);
    if rate > DISK_READ_WARN_MB_S {
        logger.warn(&format!("High disk read activity: {:.2} MB/s", rate));
    }
}

/// Runs the disk read-rate monitor loop until `shutdown` is set.
pub fn disk_monitor_loop<F>(logger: &dyn Logger, shutdown: &AtomicBool, mut sectors_read: F)
where
    F: FnMut() -> io::Result<u64>,
{
    let mut previous = match sectors_read() {
        Ok(v) => v,
        Err(e) => {
            logger.warn(&format!("failed to sample disk stats: {}", e));
            return;
        }
    };
    let mut previous_at = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        interruptible_sleep(DISK_SAMPLE_PERIOD, shutdown);
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        let current = match sectors_read() {
            Ok(v) => v,
            Err(e) => {
                logger.warn(&format!("failed to sample disk stats: {}", e));
                continue;
            }
        };
        let now = Instant::now();

        log_disk_rate_sample(logger, current.saturating_sub(previous), now - previous_at);

        previous = current;
        previous_at = now;
    }
}

/// A background monitor thread plus a handle to ask it to stop.
///
/// Neither the original source nor this crate has anything that currently
/// flips the shutdown flag outside of tests — the process as a whole is
/// expected to be terminated externally — but the mechanism exists so a
/// future supervisor integration has somewhere to hook in.
pub struct MonitorHandle {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    fn spawn<F>(body: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);
        let join_handle = thread::spawn(move || body(thread_shutdown));

        MonitorHandle {
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Spawns the memory self-monitor on a new thread.
    pub fn spawn_memory_monitor(logger: Arc<dyn Logger>) -> Self {
        MonitorHandle::spawn(move |shutdown| {
            memory_monitor_loop(logger.as_ref(), &shutdown, rss_mb);
        })
    }

    /// Spawns the disk read-rate monitor on a new thread.
    pub fn spawn_disk_monitor(logger: Arc<dyn Logger>) -> Self {
        MonitorHandle::spawn(move |shutdown| {
            disk_monitor_loop(logger.as_ref(), &shutdown, disk_sectors_read);
        })
    }

    /// Signals the monitor to stop and waits for its thread to exit.
    ///
    /// Used by tests; nothing in the running daemon calls this today.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}
