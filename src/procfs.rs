//! Process and kernel-counter introspection via `/proc`.
//!
//! Two unrelated readings live here because both are single-pass scans over
//! `/proc`: the set of processes holding `/dev/urandom` open (§4.2), and this
//! process's own resident set size (§4.4's sampling primitive).

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

/// Kernel device inspected for cryptographic-activity correlation.
const URANDOM_DEVICE: &str = "/dev/urandom";

/// Returns the set of process IDs that currently have `/dev/urandom` open.
///
/// Walks every numeric entry under `/proc`, then every descriptor under
/// `/proc/<pid>/fd`, resolving each as a symlink. Permission errors and a
/// process disappearing mid-scan are both expected and silently ignored —
/// logging them would just be noise on every single scan.
pub fn urandom_readers() -> HashSet<u32> {
    let mut pids = HashSet::new();

    let proc_entries = match fs::read_dir("/proc") {
        Ok(entries) => entries,
        Err(_) => return pids,
    };

    for proc_entry in proc_entries.flatten() {
        let pid: u32 = match proc_entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            Some(pid) => pid,
            None => continue,
        };

        let fd_entries = match fs::read_dir(proc_entry.path().join("fd")) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        for fd_entry in fd_entries.flatten() {
            if let Ok(target) = fs::read_link(fd_entry.path()) {
                if target == Path::new(URANDOM_DEVICE) {
                    pids.insert(pid);
                    break;
                }
            }
        }
    }

    pids
}

/// Reads this process's resident set size from `/proc/self/status`, in MB.
///
/// Parses the `VmRSS` line, which the kernel reports in kilobytes.
pub fn rss_mb() -> io::Result<u64> {
    let status = fs::read_to_string("/proc/self/status")?;
    Ok(parse_vmrss_kb(&status) / 1024)
}

fn parse_vmrss_kb(status: &str) -> u64 {
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            return rest
                .split_whitespace()
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
        }
    }
    0
}
