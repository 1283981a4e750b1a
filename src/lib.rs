#![crate_name = "irondome"]
#![crate_type = "lib"]
#![deny(missing_docs)]

//! Host-based ransomware-behavior detector for Linux.
//!
//! The daemon watches one or more directory trees for entropy spikes
//! consistent with in-place encryption, correlates those spikes against
//! processes that have newly opened `/dev/urandom`, and separately keeps an
//! eye on its own resident memory and on aggregate physical-disk read
//! throughput. See [`orchestrator::run`] for how the pieces are assembled.

pub mod config;
pub mod entropy;
pub mod error;
pub mod logging;
pub mod monitors;
pub mod orchestrator;
pub mod procfs;
pub mod watcher;

pub use error::{Error, Result};
