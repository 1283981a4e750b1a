//! Configuration and the minimal CLI front door (§4.8).
//!
//! This deliberately does not pull in a general-purpose argument-parsing
//! framework: the surface is a list of positional paths and one optional
//! flag, which a `while`-loop over `std::env::args` covers without the
//! complexity — and the dependency weight — of flag bundling, subcommands,
//! or shell-completion generation.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Watched when no path is given on the command line.
pub const DEFAULT_PATH: &str = "/home";

/// Default location for the append-mode log file.
pub const DEFAULT_LOG_PATH: &str = "/var/log/irondome/irondome.log";

/// Resolved, immutable daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root paths to monitor; never empty once construction succeeds.
    pub paths: Vec<PathBuf>,
    /// Where the production logger appends its records.
    pub log_path: PathBuf,
}

impl Config {
    /// Parses `Config` out of an argument iterator (excluding argv[0]).
    ///
    /// Unrecognized positional arguments are treated as paths to monitor.
    /// `--log-file <path>` overrides [`DEFAULT_LOG_PATH`]. If no paths are
    /// given, the single default `/home` is used, matching the original
    /// CLI's behavior.
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut paths = Vec::new();
        let mut log_path = PathBuf::from(DEFAULT_LOG_PATH);

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--log-file" {
                let value = args
                    .next()
                    .ok_or_else(|| Error::Config("--log-file requires a path".into()))?;
                log_path = PathBuf::from(value);
            } else {
                paths.push(PathBuf::from(arg));
            }
        }

        if paths.is_empty() {
            paths.push(PathBuf::from(DEFAULT_PATH));
        }

        Ok(Config { paths, log_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_paths_defaults_to_home() {
        let config = Config::from_args(args(&[])).unwrap();
        assert_eq!(config.paths, vec![PathBuf::from("/home")]);
    }

    #[test]
    fn positional_paths_are_preserved_in_order() {
        let config = Config::from_args(args(&["/var/data", "/srv/www"])).unwrap();
        assert_eq!(
            config.paths,
            vec![PathBuf::from("/var/data"), PathBuf::from("/srv/www")]
        );
    }

    #[test]
    fn log_file_flag_overrides_default() {
        let config = Config::from_args(args(&["--log-file", "/tmp/custom.log", "/data"])).unwrap();
        assert_eq!(config.log_path, PathBuf::from("/tmp/custom.log"));
        assert_eq!(config.paths, vec![PathBuf::from("/data")]);
    }

    #[test]
    fn dangling_log_file_flag_is_an_error() {
        assert!(Config::from_args(args(&["--log-file"])).is_err());
    }
}
