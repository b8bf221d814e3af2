//! diskprobe - filesystem throughput and seek benchmark
//!
//! Measures sequential write, rewrite and sequential read throughput and the
//! random seek rate of a large scratch file, reporting bytes (or seeks) per
//! second and percent CPU for each phase.

use std::fmt;

pub mod bench;
pub mod cli;
pub mod config;
pub mod io;
pub mod models;
pub mod shutdown;
pub mod util;

/// Errors that abort a benchmark run.
///
/// Every variant is fatal: a measurement tool never retries, because a
/// retried operation would corrupt the timing of the phase it belongs to.
#[derive(Debug)]
pub enum DiskProbeError {
    /// Configuration validation or parsing error
    ConfigError(String),
    /// Channel or worker spawn failure
    SetupError(String),
    /// A seek, read, write, flush or close on the benchmark file failed
    IoError {
        operation: String,
        source: std::io::Error,
    },
    /// The OS refused to report wall-clock or CPU time
    TimingError(String),
    /// A seek worker died or misbehaved
    WorkerError(String),
    /// Phase bookkeeping error
    BenchmarkError(String),
}

impl DiskProbeError {
    /// Wrap an I/O error with the name of the operation that produced it.
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        DiskProbeError::IoError {
            operation: operation.into(),
            source,
        }
    }
}

impl fmt::Display for DiskProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskProbeError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            DiskProbeError::SetupError(msg) => write!(f, "Setup error: {}", msg),
            DiskProbeError::IoError { operation, source } => {
                write!(f, "drastic I/O error ({}): {}", operation, source)
            }
            DiskProbeError::TimingError(msg) => write!(f, "Timing error: {}", msg),
            DiskProbeError::WorkerError(msg) => write!(f, "Worker error: {}", msg),
            DiskProbeError::BenchmarkError(msg) => write!(f, "Benchmark error: {}", msg),
        }
    }
}

impl std::error::Error for DiskProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiskProbeError::IoError { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for DiskProbeError {
    fn from(err: toml::de::Error) -> Self {
        DiskProbeError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_json::Error> for DiskProbeError {
    fn from(err: serde_json::Error) -> Self {
        DiskProbeError::BenchmarkError(format!("JSON serialization error: {}", err))
    }
}

/// Result type alias for diskprobe operations
pub type Result<T> = std::result::Result<T, DiskProbeError>;

// Common constants
pub const APP_NAME: &str = "diskprobe";
pub const CONFIG_FILE: &str = "diskprobe.toml";

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_io_error_names_operation() {
        let err = DiskProbeError::io(
            "lseek in probe",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        let msg = err.to_string();
        assert!(msg.contains("lseek in probe"));
        assert!(msg.contains("boom"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_non_io_errors_have_no_source() {
        let err = DiskProbeError::WorkerError("seeker 2 vanished".into());
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "Worker error: seeker 2 vanished");
    }
}
