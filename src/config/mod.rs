//! Configuration management module
//!
//! Holds every tunable of a benchmark run, loads overrides from an optional
//! TOML file and validates the result before any file is touched.

use crate::{DiskProbeError, Result, APP_NAME, CONFIG_FILE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bytes per gigabyte as used by the `-s` flag.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Default test file size in gigabytes.
pub const DEFAULT_FILE_SIZE_GIB: u64 = 24;

/// Default probe/chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: u64 = 8192;

/// Default number of concurrent seek workers.
pub const DEFAULT_SEEK_WORKERS: usize = 3;

/// Default number of probes per seek phase.
pub const DEFAULT_SEEK_COUNT: u64 = 100_000;

/// Every Nth probe dirties and writes back its block when writes are enabled.
pub const DEFAULT_UPDATE_PERIOD: u64 = 10;

/// Benchmark configuration containing all run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Scratch directory holding the test file
    pub scratch_dir: PathBuf,
    /// Test file size in bytes
    pub file_size: u64,
    /// Cosmetic machine label printed in the report
    pub machine: String,
    /// Randomize every written chunk to defeat compressing/deduplicating storage
    pub randomize_blocks: bool,
    /// Chunk size for sequential phases and probe size for seek phases
    pub chunk_size: u64,
    /// Number of concurrent seek workers
    pub seek_workers: usize,
    /// Number of probes per seek phase
    pub seek_count: u64,
    /// Write-back period for the read-write seek phase
    pub update_period: u64,
    /// Settle delay between the ready barrier and the start signal
    #[serde(with = "humantime_serde")]
    pub start_delay: Duration,
    /// Shell command run between phases to drop OS caches
    pub cache_drop_command: Option<String>,
    /// Keep the test file after the run
    pub keep_test_file: bool,
    /// Draw progress bars on stderr
    pub show_progress: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("."),
            file_size: DEFAULT_FILE_SIZE_GIB * GIB,
            machine: String::new(),
            randomize_blocks: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            seek_workers: DEFAULT_SEEK_WORKERS,
            seek_count: DEFAULT_SEEK_COUNT,
            update_period: DEFAULT_UPDATE_PERIOD,
            start_delay: Duration::ZERO,
            cache_drop_command: None,
            keep_test_file: false,
            show_progress: true,
        }
    }
}

impl BenchConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.scratch_dir.is_dir() {
            return Err(DiskProbeError::ConfigError(format!(
                "Scratch directory does not exist or is not a directory: {}",
                self.scratch_dir.display()
            )));
        }

        if self.chunk_size < 16 || self.chunk_size % 4 != 0 {
            // a probe dirties a word strictly inside the block, so it needs
            // at least three whole words plus room to pick one
            return Err(DiskProbeError::ConfigError(format!(
                "Chunk size must be a multiple of 4 and at least 16 bytes, got {}",
                self.chunk_size
            )));
        }

        if self.file_size < self.chunk_size {
            return Err(DiskProbeError::ConfigError(format!(
                "File size ({} bytes) must be at least one chunk ({} bytes)",
                self.file_size, self.chunk_size
            )));
        }

        if self.seek_workers == 0 {
            return Err(DiskProbeError::ConfigError(
                "Seek worker count must be greater than 0".to_string(),
            ));
        }

        const MAX_SEEK_WORKERS: usize = 256;
        if self.seek_workers > MAX_SEEK_WORKERS {
            return Err(DiskProbeError::ConfigError(format!(
                "Too many seek workers: {} (max: {})",
                self.seek_workers, MAX_SEEK_WORKERS
            )));
        }

        if self.update_period == 0 {
            return Err(DiskProbeError::ConfigError(
                "Update period must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Set the scratch directory
    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = dir;
        self
    }

    /// Set the test file size in bytes
    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = size;
        self
    }

    /// Set the machine label
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = machine.into();
        self
    }

    /// Enable or disable chunk randomization
    pub fn with_randomize_blocks(mut self, randomize: bool) -> Self {
        self.randomize_blocks = randomize;
        self
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, size: u64) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the number of seek workers
    pub fn with_seek_workers(mut self, workers: usize) -> Self {
        self.seek_workers = workers;
        self
    }

    /// Set the number of probes per seek phase
    pub fn with_seek_count(mut self, count: u64) -> Self {
        self.seek_count = count;
        self
    }

    /// Set the start settle delay
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Set the cache drop command
    pub fn with_cache_drop_command(mut self, command: Option<String>) -> Self {
        self.cache_drop_command = command;
        self
    }

    /// Set whether to keep the test file
    pub fn with_keep_test_file(mut self, keep: bool) -> Self {
        self.keep_test_file = keep;
        self
    }

    /// Set whether progress bars are drawn
    pub fn with_show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Load configuration from `path`, or from the standard location when
    /// `path` is `None`. A missing standard file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::config_file_path() {
                Ok(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&config_path).map_err(|e| {
            DiskProbeError::ConfigError(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the standard configuration file path
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            DiskProbeError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

/// Serialize durations as human readable strings such as `"1s 500ms"`.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_validate_in_existing_dir() {
        let dir = tempdir().unwrap();
        let config = BenchConfig::new().with_scratch_dir(dir.path().to_path_buf());
        assert!(config.validate().is_ok());
        assert_eq!(config.file_size, 24 * GIB);
        assert_eq!(config.seek_workers, 3);
        assert_eq!(config.seek_count, 100_000);
        assert_eq!(config.update_period, 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = tempdir().unwrap();
        let base = BenchConfig::new().with_scratch_dir(dir.path().to_path_buf());

        assert!(base.clone().with_seek_workers(0).validate().is_err());
        assert!(base.clone().with_chunk_size(10).validate().is_err());
        assert!(base.clone().with_chunk_size(8).validate().is_err());
        assert!(base.clone().with_file_size(1024).validate().is_err());
        assert!(base
            .clone()
            .with_scratch_dir(dir.path().join("missing"))
            .validate()
            .is_err());
    }

    #[test]
    fn test_toml_partial_override() {
        let config = BenchConfig::from_toml_str(
            r#"
            machine = "boxy"
            seek_workers = 8
            start_delay = "1s 500ms"
            "#,
        )
        .unwrap();
        assert_eq!(config.machine, "boxy");
        assert_eq!(config.seek_workers, 8);
        assert_eq!(config.start_delay, Duration::from_millis(1500));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BenchConfig::new()
            .with_machine("lab-3")
            .with_start_delay(Duration::from_secs(2))
            .with_cache_drop_command(Some("sync".to_string()));
        let text = toml::to_string(&config).expect("Failed to serialize to TOML");
        let back = BenchConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.machine, "lab-3");
        assert_eq!(back.start_delay, Duration::from_secs(2));
        assert_eq!(back.cache_drop_command.as_deref(), Some("sync"));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempdir().unwrap();
        let result = BenchConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(DiskProbeError::ConfigError(_))));
    }

    #[test]
    fn test_config_file_path() {
        if let Ok(path) = BenchConfig::config_file_path() {
            assert!(path.to_string_lossy().contains("diskprobe.toml"));
        }
    }
}
