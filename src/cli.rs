//! CLI argument parsing for diskprobe

use crate::config::{BenchConfig, GIB};
use crate::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "diskprobe")]
#[command(version)]
#[command(
    about = "Filesystem throughput and random seek benchmark",
    long_about = None
)]
pub struct Cli {
    /// Directory in which to create the scratch test file
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Test file size in GiB
    #[arg(
        short = 's',
        long = "size",
        value_name = "GIB",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub size_gib: Option<u64>,

    /// Machine label printed in the report
    #[arg(short = 'm', long = "machine", value_name = "LABEL")]
    pub machine: Option<String>,

    /// Fill every written chunk with random bytes
    #[arg(short = 'r', long = "randomize")]
    pub randomize: bool,

    /// Number of concurrent seek workers
    #[arg(
        long = "workers",
        value_name = "N",
        value_parser = clap::value_parser!(u64).range(1..=256)
    )]
    pub workers: Option<u64>,

    /// Total random seeks per seek phase, shared by all workers
    #[arg(long = "seeks", value_name = "N")]
    pub seeks: Option<u64>,

    /// I/O chunk and probe block size in bytes
    #[arg(long = "chunk-size", value_name = "BYTES")]
    pub chunk_size: Option<u64>,

    /// Settle delay between worker readiness and the start signal (e.g. "500ms")
    #[arg(long = "start-delay", value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub start_delay: Option<Duration>,

    /// Shell command run to drop OS caches before each read phase
    #[arg(long = "drop-caches-cmd", value_name = "CMD")]
    pub drop_caches_cmd: Option<String>,

    /// Leave the test file in place after the run
    #[arg(long = "keep-file")]
    pub keep_file: bool,

    /// Configuration file (default: <config dir>/diskprobe/diskprobe.toml)
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long = "json")]
    pub json: bool,

    /// Only log warnings and errors; no progress bars
    #[arg(short = 'q', long = "quiet", conflicts_with = "debug")]
    pub quiet: bool,

    /// Log debug detail, including per-worker events
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Load the configuration file and apply command line overrides on top.
    pub fn load_config(&self) -> Result<BenchConfig> {
        let mut config = BenchConfig::load(self.config.as_deref())?;

        if let Some(dir) = &self.dir {
            config = config.with_scratch_dir(dir.clone());
        }
        if let Some(gib) = self.size_gib {
            config = config.with_file_size(gib.saturating_mul(GIB));
        }
        if let Some(machine) = &self.machine {
            config = config.with_machine(machine.clone());
        }
        if self.randomize {
            config = config.with_randomize_blocks(true);
        }
        if let Some(workers) = self.workers {
            config = config.with_seek_workers(workers as usize);
        }
        if let Some(seeks) = self.seeks {
            config = config.with_seek_count(seeks);
        }
        if let Some(chunk) = self.chunk_size {
            config = config.with_chunk_size(chunk);
        }
        if let Some(delay) = self.start_delay {
            config = config.with_start_delay(delay);
        }
        if let Some(cmd) = &self.drop_caches_cmd {
            config = config.with_cache_drop_command(Some(cmd.clone()));
        }
        if self.keep_file {
            config = config.with_keep_test_file(true);
        }
        if self.quiet {
            config = config.with_show_progress(false);
        }

        Ok(config)
    }

    /// Default log filter directive when `RUST_LOG` is unset
    pub fn log_level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("diskprobe").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("empty.toml");
        std::fs::File::create(&config_path).unwrap();
        let dir_arg = dir.path().to_string_lossy().to_string();
        let config_arg = config_path.to_string_lossy().to_string();

        let cli = parse(&[
            "-d",
            &dir_arg,
            "-s",
            "2",
            "-m",
            "box01",
            "-r",
            "--workers",
            "5",
            "--seeks",
            "1000",
            "--start-delay",
            "250ms",
            "--keep-file",
            "--config",
            &config_arg,
        ])
        .unwrap();
        let config = cli.load_config().unwrap();

        assert_eq!(config.scratch_dir, dir.path());
        assert_eq!(config.file_size, 2 * GIB);
        assert_eq!(config.machine, "box01");
        assert!(config.randomize_blocks);
        assert_eq!(config.seek_workers, 5);
        assert_eq!(config.seek_count, 1000);
        assert_eq!(config.start_delay, Duration::from_millis(250));
        assert!(config.keep_test_file);
        assert!(config.show_progress);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("diskprobe.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "seek_workers = 7\nseek_count = 10").unwrap();
        let config_arg = config_path.to_string_lossy().to_string();

        let cli = parse(&["--config", &config_arg, "--seeks", "20", "-q"]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.seek_workers, 7);
        assert_eq!(config.seek_count, 20);
        assert!(!config.show_progress);
        assert_eq!(cli.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(parse(&["-s", "0"]).is_err());
        assert!(parse(&["-s", "abc"]).is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(parse(&["--workers", "0"]).is_err());
    }

    #[test]
    fn test_bad_start_delay_rejected() {
        assert!(parse(&["--start-delay", "soon"]).is_err());
    }

    #[test]
    fn test_quiet_and_debug_conflict() {
        assert!(parse(&["--quiet", "--debug"]).is_err());
        assert_eq!(parse(&["--debug"]).unwrap().log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = parse(&["--config", "/nonexistent/diskprobe.toml"]).unwrap();
        assert!(cli.load_config().is_err());
    }
}
