//! Whole-run orchestration
//!
//! A [`RunContext`] owns everything a run needs: the validated configuration,
//! the shared clock epoch, the test file guard and the table of measured
//! phases. Dropping the context removes the test file, whichever way the run
//! ends.

use crate::bench::coordinator::SeekCoordinator;
use crate::bench::seek::SeekMode;
use crate::bench::sequential::SequentialJob;
use crate::bench::timing::{PhaseDelta, RunClock};
use crate::config::BenchConfig;
use crate::io::cache::drop_caches;
use crate::io::disk::TestFile;
use crate::models::{PhaseTable, RunReport, TestPhase};
use crate::{DiskProbeError, Result};
use std::fs::File;
use tracing::info;

/// State of one benchmark run
#[derive(Debug)]
pub struct RunContext {
    config: BenchConfig,
    clock: RunClock,
    test_file: TestFile,
    phases: PhaseTable,
}

impl RunContext {
    /// Validate `config` and name the test file. Nothing is created yet.
    pub fn new(config: BenchConfig) -> Result<Self> {
        config.validate()?;

        let mut test_file = TestFile::new(&config.scratch_dir);
        if config.keep_test_file {
            test_file.keep_on_drop();
        }

        Ok(Self {
            config,
            clock: RunClock::new(),
            test_file,
            phases: PhaseTable::new(),
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn test_file(&self) -> &TestFile {
        &self.test_file
    }

    pub fn phases(&self) -> &PhaseTable {
        &self.phases
    }

    /// Report of every phase measured so far
    pub fn report(&self) -> RunReport {
        RunReport::from_phases(
            &self.phases,
            &self.config.machine,
            self.config.file_size,
            self.config.seek_count,
        )
    }

    fn record(&mut self, phase: TestPhase, delta: PhaseDelta) -> Result<()> {
        info!(
            phase = phase.description(),
            elapsed_secs = delta.elapsed_secs,
            cpu_secs = delta.cpu_secs,
            "phase measured"
        );
        self.phases.record(phase, delta)
    }

    fn sequential_job(&self) -> SequentialJob {
        SequentialJob::new(
            self.config.file_size,
            self.config.chunk_size,
            self.config.randomize_blocks,
            self.clock,
        )
        .with_progress(self.config.show_progress)
    }

    fn seek_coordinator(&self) -> SeekCoordinator {
        SeekCoordinator::new(&self.config, self.test_file.path().to_path_buf(), self.clock)
    }

    fn open_file(&self, create: bool) -> Result<File> {
        let path = self.test_file.path().display().to_string();
        if create {
            self.test_file
                .create()
                .map_err(|e| DiskProbeError::io(format!("create {}", path), e))
        } else {
            self.test_file
                .open()
                .map_err(|e| DiskProbeError::io(format!("open {}", path), e))
        }
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DiskProbeError::BenchmarkError(format!("phase task failed: {}", e)))?
}

/// Run every phase in order, recording each as it completes. On error the
/// phases measured so far stay in the context for a partial report.
pub async fn run_all_phases(ctx: &mut RunContext) -> Result<()> {
    let job = ctx.sequential_job();
    info!(
        file = %ctx.test_file.path().display(),
        size = %crate::util::format_bytes(ctx.config.file_size),
        chunk = ctx.config.chunk_size,
        "starting run"
    );

    info!("{}...", TestPhase::SequentialWrite.description());
    let file = ctx.open_file(true)?;
    let write_job = job.clone();
    let delta = run_blocking(move || write_job.write(file)).await?;
    ctx.record(TestPhase::SequentialWrite, delta)?;

    info!("{}...", TestPhase::Rewrite.description());
    let file = ctx.open_file(false)?;
    let rewrite_job = job.clone();
    let delta = run_blocking(move || rewrite_job.rewrite(file)).await?;
    ctx.record(TestPhase::Rewrite, delta)?;

    drop_caches(ctx.config.cache_drop_command.as_deref()).await;

    info!("{}...", TestPhase::SequentialRead.description());
    let file = ctx.open_file(false)?;
    let read_job = job.clone();
    let (delta, _) = run_blocking(move || read_job.read(file)).await?;
    ctx.record(TestPhase::SequentialRead, delta)?;

    let coordinator = ctx.seek_coordinator();
    for (phase, mode) in [
        (TestPhase::SeekReadOnly, SeekMode::ReadOnly),
        (TestPhase::SeekReadWrite, SeekMode::ReadWrite),
    ] {
        info!(
            workers = ctx.config.seek_workers,
            seeks = ctx.config.seek_count,
            "{}...",
            phase.description()
        );
        let result = coordinator
            .run_seek_phase(ctx.config.seek_workers, ctx.config.seek_count, mode)
            .await?;
        ctx.record(phase, result.delta())?;
    }

    Ok(())
}
