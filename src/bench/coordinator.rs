//! Seek phase coordinator
//!
//! Spawns the seek workers, holds them at a ready barrier until every one has
//! opened its file, releases them together, queues the ticket book and then
//! gathers exactly one report per worker. The phase's elapsed time is the
//! span from the earliest worker start to the latest worker end, and its CPU
//! time is the sum of every worker's CPU time.

use crate::bench::seek::{DutyCycle, SeekMode, SeekWorker, WorkerChannels, WorkerReport};
use crate::bench::ticket::{ticket_channel, TicketBook};
use crate::bench::timing::{PhaseDelta, RunClock};
use crate::config::BenchConfig;
use crate::io::cache::drop_caches;
use crate::{DiskProbeError, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// A seek worker running on its own OS thread
struct SeekerThread {
    id: usize,
    handle: std::thread::JoinHandle<()>,
    done: oneshot::Receiver<Result<()>>,
}

/// Start `worker` on a dedicated thread so every worker runs at once,
/// whatever the size of the runtime's blocking pool.
fn spawn_seeker(worker: SeekWorker, channels: WorkerChannels) -> Result<SeekerThread> {
    let id = worker.id;
    let (done_tx, done) = oneshot::channel();
    let handle = std::thread::Builder::new()
        .name(format!("seeker-{}", id + 1))
        .spawn(move || {
            let _ = done_tx.send(worker.run(channels));
        })
        .map_err(|e| DiskProbeError::SetupError(format!("spawn seeker {}: {}", id + 1, e)))?;
    Ok(SeekerThread { id, handle, done })
}

/// Combined result of all workers of one seek phase
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedPhaseResult {
    /// Sum of every worker's CPU seconds
    pub cpu_secs: f64,
    /// Latest end minus earliest start across all workers
    pub elapsed_secs: f64,
    /// Total perform tickets consumed
    pub probes: u64,
    /// Total blocks written back
    pub write_backs: u64,
    pub reports: Vec<WorkerReport>,
}

impl AggregatedPhaseResult {
    /// Aggregate worker reports. At least one report is required.
    pub fn from_reports(reports: Vec<WorkerReport>) -> Result<Self> {
        let first_start = reports.iter().map(|r| r.start.wall).min();
        let last_stop = reports.iter().map(|r| r.end.wall).max();
        let (Some(first_start), Some(last_stop)) = (first_start, last_stop) else {
            return Err(DiskProbeError::WorkerError(
                "no worker reports to aggregate".to_string(),
            ));
        };

        Ok(Self {
            cpu_secs: reports.iter().map(|r| r.cpu_secs).sum(),
            elapsed_secs: last_stop.saturating_sub(first_start).as_secs_f64(),
            probes: reports.iter().map(|r| r.probes).sum(),
            write_backs: reports.iter().map(|r| r.write_backs).sum(),
            reports,
        })
    }

    pub fn delta(&self) -> PhaseDelta {
        PhaseDelta {
            elapsed_secs: self.elapsed_secs,
            cpu_secs: self.cpu_secs,
        }
    }
}

/// Drives seek phases against one test file
#[derive(Debug, Clone)]
pub struct SeekCoordinator {
    path: PathBuf,
    file_size: u64,
    block_size: u64,
    duty: DutyCycle,
    start_delay: Duration,
    cache_drop_command: Option<String>,
    clock: RunClock,
}

impl SeekCoordinator {
    pub fn new(config: &BenchConfig, path: PathBuf, clock: RunClock) -> Self {
        Self {
            path,
            file_size: config.file_size,
            block_size: config.chunk_size,
            duty: DutyCycle::new(config.update_period),
            start_delay: config.start_delay,
            cache_drop_command: config.cache_drop_command.clone(),
            clock,
        }
    }

    /// Run one seek phase with `workers` concurrent workers sharing
    /// `operations` probes.
    pub async fn run_seek_phase(
        &self,
        workers: usize,
        operations: u64,
        mode: SeekMode,
    ) -> Result<AggregatedPhaseResult> {
        if workers == 0 {
            return Err(DiskProbeError::ConfigError(
                "seek phase needs at least one worker".to_string(),
            ));
        }

        drop_caches(self.cache_drop_command.as_deref()).await;

        let book = TicketBook::new(operations, workers)?;
        let (dispenser, tickets) = ticket_channel(&book);
        let (ready_tx, mut ready_rx) = mpsc::channel(workers);
        let (report_tx, mut report_rx) = mpsc::channel(workers);

        let mut seekers = Vec::with_capacity(workers);
        let mut start_gates = Vec::with_capacity(workers);
        for id in 0..workers {
            let (start_tx, start_rx) = oneshot::channel();
            let worker = SeekWorker {
                id,
                path: self.path.clone(),
                file_size: self.file_size,
                block_size: self.block_size,
                mode,
                duty: self.duty,
                clock: self.clock,
            };
            let channels = WorkerChannels {
                ready: ready_tx.clone(),
                start: start_rx,
                tickets: tickets.clone(),
                reports: report_tx.clone(),
            };
            match spawn_seeker(worker, channels) {
                Ok(seeker) => seekers.push(seeker),
                Err(err) => {
                    drop(start_gates);
                    drop(ready_tx);
                    drop(report_tx);
                    drop(tickets);
                    reap(seekers).await?;
                    return Err(err);
                }
            }
            start_gates.push(start_tx);
        }
        // only workers may keep these open, so a dead worker closes them
        drop(ready_tx);
        drop(report_tx);
        drop(tickets);

        let mut ready = 0;
        while ready < workers {
            match ready_rx.recv().await {
                Some(id) => {
                    debug!(seeker = id + 1, "seeker checked in");
                    ready += 1;
                }
                None => break,
            }
        }
        if ready < workers {
            drop(start_gates);
            reap(seekers).await?;
            return Err(DiskProbeError::WorkerError(format!(
                "only {} of {} seekers became ready",
                ready, workers
            )));
        }

        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }

        info!(workers, operations, ?mode, "start 'em");
        for gate in start_gates {
            let _ = gate.send(());
        }
        if let Err(err) = dispenser.dispense(&book) {
            return Err(worker_error_or(reap(seekers).await, err));
        }

        let mut reports = Vec::with_capacity(workers);
        while reports.len() < workers {
            match report_rx.recv().await {
                Some(report) => reports.push(report),
                None => break,
            }
        }

        reap(seekers).await?;
        if reports.len() < workers {
            return Err(DiskProbeError::WorkerError(format!(
                "received {} of {} seeker reports",
                reports.len(),
                workers
            )));
        }

        let result = AggregatedPhaseResult::from_reports(reports)?;
        info!(
            elapsed_secs = result.elapsed_secs,
            cpu_secs = result.cpu_secs,
            probes = result.probes,
            write_backs = result.write_backs,
            "seek phase done"
        );
        Ok(result)
    }
}

/// A worker's own failure explains a broken phase better than `fallback`
fn worker_error_or(reaped: Result<()>, fallback: DiskProbeError) -> DiskProbeError {
    match reaped {
        Err(worker_err) => worker_err,
        Ok(()) => fallback,
    }
}

/// Wait for every worker to exit; return the first worker failure, if any.
async fn reap(seekers: Vec<SeekerThread>) -> Result<()> {
    let mut first_error = None;
    let mut handles = Vec::with_capacity(seekers.len());
    for seeker in seekers {
        let outcome = match seeker.done.await {
            Ok(result) => result,
            Err(_) => Err(DiskProbeError::WorkerError(format!(
                "seeker {} died without finishing",
                seeker.id + 1
            ))),
        };
        if let Err(e) = outcome {
            first_error.get_or_insert(e);
        }
        handles.push(seeker.handle);
    }

    // every thread has sent its outcome or unwound, so these joins are short
    let joined = tokio::task::spawn_blocking(move || {
        handles.into_iter().map(|h| h.join()).filter(|r| r.is_err()).count()
    })
    .await
    .map_err(|e| DiskProbeError::WorkerError(format!("joining seekers: {}", e)))?;

    match first_error {
        Some(e) => Err(e),
        None if joined > 0 => Err(DiskProbeError::WorkerError(format!(
            "{} seeker thread(s) panicked",
            joined
        ))),
        None => Ok(()),
    }
}
