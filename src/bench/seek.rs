//! Random seek worker
//!
//! A worker opens its own handle on the test file, acknowledges readiness,
//! waits for the start signal and then performs one probe per perform ticket
//! until it draws a stop ticket. A probe reads one aligned block at a random
//! offset; on a fixed duty cycle, and only in read-write mode, it dirties a
//! word and writes the block back durably. The worker reports its own
//! start/end checkpoints and CPU time once it has flushed and closed the file.

use crate::bench::ticket::{Ticket, TicketReceiver};
use crate::bench::timing::{Checkpoint, CpuScope, PhaseDelta, RunClock};
use crate::io::block::Block;
use crate::io::disk::{close_file, open_read_write, DurableFile};
use crate::{DiskProbeError, Result};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Whether seek probes may write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    ReadOnly,
    ReadWrite,
}

impl SeekMode {
    pub fn allows_writes(&self) -> bool {
        matches!(self, SeekMode::ReadWrite)
    }
}

/// Fixed-period write-back schedule: probe 0, K, 2K, ... write back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    period: u64,
}

impl DutyCycle {
    pub fn new(period: u64) -> Self {
        Self {
            period: period.max(1),
        }
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    /// Whether the probe with this zero-based index is an update probe
    pub fn is_update(&self, probe_index: u64) -> bool {
        probe_index % self.period == 0
    }
}

/// Align a raw offset down to a block boundary, never past the last full block
pub fn probe_offset(raw: u64, file_size: u64, block_size: u64) -> u64 {
    let last_block = (file_size / block_size).saturating_sub(1) * block_size;
    ((raw / block_size) * block_size).min(last_block)
}

/// Per-worker generator seed, unique to this process and worker
pub fn worker_seed(worker_id: usize) -> u64 {
    let pid = u64::from(std::process::id());
    (pid << 32) ^ (worker_id as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Timing report a worker sends once, after its last probe
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub cpu_secs: f64,
    pub start: Checkpoint,
    pub end: Checkpoint,
    /// Perform tickets consumed
    pub probes: u64,
    /// Probes that dirtied and wrote back their block
    pub write_backs: u64,
}

impl WorkerReport {
    /// This worker's own wall-clock span
    pub fn elapsed_secs(&self) -> f64 {
        PhaseDelta::between(&self.start, &self.end).elapsed_secs
    }
}

/// Probe state: generator, block buffer and counters
pub struct Prober<R: Rng> {
    rng: R,
    block: Block,
    file_size: u64,
    block_size: u64,
    mode: SeekMode,
    duty: DutyCycle,
    probes: u64,
    write_backs: u64,
}

impl<R: Rng> Prober<R> {
    pub fn new(rng: R, file_size: u64, block_size: u64, mode: SeekMode, duty: DutyCycle) -> Self {
        Self {
            rng,
            block: Block::new(block_size as usize),
            file_size,
            block_size,
            mode,
            duty,
            probes: 0,
            write_backs: 0,
        }
    }

    /// Read one random block and, on the duty cycle, write it back dirtied.
    /// Returns the probed offset.
    pub fn probe<F: DurableFile + ?Sized>(&mut self, file: &mut F) -> Result<u64> {
        let raw = self.rng.gen_range(0..self.file_size);
        let offset = probe_offset(raw, self.file_size, self.block_size);

        file.seek(SeekFrom::Start(offset))
            .map_err(|e| DiskProbeError::io("lseek in probe", e))?;
        file.read_exact(self.block.as_mut_slice())
            .map_err(|e| DiskProbeError::io("read in probe", e))?;

        let update = self.duty.is_update(self.probes);
        self.probes += 1;

        if update && self.mode.allows_writes() {
            self.block.touch_interior_word(&mut self.rng);
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| DiskProbeError::io("lseek in probe update", e))?;
            file.write_all(self.block.as_slice())
                .map_err(|e| DiskProbeError::io("write in probe", e))?;
            file.sync_durable()
                .map_err(|e| DiskProbeError::io("fsync in probe with write", e))?;
            self.write_backs += 1;
        }

        Ok(offset)
    }

    pub fn probes(&self) -> u64 {
        self.probes
    }

    pub fn write_backs(&self) -> u64 {
        self.write_backs
    }
}

/// Channels a worker uses to talk to its coordinator
pub struct WorkerChannels {
    pub ready: mpsc::Sender<usize>,
    pub start: oneshot::Receiver<()>,
    pub tickets: TicketReceiver,
    pub reports: mpsc::Sender<WorkerReport>,
}

/// One seek worker; `run` blocks the calling thread
#[derive(Debug, Clone)]
pub struct SeekWorker {
    pub id: usize,
    pub path: PathBuf,
    pub file_size: u64,
    pub block_size: u64,
    pub mode: SeekMode,
    pub duty: DutyCycle,
    pub clock: RunClock,
}

impl SeekWorker {
    /// Run the worker to completion. Any I/O failure ends the worker with
    /// an error and without a report.
    pub fn run(self, channels: WorkerChannels) -> Result<()> {
        let WorkerChannels {
            ready,
            start,
            tickets,
            reports,
        } = channels;

        let mut file = open_read_write(&self.path).map_err(|e| {
            DiskProbeError::io(format!("open {} for seeking", self.path.display()), e)
        })?;
        let rng = SmallRng::seed_from_u64(worker_seed(self.id));
        let mut prober = Prober::new(rng, self.file_size, self.block_size, self.mode, self.duty);

        debug!(seeker = self.id + 1, "seeker ready");
        ready.blocking_send(self.id).map_err(|_| {
            DiskProbeError::SetupError("ready channel closed before start".to_string())
        })?;
        drop(ready);

        if start.blocking_recv().is_err() {
            // coordinator aborted the phase before starting
            debug!(seeker = self.id + 1, "start gate closed, standing down");
            return Ok(());
        }

        let started = self.clock.mark(CpuScope::Thread)?;
        while tickets.next_blocking()? == Ticket::Perform {
            prober.probe(&mut file)?;
        }

        file.sync_durable()
            .map_err(|e| DiskProbeError::io("fsync after seek", e))?;
        close_file(file).map_err(|e| DiskProbeError::io("close after seek", e))?;

        let ended = self.clock.mark(CpuScope::Thread)?;
        let report = WorkerReport {
            worker_id: self.id,
            cpu_secs: PhaseDelta::between(&started, &ended).cpu_secs,
            start: started,
            end: ended,
            probes: prober.probes(),
            write_backs: prober.write_backs(),
        };
        debug!(
            seeker = self.id + 1,
            probes = report.probes,
            write_backs = report.write_backs,
            "seeker done"
        );

        reports.blocking_send(report).map_err(|_| {
            DiskProbeError::WorkerError(format!(
                "seeker {}: report channel closed before report was sent",
                self.id + 1
            ))
        })
    }
}
