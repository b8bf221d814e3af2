//! Run report
//!
//! Turns the measured phase deltas into throughput, seek-rate and CPU
//! percentage figures, and renders them as the classic fixed-width table or
//! as JSON.

use crate::bench::timing::PhaseDelta;
use crate::models::phase::{PhaseTable, TestPhase};
use crate::util::units::{bytes_to_mib, calculate_cpu_percent, calculate_rate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Derived figures for one phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseFigures {
    pub elapsed_secs: f64,
    pub cpu_secs: f64,
    /// MiB/s for byte phases, seeks/s for seek phases
    pub rate: f64,
    pub cpu_percent: f64,
}

impl PhaseFigures {
    /// `units` is the amount of work the phase did: MiB or seeks.
    pub fn from_delta(delta: &PhaseDelta, units: f64) -> Self {
        Self {
            elapsed_secs: delta.elapsed_secs,
            cpu_secs: delta.cpu_secs,
            rate: calculate_rate(units, delta.elapsed_secs),
            cpu_percent: calculate_cpu_percent(delta.cpu_secs, delta.elapsed_secs),
        }
    }
}

/// Complete (or partial) result of one benchmark run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub machine: String,
    pub file_size_mib: u64,
    pub seek_count: u64,
    pub sequential_write: Option<PhaseFigures>,
    pub rewrite: Option<PhaseFigures>,
    pub sequential_read: Option<PhaseFigures>,
    pub seek_read_only: Option<PhaseFigures>,
    pub seek_read_write: Option<PhaseFigures>,
}

impl RunReport {
    /// Build a report from whatever phases have been measured so far.
    pub fn from_phases(
        phases: &PhaseTable,
        machine: &str,
        file_size: u64,
        seek_count: u64,
    ) -> Self {
        let figures = |phase: TestPhase| {
            let units = if phase.is_seek() {
                seek_count as f64
            } else {
                bytes_to_mib(file_size)
            };
            phases
                .get(phase)
                .map(|delta| PhaseFigures::from_delta(delta, units))
        };

        Self {
            timestamp: Utc::now(),
            machine: machine.to_string(),
            file_size_mib: file_size / (1024 * 1024),
            seek_count,
            sequential_write: figures(TestPhase::SequentialWrite),
            rewrite: figures(TestPhase::Rewrite),
            sequential_read: figures(TestPhase::SequentialRead),
            seek_read_only: figures(TestPhase::SeekReadOnly),
            seek_read_write: figures(TestPhase::SeekReadWrite),
        }
    }

    /// True when every phase was measured
    pub fn is_complete(&self) -> bool {
        self.sequential_write.is_some()
            && self.rewrite.is_some()
            && self.sequential_read.is_some()
            && self.seek_read_only.is_some()
            && self.seek_read_write.is_some()
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn write_figures(
    f: &mut fmt::Formatter<'_>,
    figures: Option<&PhaseFigures>,
    rate_width: usize,
) -> fmt::Result {
    match figures {
        Some(p) => write!(
            f,
            " {:>rw$.1} {:>5.1}",
            p.rate,
            p.cpu_percent,
            rw = rate_width
        ),
        None => write!(f, " {:>rw$} {:>5}", "-", "-", rw = rate_width),
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:16}{:-^27} {:-^14} {:-^14} {:-^14}",
            "", "Sequential Output", "Input", "Random", "Random"
        )?;
        writeln!(
            f,
            "{:16}{:-^13} {:-^13} {:-^14} {:-^14} {:-^14}",
            "", "Block", "Rewrite", "Block", "ro Seeks", "Seeks rewrite"
        )?;
        writeln!(
            f,
            "{:<8} {:>6} {:>7} {:>5} {:>7} {:>5} {:>8} {:>5} {:>8} {:>5} {:>8} {:>5}",
            "Machine", "MB", "M/sec", "%CPU", "M/sec", "%CPU", "M/sec", "%CPU", "/sec", "%CPU",
            "/sec", "%CPU"
        )?;

        write!(f, "{:<8.8} {:>6}", self.machine, self.file_size_mib)?;
        write_figures(f, self.sequential_write.as_ref(), 7)?;
        write_figures(f, self.rewrite.as_ref(), 7)?;
        write_figures(f, self.sequential_read.as_ref(), 8)?;
        write_figures(f, self.seek_read_only.as_ref(), 8)?;
        write_figures(f, self.seek_read_write.as_ref(), 8)?;
        writeln!(f)
    }
}
