//! Benchmark phases and their measured deltas

use crate::bench::timing::PhaseDelta;
use crate::{DiskProbeError, Result};
use serde::Serialize;

/// One named benchmark activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPhase {
    SequentialWrite,
    Rewrite,
    SequentialRead,
    SeekReadOnly,
    SeekReadWrite,
}

impl TestPhase {
    /// All phases in execution order
    pub const ALL: [TestPhase; 5] = [
        TestPhase::SequentialWrite,
        TestPhase::Rewrite,
        TestPhase::SequentialRead,
        TestPhase::SeekReadOnly,
        TestPhase::SeekReadWrite,
    ];

    fn index(self) -> usize {
        match self {
            TestPhase::SequentialWrite => 0,
            TestPhase::Rewrite => 1,
            TestPhase::SequentialRead => 2,
            TestPhase::SeekReadOnly => 3,
            TestPhase::SeekReadWrite => 4,
        }
    }

    /// Human-readable name, used in log lines
    pub fn description(&self) -> &'static str {
        match self {
            TestPhase::SequentialWrite => "Writing intelligently",
            TestPhase::Rewrite => "Rewriting",
            TestPhase::SequentialRead => "Reading intelligently",
            TestPhase::SeekReadOnly => "Random seeks (read-only)",
            TestPhase::SeekReadWrite => "Random seeks (with rewrites)",
        }
    }

    /// Whether this phase is measured in seeks rather than bytes
    pub fn is_seek(&self) -> bool {
        matches!(self, TestPhase::SeekReadOnly | TestPhase::SeekReadWrite)
    }
}

/// Per-phase (elapsed, cpu) storage; each slot is written exactly once
#[derive(Debug, Clone, Default)]
pub struct PhaseTable {
    slots: [Option<PhaseDelta>; 5],
}

impl PhaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the delta for `phase`. Recording the same phase twice is an error.
    pub fn record(&mut self, phase: TestPhase, delta: PhaseDelta) -> Result<()> {
        let slot = &mut self.slots[phase.index()];
        if slot.is_some() {
            return Err(DiskProbeError::BenchmarkError(format!(
                "phase '{}' was already measured",
                phase.description()
            )));
        }
        *slot = Some(delta);
        Ok(())
    }

    pub fn get(&self, phase: TestPhase) -> Option<&PhaseDelta> {
        self.slots[phase.index()].as_ref()
    }

    /// Number of phases measured so far
    pub fn recorded(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
