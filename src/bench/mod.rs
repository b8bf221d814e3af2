//! Benchmark engine module
//!
//! Contains the timing checkpoints, the sequential phases, the seek worker
//! and ticket protocol, the seek phase coordinator and the run driver that
//! puts them in order.

pub mod coordinator;
pub mod run;
pub mod seek;
pub mod sequential;
pub mod ticket;
pub mod timing;

// Re-export commonly used types
pub use coordinator::{AggregatedPhaseResult, SeekCoordinator};
pub use run::{run_all_phases, RunContext};
pub use seek::{DutyCycle, SeekMode, SeekWorker, WorkerReport};
pub use sequential::SequentialJob;
pub use ticket::{Ticket, TicketBook};
pub use timing::{Checkpoint, CpuScope, PhaseDelta, RunClock};
