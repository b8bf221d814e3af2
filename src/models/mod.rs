//! Data models module
//!
//! Contains the benchmark phase enumeration, the per-phase measurement table
//! and the final run report.

pub mod phase;
pub mod result;

// Re-export commonly used types
pub use phase::{PhaseTable, TestPhase};
pub use result::{PhaseFigures, RunReport};
