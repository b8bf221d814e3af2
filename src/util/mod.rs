//! Utility functions module
//!
//! Contains helper functions for unit formatting and rate arithmetic.

pub mod units;

// Re-export commonly used functions
pub use units::{bytes_to_mib, calculate_cpu_percent, calculate_rate, format_bytes};
