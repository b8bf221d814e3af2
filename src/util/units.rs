//! Units formatting and rate calculations
//!
//! Provides human-readable byte formatting for log lines and the arithmetic
//! behind every reported rate and CPU percentage.

/// Bytes in one mebibyte
pub const MIB: u64 = 1024 * 1024;

/// Format bytes into human-readable size with appropriate units
///
/// # Examples
/// ```
/// use diskprobe::util::units::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.0 KiB");
/// assert_eq!(format_bytes(1048576), "1.0 MiB");
/// assert_eq!(format_bytes(1073741824), "1.0 GiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Convert bytes to fractional mebibytes
pub fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / MIB as f64
}

/// Units of work per elapsed second; zero when no time elapsed
///
/// # Examples
/// ```
/// use diskprobe::util::units::calculate_rate;
///
/// assert_eq!(calculate_rate(100_000.0, 4.0), 25_000.0);
/// assert_eq!(calculate_rate(10.0, 0.0), 0.0);
/// ```
pub fn calculate_rate(units: f64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    units / elapsed_secs
}

/// CPU seconds as a percentage of elapsed seconds
///
/// Multi-worker phases can exceed 100%.
pub fn calculate_cpu_percent(cpu_secs: f64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    cpu_secs / elapsed_secs * 100.0
}
