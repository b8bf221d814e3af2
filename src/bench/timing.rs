//! Wall-clock and CPU-time checkpoints
//!
//! Every phase is measured by taking a [`Checkpoint`] before and after the
//! work and subtracting the two. Wall time is measured from a [`RunClock`]
//! epoch shared by the whole run, so checkpoints taken on different worker
//! threads can be compared directly.

use crate::{DiskProbeError, Result};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Whose CPU time a checkpoint samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuScope {
    /// The whole process (user + system, all threads)
    Process,
    /// Only the calling thread; used by seek workers so their figures can be summed
    Thread,
}

/// A paired wall-clock / cumulative CPU sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Checkpoint {
    /// Time since the run epoch
    pub wall: Duration,
    /// Cumulative CPU time of the sampled scope
    pub cpu: Duration,
}

/// Elapsed and CPU seconds of one phase
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PhaseDelta {
    pub elapsed_secs: f64,
    pub cpu_secs: f64,
}

impl PhaseDelta {
    /// Difference between two checkpoints.
    pub fn between(start: &Checkpoint, end: &Checkpoint) -> Self {
        Self {
            elapsed_secs: end.wall.saturating_sub(start.wall).as_secs_f64(),
            cpu_secs: end.cpu.saturating_sub(start.cpu).as_secs_f64(),
        }
    }
}

/// Monotonic epoch shared by the coordinator and every worker
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    epoch: Instant,
}

impl RunClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Sample wall-clock and CPU time for `scope`.
    pub fn mark(&self, scope: CpuScope) -> Result<Checkpoint> {
        let cpu = cpu_time(scope)?;
        Ok(Checkpoint {
            wall: self.epoch.elapsed(),
            cpu,
        })
    }
}

impl Default for RunClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn timeval_to_duration(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec as u64) + Duration::from_micros(tv.tv_usec as u64)
}

#[cfg(unix)]
fn rusage(who: libc::c_int) -> Result<Duration> {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    // SAFETY: `usage` is a valid, writable rusage for the duration of the call.
    let rc = unsafe { libc::getrusage(who, &mut usage) };
    if rc != 0 {
        return Err(DiskProbeError::TimingError(format!(
            "getrusage: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(timeval_to_duration(usage.ru_utime) + timeval_to_duration(usage.ru_stime))
}

#[cfg(target_os = "linux")]
fn thread_cpu_time() -> Result<Duration> {
    rusage(libc::RUSAGE_THREAD)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn thread_cpu_time() -> Result<Duration> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
    if rc != 0 {
        return Err(DiskProbeError::TimingError(format!(
            "clock_gettime: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
}

#[cfg(unix)]
fn cpu_time(scope: CpuScope) -> Result<Duration> {
    match scope {
        CpuScope::Process => rusage(libc::RUSAGE_SELF),
        CpuScope::Thread => thread_cpu_time(),
    }
}

#[cfg(not(unix))]
fn cpu_time(_scope: CpuScope) -> Result<Duration> {
    Err(DiskProbeError::TimingError(
        "CPU accounting is only available on unix platforms".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burn_cpu(for_at_least: Duration) -> u64 {
        let start = Instant::now();
        let mut acc = 0u64;
        while start.elapsed() < for_at_least {
            for i in 0..10_000u64 {
                acc = acc.wrapping_mul(31).wrapping_add(i);
            }
        }
        std::hint::black_box(acc)
    }

    #[test]
    fn test_mark_is_monotonic() {
        let clock = RunClock::new();
        let a = clock.mark(CpuScope::Process).unwrap();
        burn_cpu(Duration::from_millis(20));
        let b = clock.mark(CpuScope::Process).unwrap();
        assert!(b.wall >= a.wall);
        assert!(b.cpu >= a.cpu);
    }

    #[test]
    fn test_thread_scope_counts_own_work() {
        let clock = RunClock::new();
        let start = clock.mark(CpuScope::Thread).unwrap();
        burn_cpu(Duration::from_millis(50));
        let end = clock.mark(CpuScope::Thread).unwrap();
        let delta = PhaseDelta::between(&start, &end);
        assert!(delta.elapsed_secs >= 0.05);
        assert!(delta.cpu_secs > 0.0);
    }

    #[test]
    fn test_delta_never_negative() {
        let later = Checkpoint {
            wall: Duration::from_secs(5),
            cpu: Duration::from_secs(2),
        };
        let earlier = Checkpoint {
            wall: Duration::from_secs(3),
            cpu: Duration::from_secs(1),
        };
        let delta = PhaseDelta::between(&later, &earlier);
        assert_eq!(delta.elapsed_secs, 0.0);
        assert_eq!(delta.cpu_secs, 0.0);

        let delta = PhaseDelta::between(&earlier, &later);
        assert_eq!(delta.elapsed_secs, 2.0);
        assert_eq!(delta.cpu_secs, 1.0);
    }

    #[test]
    fn test_clocks_share_epoch_across_threads() {
        let clock = RunClock::new();
        let before = clock.mark(CpuScope::Process).unwrap();
        let on_thread = std::thread::spawn(move || clock.mark(CpuScope::Thread).unwrap())
            .join()
            .unwrap();
        assert!(on_thread.wall >= before.wall);
    }
}
