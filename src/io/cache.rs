//! Best-effort OS cache invalidation between phases
//!
//! The actual mechanism is site specific (a root-only `drop_caches` write, a
//! sudo wrapper, a remount...), so it is just a configured shell command.
//! Failures are reported and otherwise ignored.

use tokio::process::Command;
use tracing::{debug, warn};

/// Outcome of one cache drop attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDrop {
    /// No command configured
    Skipped,
    /// The command ran and exited successfully
    Dropped,
    /// The command could not be started or exited non-zero
    Failed(String),
}

/// Run the cache drop `command` through `sh -c`, if one is configured.
pub async fn drop_caches(command: Option<&str>) -> CacheDrop {
    let Some(command) = command else {
        return CacheDrop::Skipped;
    };

    debug!(command, "dropping OS caches");
    let mut child = Command::new("sh");
    // an interrupted run must not leave the hook behind
    child.arg("-c").arg(command).kill_on_drop(true);
    match child.status().await {
        Ok(status) if status.success() => CacheDrop::Dropped,
        Ok(status) => {
            warn!(command, %status, "cache drop command failed");
            CacheDrop::Failed(format!("exited with {}", status))
        }
        Err(e) => {
            warn!(command, error = %e, "could not run cache drop command");
            CacheDrop::Failed(e.to_string())
        }
    }
}
