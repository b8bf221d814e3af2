//! Interrupt handling
//!
//! SIGINT, SIGTERM and SIGQUIT all abort the run the same way: the caller
//! prints what has been measured, drops the run context so the test file is
//! removed, and exits with the conventional `128 + signal` status.

use crate::Result;
#[cfg(unix)]
use crate::DiskProbeError;

/// The signal that ended the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
    Quit,
}

impl ShutdownSignal {
    /// POSIX signal number
    pub fn number(&self) -> i32 {
        match self {
            ShutdownSignal::Interrupt => 2,
            ShutdownSignal::Terminate => 15,
            ShutdownSignal::Quit => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Quit => "SIGQUIT",
        }
    }

    /// Process exit status for a run ended by this signal
    pub fn exit_code(&self) -> i32 {
        128 + self.number()
    }
}

/// Registered signal listeners
#[cfg(unix)]
pub struct Shutdown {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Shutdown {
    /// Register the handlers. Must be called inside a tokio runtime.
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let register = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| {
                DiskProbeError::SetupError(format!("failed to register {} handler: {}", name, e))
            })
        };

        Ok(Self {
            interrupt: register(SignalKind::interrupt(), "SIGINT")?,
            terminate: register(SignalKind::terminate(), "SIGTERM")?,
            quit: register(SignalKind::quit(), "SIGQUIT")?,
        })
    }

    /// Wait for the first of the handled signals
    pub async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            _ = self.interrupt.recv() => ShutdownSignal::Interrupt,
            _ = self.terminate.recv() => ShutdownSignal::Terminate,
            _ = self.quit.recv() => ShutdownSignal::Quit,
        }
    }
}

#[cfg(not(unix))]
pub struct Shutdown;

#[cfg(not(unix))]
impl Shutdown {
    pub fn install() -> Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> ShutdownSignal {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        ShutdownSignal::Interrupt
    }
}
