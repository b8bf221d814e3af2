//! Ticket protocol between the seek coordinator and its workers
//!
//! The coordinator queues `operations` perform tickets followed by one stop
//! ticket per worker in a single pass. Workers pull tickets one at a time
//! from the shared receiver, so whichever worker is ready next gets the next
//! probe and the device always has a request outstanding. Every ticket is
//! delivered exactly once.

use crate::{DiskProbeError, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// One unit of authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ticket {
    /// Leave the probe loop
    Stop = 0,
    /// Perform exactly one probe
    Perform = 1,
}

/// The complete, ordered ticket sequence for one seek phase
#[derive(Debug, Clone)]
pub struct TicketBook {
    tickets: Vec<Ticket>,
}

impl TicketBook {
    /// `operations` perform tickets, then `workers` stop tickets
    pub fn new(operations: u64, workers: usize) -> Result<Self> {
        let total = usize::try_from(operations)
            .ok()
            .and_then(|ops| ops.checked_add(workers))
            .ok_or_else(|| {
                DiskProbeError::SetupError(format!(
                    "ticket book of {} operations and {} workers does not fit in memory",
                    operations, workers
                ))
            })?;

        let mut tickets = Vec::with_capacity(total);
        tickets.resize(total - workers, Ticket::Perform);
        tickets.resize(total, Ticket::Stop);

        Ok(Self { tickets })
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn as_slice(&self) -> &[Ticket] {
        &self.tickets
    }
}

/// Coordinator side of the control channel
#[derive(Debug)]
pub struct TicketDispenser {
    tx: mpsc::Sender<Ticket>,
    capacity: usize,
}

/// Worker side of the control channel, shared by all workers
#[derive(Debug, Clone)]
pub struct TicketReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Ticket>>>,
}

/// Create a control channel able to hold the whole `book` without blocking.
pub fn ticket_channel(book: &TicketBook) -> (TicketDispenser, TicketReceiver) {
    let capacity = book.len().max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (
        TicketDispenser { tx, capacity },
        TicketReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

impl TicketDispenser {
    /// Queue the entire book. Anything short of a complete transfer is fatal,
    /// since a partial sequence would leave workers waiting forever.
    pub fn dispense(self, book: &TicketBook) -> Result<()> {
        if book.len() > self.capacity {
            return Err(DiskProbeError::SetupError(format!(
                "control channel holds {} tickets, book has {}",
                self.capacity,
                book.len()
            )));
        }

        for (sent, ticket) in book.as_slice().iter().enumerate() {
            self.tx.try_send(*ticket).map_err(|e| {
                DiskProbeError::SetupError(format!(
                    "write tickets: sent {} of {}: {}",
                    sent,
                    book.len(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

impl TicketReceiver {
    /// Block the calling thread until the next ticket arrives.
    ///
    /// Must not be called from an async context.
    pub fn next_blocking(&self) -> Result<Ticket> {
        let mut rx = self.rx.blocking_lock();
        rx.blocking_recv().ok_or_else(|| {
            DiskProbeError::WorkerError(
                "read ticket: control channel closed before a stop ticket arrived".to_string(),
            )
        })
    }
}
