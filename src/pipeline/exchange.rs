use tokio::{sync::mpsc::WeakSender, time::Instant};

use super::{command::Command, pool::PooledBuffer, transport::TransportError};

/// Identifies one transport read issued by a coordinator
pub type ExchangeId = u64;

/// The transport read currently outstanding for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingExchange {
    pub id: ExchangeId,
    pub started: Instant,
}

/// Holds at most one [PendingExchange]. Beginning a second exchange while one
/// is pending is rejected.
#[derive(Debug, Default)]
pub struct ExchangeSlot {
    next_id: ExchangeId,
    pending: Option<PendingExchange>,
}

impl ExchangeSlot {
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Claim the slot for a new exchange. Returns None if an exchange is
    /// already outstanding.
    pub fn begin(&mut self) -> Option<ExchangeId> {
        if self.pending.is_some() {
            return None;
        }
        self.next_id = self.next_id.wrapping_add(1);
        self.pending = Some(PendingExchange {
            id: self.next_id,
            started: Instant::now(),
        });
        Some(self.next_id)
    }

    /// Release the slot if it holds the given exchange. Completions for any
    /// other exchange are stale and leave the slot untouched.
    pub fn finish(&mut self, id: ExchangeId) -> Option<PendingExchange> {
        match self.pending {
            Some(pending) if pending.id == id => self.pending.take(),
            _ => None,
        }
    }
}

/// Result of a transport read, handed back to the coordinator together with
/// the buffer it was read into.
#[derive(Debug)]
pub struct TransportCompletion {
    pub exchange: ExchangeId,
    pub buffer: PooledBuffer,
    pub result: Result<usize, TransportError>,
}

/// Given to a transport with every read. The transport must call one of the
/// completion methods exactly once, or drop the sink if the read never
/// started.
#[derive(Debug)]
pub struct CompletionSink {
    exchange: ExchangeId,
    tx: WeakSender<Command>,
}

impl CompletionSink {
    pub fn new(exchange: ExchangeId, tx: WeakSender<Command>) -> Self {
        Self { exchange, tx }
    }

    fn into_command(
        self,
        buffer: PooledBuffer,
        result: Result<usize, TransportError>,
    ) -> Option<(tokio::sync::mpsc::Sender<Command>, Command)> {
        let Some(tx) = self.tx.upgrade() else {
            log::debug!(
                "Coordinator stopped before exchange {} completed",
                self.exchange
            );
            return None;
        };
        let completion = TransportCompletion {
            exchange: self.exchange,
            buffer,
            result,
        };
        Some((tx, Command::TransportComplete(completion)))
    }

    /// Deliver the read result to the coordinator
    pub async fn complete(self, buffer: PooledBuffer, result: Result<usize, TransportError>) {
        let Some((tx, command)) = self.into_command(buffer, result) else {
            return;
        };
        if let Err(e) = tx.send(command).await {
            log::debug!("Unable to deliver transport completion: {e:?}");
        }
    }

    /// Deliver the read result to the coordinator (blocking)
    pub fn blocking_complete(self, buffer: PooledBuffer, result: Result<usize, TransportError>) {
        let Some((tx, command)) = self.into_command(buffer, result) else {
            return;
        };
        if let Err(e) = tx.blocking_send(command) {
            log::debug!("Unable to deliver transport completion: {e:?}");
        }
    }
}
