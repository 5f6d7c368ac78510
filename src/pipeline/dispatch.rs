//! Hand-off from the sampler thread to the presentation context.
//!
//! Built on a single-receiver `tokio::sync::broadcast` channel. `dispatch`
//! never waits on the consumer: once the ring is full the oldest pending
//! snapshot is overwritten, the receiver learns about it as a lag, and
//! delivery order always matches send order.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, error};

use crate::system::snapshot::Snapshot;

pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// Presentation-side consumer of snapshots. Called only on the presentation
/// context, once per delivered snapshot, in send order.
pub trait Renderer {
    fn on_snapshot(&mut self, snapshot: Snapshot);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Queued,
    /// The queue was full; the oldest pending snapshot was discarded.
    Coalesced,
    /// The receiver is gone; the snapshot was discarded.
    Closed,
}

#[derive(Debug, Error)]
#[error("renderer panicked while consuming a snapshot: {message}")]
pub struct RenderDeliveryError {
    pub message: String,
}

/// Sending half, owned by the sampler thread.
pub struct Dispatcher {
    sender: broadcast::Sender<Snapshot>,
    capacity: usize,
}

/// Receiving half, owned by the presentation context.
pub struct SnapshotReceiver {
    receiver: broadcast::Receiver<Snapshot>,
    capacity: usize,
    dropped: u64,
    closed: bool,
}

/// Create a hand-off holding at most `capacity` undelivered snapshots.
/// The capacity is raised to at least one and rounded up to a power of two,
/// as the underlying ring requires.
pub fn channel(capacity: usize) -> (Dispatcher, SnapshotReceiver) {
    let capacity = capacity.max(1).next_power_of_two();
    let (sender, receiver) = broadcast::channel(capacity);
    (
        Dispatcher { sender, capacity },
        SnapshotReceiver {
            receiver,
            capacity,
            dropped: 0,
            closed: false,
        },
    )
}

impl Dispatcher {
    /// Fire-and-forget: enqueue and return without waiting on the consumer.
    pub fn dispatch(&self, snapshot: Snapshot) -> DispatchOutcome {
        let full = self.sender.len() >= self.capacity;
        match self.sender.send(snapshot) {
            Err(_) => DispatchOutcome::Closed,
            Ok(_) if full => {
                debug!("renderer behind, oldest pending snapshot overwritten");
                DispatchOutcome::Coalesced
            }
            Ok(_) => DispatchOutcome::Queued,
        }
    }
}

impl SnapshotReceiver {
    /// Wait for the next snapshot. `None` once the dispatcher is dropped and
    /// everything it sent has been received.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Snapshot> {
        loop {
            match self.receiver.try_recv() {
                Ok(snapshot) => return Some(snapshot),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Closed) => {
                    self.closed = true;
                    return None;
                }
                Err(TryRecvError::Empty) => return None,
            }
        }
    }

    /// Snapshots waiting to be received, never more than the capacity.
    pub fn pending(&self) -> usize {
        self.receiver.len().min(self.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once a receive has observed the dispatcher gone with nothing left.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Snapshots discarded because the consumer fell behind. Counted as the
    /// receiver catches up past them.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn record_lag(&mut self, skipped: u64) {
        self.dropped += skipped;
        debug!(
            skipped,
            dropped_total = self.dropped,
            "renderer lagged, skipped to oldest retained snapshot"
        );
    }
}

thread_local! {
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is inside [`deliver`]. A panic hook uses this
/// to leave the terminal alone for panics that `deliver` recovers from.
pub fn in_delivery() -> bool {
    DELIVERING.with(Cell::get)
}

/// Clears the delivery flag on every exit path, unwinding included.
struct DeliveryGuard;

impl DeliveryGuard {
    fn enter() -> Self {
        DELIVERING.with(|flag| flag.set(true));
        DeliveryGuard
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        DELIVERING.with(|flag| flag.set(false));
    }
}

/// Hand one snapshot to the renderer, containing a panic so a broken
/// renderer cannot take the presentation loop down with it.
pub fn deliver<R: Renderer + ?Sized>(
    renderer: &mut R,
    snapshot: Snapshot,
) -> Result<(), RenderDeliveryError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let _guard = DeliveryGuard::enter();
        renderer.on_snapshot(snapshot);
    }));
    outcome.map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        error!(%message, "snapshot delivery failed");
        RenderDeliveryError { message }
    })
}
