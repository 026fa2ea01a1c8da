//! Bounded hand-off between update callbacks and the writer
//!
//! Enqueue never blocks. A full queue means updates are arriving faster
//! than they can be written and one would be lost, which is a fatal local
//! fault: the fault handler runs (by default it terminates the process).

use crate::hook::HookContext;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Pending events shared by all subscriptions on a host
pub const DELIVERY_QUEUE_CAPACITY: usize = 1024;

/// Exit code used when the queue saturates
pub const SATURATION_EXIT_CODE: i32 = 70;

/// One configuration update waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEvent {
    pub output: PathBuf,
    pub payload: Vec<u8>,
    pub hook: Option<PathBuf>,
    pub context: HookContext,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("delivery queue saturated ({capacity} pending events)")]
    Saturated { capacity: usize },

    #[error("delivery queue closed")]
    Closed,
}

/// Invoked when an event cannot be queued because the queue is full
pub type FaultHandler = Arc<dyn Fn(&QueueError) + Send + Sync>;

/// Fault handler that terminates the process
pub fn abort_on_saturation() -> FaultHandler {
    Arc::new(|err: &QueueError| {
        error!(error = %err, "configuration update would be lost, terminating");
        std::process::exit(SATURATION_EXIT_CODE);
    })
}

/// Producer side, cloned into every update callback
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::Sender<DeliveryEvent>,
    capacity: usize,
    closed: CancellationToken,
    on_fault: FaultHandler,
}

/// Consumer side, owned by the writer
pub struct DeliveryReceiver {
    pub(crate) rx: mpsc::Receiver<DeliveryEvent>,
    pub(crate) closed: CancellationToken,
}

/// Create a queue holding at most `capacity` pending events
pub fn delivery_queue(
    capacity: usize,
    on_fault: FaultHandler,
) -> (DeliveryQueue, DeliveryReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let closed = CancellationToken::new();
    (
        DeliveryQueue {
            tx,
            capacity,
            closed: closed.clone(),
            on_fault,
        },
        DeliveryReceiver { rx, closed },
    )
}

impl DeliveryQueue {
    pub fn enqueue(&self, event: DeliveryEvent) -> Result<(), QueueError> {
        if self.closed.is_cancelled() {
            return Err(QueueError::Closed);
        }

        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                let err = QueueError::Saturated {
                    capacity: self.capacity,
                };
                error!(
                    output = %event.output.display(),
                    group = %event.context.group,
                    key = %event.context.key,
                    capacity = self.capacity,
                    "delivery queue saturated"
                );
                (self.on_fault)(&err);
                Err(err)
            }
            Err(TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Events queued but not yet taken by the writer
    pub fn pending(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop accepting events; already queued events are still delivered
    pub fn close(&self) {
        self.closed.cancel();
    }
}
