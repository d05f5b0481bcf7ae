//! Category locks: one FIFO worker per swap kind, realized as a bounded
//! mpsc channel rather than a pending-queue-plus-mutex. Keeping three
//! separate channels instead of one keyed by kind keeps the kinds'
//! locks independent of each other without a shared map of mutexes.

use crate::error::{NurseryError, NurseryResult};
use crate::models::SwapKind;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Sending half of a category lock. Cloned freely by watchers; `try_dispatch`
/// never blocks the caller, so a watcher can never stall behind a busy
/// nursery.
#[derive(Clone)]
pub struct EventSink<E> {
    kind: SwapKind,
    sender: mpsc::Sender<E>,
}

impl<E> EventSink<E> {
    pub fn kind(&self) -> SwapKind {
        self.kind
    }

    /// Enqueues `event` for this kind's worker. Returns
    /// `NurseryError::Internal` if the queue is saturated (`max_pending_events`)
    /// or the worker has already shut down.
    pub fn try_dispatch(&self, event: E) -> NurseryResult<()> {
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind = ?self.kind, "category lock queue saturated, dropping event");
                Err(NurseryError::internal(format!(
                    "{:?} event queue is full",
                    self.kind
                )))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NurseryError::internal(format!(
                "{:?} event worker has shut down",
                self.kind
            ))),
        }
    }
}

/// One bounded channel per `SwapKind`, each drained sequentially so events
/// for the same kind are always processed in arrival order: a category
/// lock serializes all handling for its kind.
pub struct CategoryLocks<E> {
    receivers: HashMap<SwapKind, mpsc::Receiver<E>>,
    senders: HashMap<SwapKind, EventSink<E>>,
}

impl<E> CategoryLocks<E> {
    pub fn new(capacity: usize) -> Self {
        let mut receivers = HashMap::new();
        let mut senders = HashMap::new();
        for kind in [
            SwapKind::Submarine,
            SwapKind::ReverseSubmarine,
            SwapKind::Chain,
        ] {
            let (tx, rx) = mpsc::channel(capacity);
            receivers.insert(kind, rx);
            senders.insert(kind, EventSink { kind, sender: tx });
        }
        Self { receivers, senders }
    }

    pub fn sink(&self, kind: SwapKind) -> EventSink<E> {
        self.senders
            .get(&kind)
            .cloned()
            .expect("every SwapKind has a channel")
    }

    /// Takes ownership of the receiving half for `kind`'s worker loop. Panics
    /// if called twice for the same kind: each category lock has exactly one
    /// consumer task for the life of the nursery.
    pub fn take_receiver(&mut self, kind: SwapKind) -> mpsc::Receiver<E> {
        self.receivers
            .remove(&kind)
            .unwrap_or_else(|| panic!("{:?} receiver already taken", kind))
    }
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            sender: self.sender.clone(),
        }
    }
}

/// Drains `rx` one event at a time, calling `handle` and logging (not
/// failing the loop on) any error it returns, since a single bad event must
/// never take down the category's worker: errors fail the individual
/// swap transition, not the loop.
pub async fn run_category_loop<E, F, Fut>(kind: SwapKind, mut rx: mpsc::Receiver<E>, mut handle: F)
where
    F: FnMut(E) -> Fut,
    Fut: std::future::Future<Output = NurseryResult<()>>,
{
    debug!(?kind, "category lock worker started");
    while let Some(event) = rx.recv().await {
        if let Err(err) = handle(event).await {
            warn!(?kind, error = %err, "event handling failed");
        }
    }
    debug!(?kind, "category lock worker exiting, channel closed");
}
