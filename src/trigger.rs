//! Resync triggers and the stop signal.
//!
//! Triggers go through a queue of capacity one: while a resync is pending,
//! further triggers are dropped, so a burst of upstream events produces at
//! most one extra cycle.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

/// Creates a coalescing trigger queue.
#[must_use]
pub fn trigger_channel() -> (ResyncTrigger, TriggerQueue) {
    let (tx, rx) = mpsc::channel(1);
    (ResyncTrigger { tx }, TriggerQueue { rx })
}

/// Creates a stop handle and the signal the engine waits on.
#[must_use]
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

/// Sending half of the trigger queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ResyncTrigger {
    tx: mpsc::Sender<()>,
}

impl ResyncTrigger {
    /// Requests a resync.
    ///
    /// Returns `false` if one was already pending (the request is coalesced)
    /// or the engine has shut down.
    pub fn fire(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::trace!("Resync already pending, coalescing trigger");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    /// `true` once the engine has stopped consuming triggers.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of the trigger queue, owned by the engine.
#[derive(Debug)]
pub struct TriggerQueue {
    rx: mpsc::Receiver<()>,
}

impl TriggerQueue {
    /// Waits for the next trigger. `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// Stops the engine loop. Cheap to clone; stopping is permanent.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Signals the engine to stop.
    ///
    /// Only the first call has an effect; it returns `true`. Later calls
    /// return `false`.
    pub fn stop(&self) -> bool {
        !self.tx.send_replace(true)
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of [`StopHandle`].
#[derive(Debug)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Resolves once stop was requested or every [`StopHandle`] was dropped.
    pub async fn stopped(&mut self) {
        // An error means all handles are gone and nobody can stop us later.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}
