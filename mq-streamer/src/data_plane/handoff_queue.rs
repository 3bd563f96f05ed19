//! Bounded hand-off queue between the per-destination receive loops and the output loop.

use crate::envelope::MessageEnvelope;
use crate::error::StreamerError;
use crate::runtime::worker_runtime::wait_for_shutdown;
use tokio::sync::{mpsc, watch, Mutex};

/// Fixed-capacity FIFO shared by every consumer of one stage.
///
/// `put` waits for a free slot, which is how a slow output loop slows down the brokers.
/// `close` releases every waiting `put` and `take`.
pub(crate) struct HandoffQueue {
    capacity: usize,
    sender: mpsc::Sender<MessageEnvelope>,
    receiver: Mutex<mpsc::Receiver<MessageEnvelope>>,
    closed_tx: watch::Sender<bool>,
}

impl HandoffQueue {
    /// Creates a queue holding at most `capacity` messages (at least one).
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let (closed_tx, _) = watch::channel(false);
        Self {
            capacity,
            sender,
            receiver: Mutex::new(receiver),
            closed_tx,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued messages.
    pub(crate) fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    /// Appends a message, waiting while the queue is full.
    pub(crate) async fn put(&self, message: MessageEnvelope) -> Result<(), StreamerError> {
        let closed = self.closed_tx.subscribe();
        if *closed.borrow() {
            return Err(StreamerError::StageClosed);
        }

        tokio::select! {
            permit = self.sender.reserve() => {
                let permit = permit.map_err(|_| StreamerError::StageClosed)?;
                permit.send(message);
                Ok(())
            }
            _ = wait_for_shutdown(closed) => Err(StreamerError::StageClosed),
        }
    }

    /// Removes the oldest message, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed.
    pub(crate) async fn take(&self) -> Option<MessageEnvelope> {
        let closed = self.closed_tx.subscribe();
        if *closed.borrow() {
            return None;
        }

        let mut receiver = self.receiver.lock().await;
        tokio::select! {
            message = receiver.recv() => message,
            _ = wait_for_shutdown(closed) => None,
        }
    }

    /// Removes the oldest message without waiting.
    ///
    /// Returns `None` while a `take` holds the receiving end.
    pub(crate) async fn poll(&self) -> Option<MessageEnvelope> {
        if self.is_closed() {
            return None;
        }
        self.receiver.try_lock().ok()?.try_recv().ok()
    }

    /// Closes the queue. Messages still queued are never handed out.
    pub(crate) fn close(&self) {
        self.closed_tx.send_replace(true);
    }
}
