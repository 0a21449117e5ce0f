//! # Wiring: Bounded Typed Channels
//!
//! spec.md §5: "bounded, typed queues (a 'wiring' mesh)". Each edge between
//! two components is a single-purpose channel, not a shared topic bus —
//! the payload type is fixed at construction, so misrouted messages are a
//! compile error rather than a runtime topic mismatch.

use thiserror::Error;
use tokio::sync::mpsc;

/// A bounded, typed, named channel connecting two components.
pub struct Wire<T> {
    name: &'static str,
    capacity: usize,
    sender: mpsc::Sender<T>,
}

impl<T> Clone for Wire<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            capacity: self.capacity,
            sender: self.sender.clone(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("wire '{name}' is full (capacity {capacity})")]
    Full { name: &'static str, capacity: usize },
    #[error("wire '{name}' has no receiver")]
    Closed { name: &'static str },
}

impl<T> Wire<T> {
    /// Builds a named wire and returns the sending half plus the raw
    /// receiver for the owning component's [`super::scheduler::Pump`].
    pub fn new(name: &'static str, capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                name,
                capacity,
                sender,
            },
            receiver,
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Non-blocking send. A full wire is backpressure, not an error to
    /// retry silently — callers map this to the component's own protocol
    /// error (e.g. gossip maps a full wire to `ABORT(ProtocolViolation)`,
    /// spec.md §4.5).
    pub fn try_send(&self, item: T) -> Result<(), WireError> {
        self.sender.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => WireError::Full {
                name: self.name,
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => WireError::Closed { name: self.name },
        })
    }

    /// Blocking send, for producers on a scheduler that may suspend
    /// (spec.md §5 "Suspension points").
    pub async fn send(&self, item: T) -> Result<(), WireError> {
        self.sender
            .send(item)
            .await
            .map_err(|_| WireError::Closed { name: self.name })
    }
}
