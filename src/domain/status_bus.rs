//! Fan-out of [`StatusEvent`]s to the status indicator.
//!
//! The acceptor, client readers, WiFi selector and telemetry publisher all
//! report through one [`StatusBus`]. The indicator driver is the main
//! listener. It only cares about the latest state, so a listener that falls
//! behind loses the oldest events rather than slowing a publisher down.

use tokio::sync::broadcast;

use super::StatusEvent;

/// Cloneable handle for publishing and observing status events.
#[derive(Debug, Clone)]
pub struct StatusBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusBus {
    /// Creates a bus keeping up to `capacity` undelivered events per
    /// listener. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Hands `event` to every current listener and returns how many there
    /// were. With nobody listening the event is discarded.
    pub fn publish(&self, event: StatusEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Starts listening. Only events published after this call are seen.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }
}
