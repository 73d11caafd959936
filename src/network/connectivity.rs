//! Observable connectivity state.
//!
//! [`Connectivity`] is the single source of truth for whether the robot is
//! on the network. It is backed by a [`tokio::sync::watch`] channel so the
//! acceptor can await the first `Connected` and the telemetry publisher can
//! wait for a settled state with a deadline.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

/// WiFi connectivity of the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    /// No join attempted yet, or the link was lost.
    #[default]
    Disconnected,
    /// Scanning or waiting for an address.
    Connecting,
    /// Address acquired.
    Connected,
    /// Join gave up. Terminal for the session.
    Failed,
}

impl ConnectivityState {
    /// `Connected` or `Failed`: no further progress without outside help.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Connected | Self::Failed)
    }

    /// Returns the state as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const NO_SIGNAL: i32 = i32::MIN;

/// Shared handle to the connectivity state and live signal strength.
///
/// Cheap to clone; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct Connectivity {
    state: Arc<watch::Sender<ConnectivityState>>,
    signal: Arc<AtomicI32>,
}

impl Connectivity {
    /// Creates a handle in the `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectivityState::Disconnected);
        Self {
            state: Arc::new(state),
            signal: Arc::new(AtomicI32::new(NO_SIGNAL)),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    /// Replaces the state, returning the previous one.
    pub fn set(&self, next: ConnectivityState) -> ConnectivityState {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(from = %prev, to = %next, "connectivity changed");
        }
        prev
    }

    /// Creates a receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    /// Waits until the state is `Connected` or `Failed` and returns it.
    pub async fn wait_settled(&self) -> ConnectivityState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| s.is_settled()).await {
            Ok(state) => *state,
            Err(_) => ConnectivityState::Failed,
        }
    }

    /// Like [`Self::wait_settled`] but gives up after `timeout`, returning
    /// whatever the state is at that point.
    pub async fn wait_settled_for(&self, timeout: Duration) -> ConnectivityState {
        match tokio::time::timeout(timeout, self.wait_settled()).await {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    /// Records the live signal strength (dBm); `None` clears it.
    pub fn set_signal_strength(&self, rssi: Option<i32>) {
        self.signal.store(rssi.unwrap_or(NO_SIGNAL), Ordering::Relaxed);
    }

    /// Last known signal strength of the joined network.
    #[must_use]
    pub fn signal_strength(&self) -> Option<i32> {
        match self.signal.load(Ordering::Relaxed) {
            NO_SIGNAL => None,
            rssi => Some(rssi),
        }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let c = Connectivity::new();
        assert_eq!(c.state(), ConnectivityState::Disconnected);
        assert_eq!(c.signal_strength(), None);
    }

    #[test]
    fn set_returns_previous() {
        let c = Connectivity::new();
        assert_eq!(c.set(ConnectivityState::Connecting), ConnectivityState::Disconnected);
        assert_eq!(c.set(ConnectivityState::Connected), ConnectivityState::Connecting);
        assert_eq!(c.state(), ConnectivityState::Connected);
    }

    #[tokio::test]
    async fn wait_settled_wakes_on_connect() {
        let c = Connectivity::new();
        c.set(ConnectivityState::Connecting);
        let waiter = {
            let c = c.clone();
            tokio::spawn(async move { c.wait_settled().await })
        };
        tokio::task::yield_now().await;
        c.set(ConnectivityState::Connected);
        assert!(matches!(waiter.await, Ok(ConnectivityState::Connected)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_settled_for_times_out() {
        let c = Connectivity::new();
        let state = c.wait_settled_for(Duration::from_millis(200)).await;
        assert_eq!(state, ConnectivityState::Disconnected);
    }

    #[tokio::test]
    async fn failed_counts_as_settled() {
        let c = Connectivity::new();
        c.set(ConnectivityState::Failed);
        let state = c.wait_settled_for(Duration::from_millis(50)).await;
        assert_eq!(state, ConnectivityState::Failed);
    }

    #[test]
    fn signal_strength_round_trip() {
        let c = Connectivity::new();
        c.set_signal_strength(Some(-61));
        assert_eq!(c.clone().signal_strength(), Some(-61));
        c.set_signal_strength(None);
        assert_eq!(c.signal_strength(), None);
    }
}
