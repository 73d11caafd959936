//! Status events for the indicator driver.
//!
//! Every connectivity or traffic transition emits a [`StatusEvent`] through
//! the [`super::StatusBus`]. The gateway never drives indicator hardware
//! itself; an external consumer renders these events.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ClientId;

/// Status transition emitted by the control plane.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// A WiFi join attempt started.
    WifiConnecting {
        /// Network being joined.
        ssid: String,
        /// Signal strength observed in the scan.
        signal_strength: i32,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An address was acquired.
    WifiConnected {
        /// Joined network.
        ssid: String,
        /// Acquired address, if the driver reported one.
        address: Option<String>,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The join gave up (no candidate visible or retries exhausted).
    WifiFailed {
        /// Human-readable reason.
        reason: String,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An established link was lost.
    WifiLost {
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The command server is accepting clients.
    ServerListening {
        /// Bound address.
        addr: SocketAddr,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The command server stopped for good.
    ServerDown {
        /// Human-readable reason.
        reason: String,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A client was admitted to a slot.
    ClientConnected {
        /// Client identifier.
        client_id: ClientId,
        /// Slot index.
        slot: usize,
        /// Remote address.
        peer: SocketAddr,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A client was refused because every slot is taken.
    ClientRejected {
        /// Remote address.
        peer: SocketAddr,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A client left and its slot was released.
    ClientDisconnected {
        /// Client identifier.
        client_id: ClientId,
        /// Released slot index.
        slot: usize,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A command was accepted and handed to the serial link.
    CommandReceived {
        /// Sending client.
        client_id: ClientId,
        /// Command verb.
        verb: &'static str,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A telemetry frame was broadcast.
    TelemetrySent {
        /// Clients the frame reached.
        clients: usize,
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A telemetry frame was dropped because the link was down.
    TelemetryDropped {
        /// Event timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl StatusEvent {
    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::WifiConnecting { .. } => "wifi_connecting",
            Self::WifiConnected { .. } => "wifi_connected",
            Self::WifiFailed { .. } => "wifi_failed",
            Self::WifiLost { .. } => "wifi_lost",
            Self::ServerListening { .. } => "server_listening",
            Self::ServerDown { .. } => "server_down",
            Self::ClientConnected { .. } => "client_connected",
            Self::ClientRejected { .. } => "client_rejected",
            Self::ClientDisconnected { .. } => "client_disconnected",
            Self::CommandReceived { .. } => "command_received",
            Self::TelemetrySent { .. } => "telemetry_sent",
            Self::TelemetryDropped { .. } => "telemetry_dropped",
        }
    }
}
