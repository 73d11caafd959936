//! Gateway error types with failure-class mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to an [`ErrorClass`] that decides how far the failure may travel:
//! transient faults stay inside the component that saw them, while
//! subsystem-fatal faults take the networking half down and must reach the
//! operator.

use std::net::SocketAddr;

use crate::network::ConnectivityState;

/// How a failure is handled by the rest of the system.
///
/// | Class               | Handling                                        |
/// |---------------------|-------------------------------------------------|
/// | `Transient`         | logged, handled locally, never propagated       |
/// | `ResourceExhausted` | newest unit of work dropped, no backlog         |
/// | `SubsystemFatal`    | acceptor terminates, serial bridge keeps going  |
/// | `Connectivity`      | state left at `Failed`, dependants observe it   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input or a single client's I/O failure.
    Transient,
    /// A bounded resource (registry, queue) is full.
    ResourceExhausted,
    /// The networking half of the process is down.
    SubsystemFatal,
    /// WiFi could not be joined.
    Connectivity,
}

/// Server-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category           |
/// |-----------|--------------------|
/// | 1000–1999 | Transient / input  |
/// | 2000–2999 | Resource exhausted |
/// | 3000–3999 | Subsystem fatal    |
/// | 4000–4999 | Connectivity       |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Client payload was not a usable command envelope.
    #[error("invalid client message: {0}")]
    InvalidMessage(String),

    /// Serial snapshot frame had the wrong size.
    #[error("snapshot frame too short: needed {needed} bytes, got {got}")]
    SnapshotFrame {
        /// Bytes required for a complete frame.
        needed: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// Every client slot is taken.
    #[error("client registry full ({capacity} slots)")]
    RegistryFull {
        /// Fixed registry capacity.
        capacity: usize,
    },

    /// The listening socket could not be bound.
    #[error("unable to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The listening socket failed while accepting.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The server was asked to start but the network never came up.
    #[error("network unavailable (state: {0})")]
    NetworkUnavailable(ConnectivityState),

    /// WiFi driver reported an error.
    #[error("wifi driver error: {0}")]
    Wifi(String),

    /// Generic I/O error (serial device, sockets).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidMessage(_) => 1001,
            Self::SnapshotFrame { .. } => 1002,
            Self::Json(_) => 1003,
            Self::Io(_) => 1004,
            Self::RegistryFull { .. } => 2001,
            Self::Config(_) => 3001,
            Self::Bind { .. } => 3002,
            Self::Accept(_) => 3003,
            Self::NetworkUnavailable(_) => 4001,
            Self::Wifi(_) => 4002,
        }
    }

    /// Returns the failure class for this variant.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidMessage(_) | Self::SnapshotFrame { .. } | Self::Json(_) | Self::Io(_) => {
                ErrorClass::Transient
            }
            Self::RegistryFull { .. } => ErrorClass::ResourceExhausted,
            Self::Config(_) | Self::Bind { .. } | Self::Accept(_) => ErrorClass::SubsystemFatal,
            Self::NetworkUnavailable(_) | Self::Wifi(_) => ErrorClass::Connectivity,
        }
    }
}
