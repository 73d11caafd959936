//! Shared application state handed to the acceptor, every client reader
//! and the telemetry publisher.

use std::sync::Arc;

use tokio::net::tcp::OwnedWriteHalf;

use crate::domain::{ClientRegistry, StatusBus};
use crate::network::Connectivity;
use crate::serial::SerialSink;

/// Handles shared by all control-plane tasks.
///
/// `W` is the write half stored in the client registry; production code
/// uses [`OwnedWriteHalf`], tests use in-memory duplex streams.
#[derive(Debug)]
pub struct AppState<W = OwnedWriteHalf> {
    /// Connected clients.
    pub registry: Arc<ClientRegistry<W>>,
    /// Outbound link to the motor controller.
    pub serial: Arc<dyn SerialSink>,
    /// Status events for the indicator driver.
    pub status: StatusBus,
    /// WiFi connectivity signal.
    pub connectivity: Connectivity,
}

impl<W> AppState<W> {
    /// Bundles the shared handles.
    #[must_use]
    pub fn new(
        registry: Arc<ClientRegistry<W>>,
        serial: Arc<dyn SerialSink>,
        status: StatusBus,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            registry,
            serial,
            status,
            connectivity,
        }
    }
}

impl<W> Clone for AppState<W> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            serial: Arc::clone(&self.serial),
            status: self.status.clone(),
            connectivity: self.connectivity.clone(),
        }
    }
}
