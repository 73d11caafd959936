//! Telemetry publisher: snapshot queue → JSON frame → every client.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

use crate::app_state::AppState;
use crate::domain::{BroadcastReport, ClientRegistry, SensorSnapshot, StatusBus, StatusEvent};
use crate::network::{Connectivity, ConnectivityState};
use crate::server::{ServerMessage, TelemetryData};

/// What happened to one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The frame was written to the registered clients.
    Sent(BroadcastReport),
    /// The link was not up within the connect timeout.
    Dropped(ConnectivityState),
    /// The frame could not be serialized.
    EncodeFailed,
}

/// Broadcasts sensor snapshots to connected clients.
///
/// Each snapshot is consumed exactly once, whether it was sent or dropped.
#[derive(Debug)]
pub struct TelemetryPublisher<W> {
    registry: Arc<ClientRegistry<W>>,
    connectivity: Connectivity,
    status: StatusBus,
    connect_timeout: Duration,
}

impl<W> TelemetryPublisher<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a publisher over the shared state.
    #[must_use]
    pub fn new(state: &AppState<W>, connect_timeout: Duration) -> Self {
        Self {
            registry: Arc::clone(&state.registry),
            connectivity: state.connectivity.clone(),
            status: state.status.clone(),
            connect_timeout,
        }
    }

    /// Publishes one snapshot.
    pub async fn publish(&self, snapshot: SensorSnapshot) -> PublishOutcome {
        let link = self.connectivity.wait_settled_for(self.connect_timeout).await;
        if link != ConnectivityState::Connected {
            tracing::warn!(state = %link, "wifi not ready, dropping telemetry");
            let _ = self.status.publish(StatusEvent::TelemetryDropped { timestamp: Utc::now() });
            return PublishOutcome::Dropped(link);
        }

        let data = TelemetryData::from_snapshot(&snapshot, self.connectivity.signal_strength());
        let line = match ServerMessage::Data(data).to_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(
                    code = e.error_code(),
                    class = ?e.class(),
                    error = %e,
                    "telemetry encode failed"
                );
                return PublishOutcome::EncodeFailed;
            }
        };

        let report = self.registry.broadcast(&line).await;
        if report.attempted > 0 {
            tracing::trace!(
                attempted = report.attempted,
                delivered = report.delivered,
                "telemetry broadcast"
            );
            let _ = self.status.publish(StatusEvent::TelemetrySent {
                clients: report.delivered,
                timestamp: Utc::now(),
            });
        }
        PublishOutcome::Sent(report)
    }

    /// Drains `snapshots` until every producer is gone. Returns the number
    /// of frames that reached at least one client.
    pub async fn run(self, mut snapshots: mpsc::Receiver<SensorSnapshot>) -> u64 {
        let mut sent = 0u64;
        while let Some(snapshot) = snapshots.recv().await {
            if let PublishOutcome::Sent(report) = self.publish(snapshot).await
                && report.delivered > 0
            {
                sent += 1;
            }
        }
        tracing::info!(sent, "snapshot queue closed, telemetry publisher stopping");
        sent
    }
}
