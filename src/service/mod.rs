//! Service layer: telemetry fan-out.
//!
//! [`TelemetryPublisher`] drains the snapshot queue, encodes each snapshot
//! as a [`crate::server::ServerMessage`] and broadcasts it to every
//! connected client, emitting status events through the
//! [`super::domain::StatusBus`].

pub mod telemetry;

pub use telemetry::{PublishOutcome, TelemetryPublisher};
