//! Domain layer: commands, snapshots, the client registry and status events.
//!
//! This module holds the transport-independent model of the control plane:
//! the text command translator and its binary record, sensor snapshots,
//! the fixed-capacity client registry, and the status bus consumed by the
//! indicator driver.

pub mod client_id;
pub mod client_registry;
pub mod command;
pub mod record;
pub mod snapshot;
pub mod status_bus;
pub mod status_event;

pub use client_id::ClientId;
pub use client_registry::{Admission, BroadcastReport, ClientRegistry, Slot};
pub use command::Command;
pub use record::CommandRecord;
pub use snapshot::{ImuSample, MotorDirection, MotorSample, SensorSnapshot};
pub use status_bus::StatusBus;
pub use status_event::StatusEvent;
