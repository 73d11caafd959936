//! Serial bridge to the motor controller.
//!
//! Outbound, command records are written fire-and-forget through a
//! [`SerialSink`]. Inbound, fixed-size snapshot frames are decoded and
//! offered to a bounded queue drained by the telemetry publisher.

use std::fmt;

use crate::domain::CommandRecord;

pub mod ingest;
pub mod writer;

pub use ingest::{SnapshotSender, decode_snapshot, frame_len, run_ingestion, snapshot_queue};
pub use writer::SerialWriter;

/// Fire-and-forget sink for command records.
///
/// Implementations must not block: no acknowledgement is awaited and a
/// record that cannot be queued is dropped.
pub trait SerialSink: Send + Sync + fmt::Debug {
    /// Queues one record for the motor controller.
    fn send(&self, record: CommandRecord);
}
