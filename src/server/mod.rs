//! TCP command server: connection acceptance, per-client readers and the
//! JSON wire messages.
//!
//! Clients send `{"Msg": "<command>"}` envelopes and receive telemetry as
//! newline-terminated `{"type":"data","data":{...}}` frames.

pub mod acceptor;
pub mod messages;
pub mod reader;

pub use acceptor::{Acceptor, AcceptorState};
pub use messages::{ClientEnvelope, ServerMessage, TelemetryData};
pub use reader::{handle_message, run_client};
