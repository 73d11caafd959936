//! # robot-gateway
//!
//! Network control plane for a wheeled robot: joins WiFi, accepts TCP
//! clients that send text commands, forwards those commands to the motor
//! controller over a serial link, and broadcasts sensor telemetry back to
//! every connected client.
//!
//! Motor control itself lives on the controller; this crate only
//! translates and relays.
//!
//! ## Architecture
//!
//! ```text
//! WiFi driver (nmcli)
//!     │
//!     ├── NetworkSelector (network/) ──► Connectivity
//!     │                                       │ gates
//! TCP clients                                 ▼
//!     │
//!     ├── Acceptor (server/) ──► ClientRegistry (domain/)
//!     ├── client readers (server/)
//!     │       └── Command ──► CommandRecord ──► SerialWriter (serial/)
//!     │
//!     ├── TelemetryPublisher (service/) ◄── snapshot queue ◄── ingestion (serial/)
//!     │
//!     └── StatusBus (domain/) ──► indicator
//! ```

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod indicator;
pub mod network;
pub mod serial;
pub mod server;
pub mod service;
