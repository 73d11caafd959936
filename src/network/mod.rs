//! Network layer: WiFi selection and the connectivity signal.
//!
//! The [`NetworkSelector`] scans once, ranks the configured candidates by
//! signal strength and joins the best one. Its outcome is published through
//! [`Connectivity`], which gates the command server and is re-checked by
//! the telemetry publisher before every broadcast.

pub mod connectivity;
pub mod driver;
pub mod nmcli;
pub mod selector;

pub use connectivity::{Connectivity, ConnectivityState};
pub use driver::{AccessPoint, LinkEvent, NetworkCandidate, WifiDriver};
pub use nmcli::NmcliDriver;
pub use selector::{NetworkSelector, select_network};
