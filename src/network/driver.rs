//! WiFi driver seam.
//!
//! The selector talks to the radio only through [`WifiDriver`], so the
//! same join logic runs against the host's NetworkManager in production
//! and against a scripted driver in tests.

use std::future::Future;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// A statically configured network the robot may join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCandidate {
    /// Network name.
    pub ssid: String,
    /// WPA passphrase.
    pub password: String,
}

impl NetworkCandidate {
    /// Creates a candidate from a name and passphrase.
    #[must_use]
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }
}

/// One access point seen in a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    /// Network name.
    pub ssid: String,
    /// Hardware address, when the driver reports it.
    pub bssid: Option<String>,
    /// Signal strength in dBm.
    pub signal_strength: i32,
    /// Radio channel, when known.
    pub channel: Option<u8>,
}

/// What happened after a connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Associated and an address was acquired.
    GotAddress(Option<IpAddr>),
    /// The association attempt ended without an address.
    Disconnected {
        /// Driver-provided reason.
        reason: String,
    },
}

/// Radio operations needed by the network selector.
pub trait WifiDriver: Send + Sync {
    /// Performs one blocking scan and returns every visible access point.
    fn scan(&self) -> impl Future<Output = Result<Vec<AccessPoint>, GatewayError>> + Send;

    /// Applies `ap` and `password` and reports the next link event.
    fn connect(
        &self,
        ap: &AccessPoint,
        password: &str,
    ) -> impl Future<Output = Result<LinkEvent, GatewayError>> + Send;

    /// Live signal strength of the joined network, in dBm.
    fn signal_strength(&self) -> impl Future<Output = Option<i32>> + Send;

    /// Resolves once an established link goes down.
    fn wait_link_loss(&self) -> impl Future<Output = ()> + Send;
}
