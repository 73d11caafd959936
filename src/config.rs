//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every setting has a default matching
//! the robot's stock firmware build.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::GatewayError;
use crate::network::NetworkCandidate;

/// Largest accepted `MOTOR_COUNT`. Bounds the snapshot frame size.
pub const MAX_MOTOR_COUNT: usize = 16;

/// TCP keep-alive tuning applied to every accepted client socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Idle time before the first probe.
    pub idle: Duration,
    /// Interval between probes.
    pub interval: Duration,
    /// Unanswered probes before the peer is declared dead.
    pub count: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(5),
            interval: Duration::from_secs(5),
            count: 3,
        }
    }
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address the command/telemetry server binds to.
    pub listen_addr: SocketAddr,

    /// Number of client slots in the registry.
    pub client_capacity: usize,

    /// Size of the per-client receive buffer.
    pub read_buffer_size: usize,

    /// Keep-alive settings for accepted sockets.
    pub keepalive: KeepaliveConfig,

    /// Disconnect events tolerated while joining before giving up.
    pub wifi_max_retry: u32,

    /// Candidate networks in priority order. Empty SSIDs are skipped.
    pub wifi_candidates: Vec<NetworkCandidate>,

    /// Wireless interface handed to the host WiFi driver.
    pub wifi_interface: Option<String>,

    /// Number of motor records in each sensor snapshot, at most
    /// [`MAX_MOTOR_COUNT`].
    pub motor_count: usize,

    /// Bound of the snapshot ingestion queue.
    pub snapshot_queue_capacity: usize,

    /// How long the telemetry publisher waits for connectivity.
    pub telemetry_connect_timeout: Duration,

    /// Serial device connected to the motor controller.
    pub serial_device: PathBuf,

    /// Command records buffered ahead of the serial writer.
    pub serial_outbound_capacity: usize,

    /// Capacity of the status-event broadcast bus.
    pub status_bus_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3333)),
            client_capacity: 3,
            read_buffer_size: 256,
            keepalive: KeepaliveConfig::default(),
            wifi_max_retry: 5,
            wifi_candidates: vec![
                NetworkCandidate::new("BananaPiWifi", "BananaPiWifi"),
                NetworkCandidate::new("WPS School", "WPS School"),
            ],
            wifi_interface: None,
            motor_count: 4,
            snapshot_queue_capacity: 5,
            telemetry_connect_timeout: Duration::from_millis(200),
            serial_device: PathBuf::from("/dev/ttyUSB0"),
            serial_outbound_capacity: 32,
            status_bus_capacity: 64,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `LISTEN_ADDR` is set but cannot
    /// be parsed as a [`SocketAddr`], or if `MOTOR_COUNT` is above
    /// [`MAX_MOTOR_COUNT`].
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `LISTEN_ADDR` is present but is
    /// not a valid socket address, or if `MOTOR_COUNT` exceeds
    /// [`MAX_MOTOR_COUNT`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|e| GatewayError::Config(format!("LISTEN_ADDR={raw}: {e}")))?,
            None => defaults.listen_addr,
        };

        let keepalive = KeepaliveConfig {
            idle: Duration::from_secs(parse_key(&lookup, "KEEPALIVE_IDLE_SECS", 5)),
            interval: Duration::from_secs(parse_key(&lookup, "KEEPALIVE_INTERVAL_SECS", 5)),
            count: parse_key(&lookup, "KEEPALIVE_COUNT", defaults.keepalive.count),
        };

        let motor_count = parse_key(&lookup, "MOTOR_COUNT", defaults.motor_count);
        if motor_count > MAX_MOTOR_COUNT {
            return Err(GatewayError::Config(format!(
                "MOTOR_COUNT={motor_count}: at most {MAX_MOTOR_COUNT} motors"
            )));
        }

        let wifi_candidates = [("WIFI_1_SSID", "WIFI_1_PASSWORD"), ("WIFI_2_SSID", "WIFI_2_PASSWORD")]
            .iter()
            .zip(defaults.wifi_candidates.iter())
            .map(|((ssid_key, pass_key), fallback)| NetworkCandidate {
                ssid: lookup(ssid_key).unwrap_or_else(|| fallback.ssid.clone()),
                password: lookup(pass_key).unwrap_or_else(|| fallback.password.clone()),
            })
            .filter(|candidate| !candidate.ssid.is_empty())
            .collect();

        Ok(Self {
            listen_addr,
            client_capacity: parse_key(&lookup, "CLIENT_CAPACITY", defaults.client_capacity),
            read_buffer_size: parse_key(&lookup, "READ_BUFFER_SIZE", defaults.read_buffer_size),
            keepalive,
            wifi_max_retry: parse_key(&lookup, "WIFI_MAX_RETRY", defaults.wifi_max_retry),
            wifi_candidates,
            wifi_interface: lookup("WIFI_INTERFACE").filter(|s| !s.is_empty()),
            motor_count,
            snapshot_queue_capacity: parse_key(
                &lookup,
                "SNAPSHOT_QUEUE_CAPACITY",
                defaults.snapshot_queue_capacity,
            ),
            telemetry_connect_timeout: Duration::from_millis(parse_key(
                &lookup,
                "TELEMETRY_CONNECT_TIMEOUT_MS",
                200,
            )),
            serial_device: lookup("SERIAL_DEVICE")
                .map(PathBuf::from)
                .unwrap_or(defaults.serial_device),
            serial_outbound_capacity: parse_key(
                &lookup,
                "SERIAL_OUTBOUND_CAPACITY",
                defaults.serial_outbound_capacity,
            ),
            status_bus_capacity: parse_key(
                &lookup,
                "STATUS_BUS_CAPACITY",
                defaults.status_bus_capacity,
            ),
        })
    }
}

/// Parses a looked-up value as `T`, returning `default` on missing or
/// invalid values.
fn parse_key<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
