//! Wire messages: the client command envelope and the telemetry frame.

use serde::{Deserialize, Serialize};

use crate::domain::{MotorDirection, SensorSnapshot};
use crate::error::GatewayError;

/// Client → server envelope. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    /// Command text, e.g. `"spin R 90"`.
    #[serde(rename = "Msg")]
    pub msg: String,
}

impl ClientEnvelope {
    /// Parses one JSON envelope.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidMessage`] for invalid JSON or when
    /// `Msg` is missing or not a string.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, GatewayError> {
        serde_json::from_slice(bytes).map_err(|e| GatewayError::InvalidMessage(e.to_string()))
    }
}

/// Server → client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A telemetry frame.
    Data(TelemetryData),
}

impl ServerMessage {
    /// Serializes to compact JSON terminated by `\n`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Json`] if serialization fails.
    pub fn to_line(&self) -> Result<Vec<u8>, GatewayError> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// IMU block of a telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuData {
    /// Acceleration, x axis.
    pub accel_x: f32,
    /// Acceleration, y axis.
    pub accel_y: f32,
    /// Acceleration, z axis.
    pub accel_z: f32,
    /// Angular rate, x axis.
    pub gyro_x: f32,
    /// Angular rate, y axis.
    pub gyro_y: f32,
    /// Angular rate, z axis.
    pub gyro_z: f32,
    /// IMU die temperature.
    #[serde(rename = "Temperature")]
    pub temperature: f32,
}

/// One motor entry of a telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MotorData {
    /// Current speed.
    pub speed: f32,
    /// `"CW"` or `"CCW"`.
    pub direction: MotorDirection,
    /// Current draw in amps.
    pub amps: f32,
}

/// Payload of [`ServerMessage::Data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TelemetryData {
    /// WiFi RSSI in dBm.
    pub wifi_signal_strength: i32,
    /// Supply voltage.
    pub voltage: f32,
    /// Board temperature.
    pub temperature: f32,
    /// Inertial block.
    #[serde(rename = "IMUData")]
    pub imu_data: ImuData,
    /// Motors in controller order.
    pub motor: Vec<MotorData>,
}

impl TelemetryData {
    /// Builds the frame payload from a snapshot. A live `signal_strength`
    /// from the WiFi driver takes precedence over the snapshot's own value.
    #[must_use]
    pub fn from_snapshot(snapshot: &SensorSnapshot, signal_strength: Option<i32>) -> Self {
        let imu = &snapshot.imu;
        Self {
            wifi_signal_strength: signal_strength.unwrap_or(snapshot.signal_strength),
            voltage: snapshot.voltage,
            temperature: snapshot.temperature,
            imu_data: ImuData {
                accel_x: imu.accel_x,
                accel_y: imu.accel_y,
                accel_z: imu.accel_z,
                gyro_x: imu.gyro_x,
                gyro_y: imu.gyro_y,
                gyro_z: imu.gyro_z,
                temperature: imu.temperature,
            },
            motor: snapshot
                .motors
                .iter()
                .map(|m| MotorData {
                    speed: m.speed,
                    direction: m.direction,
                    amps: m.amps,
                })
                .collect(),
        }
    }
}
