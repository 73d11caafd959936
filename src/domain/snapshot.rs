//! Sensor snapshots produced by the motor controller.

use serde::{Deserialize, Serialize};

/// Rotation direction reported for a motor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorDirection {
    /// Clockwise.
    #[default]
    #[serde(rename = "CW")]
    Cw,
    /// Counter-clockwise.
    #[serde(rename = "CCW")]
    Ccw,
}

impl MotorDirection {
    /// Decodes the controller's raw direction value (0 = CW).
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        if raw == 0 { Self::Cw } else { Self::Ccw }
    }
}

/// One IMU sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuSample {
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
    pub temperature: f32,
}

/// State of a single motor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotorSample {
    /// Current speed.
    pub speed: f32,
    /// Rotation direction.
    pub direction: MotorDirection,
    /// Current draw in amps.
    pub amps: f32,
}

/// One immutable sample of sensor and motor state.
///
/// Produced by serial ingestion and consumed exactly once by the
/// telemetry publisher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSnapshot {
    /// WiFi signal strength (RSSI, dBm) as known to the producer.
    pub signal_strength: i32,
    /// Supply voltage.
    pub voltage: f32,
    /// Board temperature.
    pub temperature: f32,
    /// Inertial measurement block.
    pub imu: ImuSample,
    /// Per-motor records, in motor order.
    pub motors: Vec<MotorSample>,
}
