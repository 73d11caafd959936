//! Inbound snapshot frames and the bounded ingestion queue.
//!
//! The motor controller streams fixed-size little-endian frames:
//!
//! ```text
//! i32 signal strength | f32 voltage | f32 temperature
//! f32 accel x y z | f32 gyro x y z | f32 imu temperature
//! per motor: f32 speed | u32 direction (0 = CW) | f32 amps
//! ```
//!
//! The queue between ingestion and the telemetry publisher is bounded and
//! never blocks the producer: when it is full the newest snapshot is
//! dropped and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::{ImuSample, MotorDirection, MotorSample, SensorSnapshot};
use crate::error::GatewayError;

const HEADER_LEN: usize = 40;
const MOTOR_LEN: usize = 12;

/// Size of one frame carrying `motor_count` motor records. Saturates
/// instead of overflowing.
#[must_use]
pub const fn frame_len(motor_count: usize) -> usize {
    HEADER_LEN.saturating_add(MOTOR_LEN.saturating_mul(motor_count))
}

struct LeCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl LeCursor<'_> {
    fn word(&mut self) -> [u8; 4] {
        let word = self
            .bytes
            .get(self.pos..self.pos + 4)
            .and_then(|w| w.try_into().ok())
            .unwrap_or([0; 4]);
        self.pos += 4;
        word
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.word())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.word())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.word())
    }
}

/// Decodes one snapshot frame.
///
/// # Errors
///
/// Returns [`GatewayError::SnapshotFrame`] if `bytes` is shorter than
/// [`frame_len`]`(motor_count)`.
pub fn decode_snapshot(bytes: &[u8], motor_count: usize) -> Result<SensorSnapshot, GatewayError> {
    let needed = frame_len(motor_count);
    if bytes.len() < needed {
        return Err(GatewayError::SnapshotFrame {
            needed,
            got: bytes.len(),
        });
    }

    let mut cur = LeCursor { bytes, pos: 0 };
    let signal_strength = cur.i32();
    let voltage = cur.f32();
    let temperature = cur.f32();
    let imu = ImuSample {
        accel_x: cur.f32(),
        accel_y: cur.f32(),
        accel_z: cur.f32(),
        gyro_x: cur.f32(),
        gyro_y: cur.f32(),
        gyro_z: cur.f32(),
        temperature: cur.f32(),
    };
    let motors = (0..motor_count)
        .map(|_| MotorSample {
            speed: cur.f32(),
            direction: MotorDirection::from_raw(cur.u32()),
            amps: cur.f32(),
        })
        .collect();

    Ok(SensorSnapshot {
        signal_strength,
        voltage,
        temperature,
        imu,
        motors,
    })
}

/// Producer side of the snapshot queue.
#[derive(Debug, Clone)]
pub struct SnapshotSender {
    tx: mpsc::Sender<SensorSnapshot>,
    dropped: Arc<AtomicU64>,
}

/// Creates the bounded snapshot queue.
#[must_use]
pub fn snapshot_queue(capacity: usize) -> (SnapshotSender, mpsc::Receiver<SensorSnapshot>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        SnapshotSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}

impl SnapshotSender {
    /// Offers a snapshot without waiting. Returns `false` if it was
    /// dropped because the queue is full or the consumer is gone.
    pub fn offer(&self, snapshot: SensorSnapshot) -> bool {
        match self.tx.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(dropped_total = total, "snapshot queue full, dropping sensor data");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Snapshots dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Reads frames from `port` until end of stream, offering each decoded
/// snapshot to `sender`. Returns the number of frames read.
///
/// # Errors
///
/// Returns [`GatewayError::Io`] on a read error other than end of stream.
pub async fn run_ingestion<R>(
    mut port: R,
    motor_count: usize,
    sender: SnapshotSender,
) -> Result<u64, GatewayError>
where
    R: AsyncRead + Unpin,
{
    let mut frame = vec![0u8; frame_len(motor_count)];
    let mut frames = 0u64;
    loop {
        match port.read_exact(&mut frame).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::info!(frames, "serial stream ended");
                return Ok(frames);
            }
            Err(e) => return Err(e.into()),
        }
        frames += 1;
        let snapshot = decode_snapshot(&frame, motor_count)?;
        let _ = sender.offer(snapshot);
    }
}
