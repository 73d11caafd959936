//! Fixed-size binary command record sent to the motor controller.
//!
//! The layout matches the controller's little-endian, 4-byte-aligned
//! command struct:
//!
//! ```text
//! offset  0   u32  verb tag (move=0, spin=1, motor=2, unknown=3)
//! offset  4   ..   32-byte parameter block, zero padded
//!
//! move:   stop i32 @4 | mode u8 @8 | direction [u8;16] @9 | value i32 @28 | time i32 @32
//! spin:   lr u8 @4    | angle i32 @8
//! motor:  motor_id i32 @4 | dir u8 @8 | angle i32 @12
//! ```

use super::command::Command;

/// Total encoded size of a command record.
pub const RECORD_LEN: usize = 36;

const TAG_MOVE: u32 = 0;
const TAG_SPIN: u32 = 1;
const TAG_MOTOR: u32 = 2;
const TAG_UNKNOWN: u32 = 3;

/// A command encoded for the serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRecord([u8; RECORD_LEN]);

impl CommandRecord {
    /// Encodes a command. Fields a verb does not use stay zero.
    #[must_use]
    pub fn encode(command: &Command) -> Self {
        let mut buf = [0u8; RECORD_LEN];
        match command {
            Command::Move(p) => {
                put(&mut buf, 0, &TAG_MOVE.to_le_bytes());
                put(&mut buf, 4, &p.stop.to_le_bytes());
                put(&mut buf, 8, &[char_byte(p.mode)]);
                // 16-byte field; the last byte always stays NUL
                let dir = p.direction.as_bytes();
                put(&mut buf, 9, dir.get(..dir.len().min(15)).unwrap_or_default());
                put(&mut buf, 28, &p.value.to_le_bytes());
                put(&mut buf, 32, &p.time.to_le_bytes());
            }
            Command::Spin(p) => {
                put(&mut buf, 0, &TAG_SPIN.to_le_bytes());
                put(&mut buf, 4, &[char_byte(p.lr)]);
                put(&mut buf, 8, &p.angle.to_le_bytes());
            }
            Command::Motor(p) => {
                put(&mut buf, 0, &TAG_MOTOR.to_le_bytes());
                put(&mut buf, 4, &p.motor_id.to_le_bytes());
                put(&mut buf, 8, &[char_byte(p.dir)]);
                put(&mut buf, 12, &p.angle.to_le_bytes());
            }
            Command::Unknown => put(&mut buf, 0, &TAG_UNKNOWN.to_le_bytes()),
        }
        Self(buf)
    }

    /// Returns the encoded bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; RECORD_LEN] {
        &self.0
    }

    /// Returns the verb tag stored in the first four bytes.
    #[must_use]
    pub fn tag(&self) -> u32 {
        let [a, b, c, d, ..] = self.0;
        u32::from_le_bytes([a, b, c, d])
    }
}

impl From<&Command> for CommandRecord {
    fn from(command: &Command) -> Self {
        Self::encode(command)
    }
}

fn put(buf: &mut [u8; RECORD_LEN], offset: usize, bytes: &[u8]) {
    if let Some(dst) = buf.get_mut(offset..offset + bytes.len()) {
        dst.copy_from_slice(bytes);
    }
}

/// First UTF-8 byte of `c`; `'\0'` encodes as zero.
fn char_byte(c: char) -> u8 {
    let mut tmp = [0u8; 4];
    c.encode_utf8(&mut tmp);
    let [first, ..] = tmp;
    first
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::domain::command::{MotorParams, MoveParams, SpinParams};

    fn i32_at(record: &CommandRecord, offset: usize) -> i32 {
        let b = &record.as_bytes()[offset..offset + 4];
        i32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    #[test]
    fn spin_layout() {
        let rec = CommandRecord::encode(&Command::Spin(SpinParams { lr: 'R', angle: 90 }));
        assert_eq!(rec.tag(), 1);
        assert_eq!(rec.as_bytes()[4], b'R');
        assert_eq!(i32_at(&rec, 8), 90);
        assert!(rec.as_bytes()[12..].iter().all(|b| *b == 0));
    }

    #[test]
    fn move_layout() {
        let rec = CommandRecord::encode(&Command::Move(MoveParams {
            stop: 1,
            mode: 'S',
            direction: "WASD".to_string(),
            value: 50,
            time: 200,
        }));
        assert_eq!(rec.tag(), 0);
        assert_eq!(i32_at(&rec, 4), 1);
        assert_eq!(rec.as_bytes()[8], b'S');
        assert_eq!(&rec.as_bytes()[9..13], b"WASD");
        assert!(rec.as_bytes()[13..25].iter().all(|b| *b == 0));
        assert_eq!(i32_at(&rec, 28), 50);
        assert_eq!(i32_at(&rec, 32), 200);
    }

    #[test]
    fn motor_layout() {
        let rec = CommandRecord::encode(&Command::Motor(MotorParams {
            motor_id: 3,
            dir: 'C',
            angle: -10,
        }));
        assert_eq!(rec.tag(), 2);
        assert_eq!(i32_at(&rec, 4), 3);
        assert_eq!(rec.as_bytes()[8], b'C');
        assert_eq!(i32_at(&rec, 12), -10);
    }

    #[test]
    fn default_params_encode_to_zero_block() {
        let rec = CommandRecord::from(&Command::Spin(SpinParams::default()));
        assert!(rec.as_bytes()[4..].iter().all(|b| *b == 0));
    }

    #[test]
    fn direction_keeps_terminator() {
        let rec = CommandRecord::encode(&Command::Move(MoveParams {
            direction: "W".repeat(15),
            ..MoveParams::default()
        }));
        assert_eq!(rec.as_bytes()[23], b'W');
        assert_eq!(rec.as_bytes()[24], 0);
    }
}
