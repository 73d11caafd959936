//! Motion commands and the text command translator.
//!
//! Clients send short positional commands:
//!
//! ```text
//! move  <stop:int> <mode:char> <direction:string> <value:int> <time:int>
//! spin  <lr:char> <angle:int>
//! motor <motor_id:int> <dir:char> <angle:int>
//! ```
//!
//! Parsing is lenient. A missing trailing token leaves that field and every
//! later one at its zero default. An integer token is read from its leading
//! sign and digits only, so `"90deg"` is `90`, `"-45x"` is `-45` and `"abc"`
//! is `0`; values beyond `i32` saturate. The only failure signal is
//! [`Command::Unknown`], which callers must not forward to the motor
//! controller.

use std::convert::Infallible;
use std::str::FromStr;

/// Longest direction token kept by a `move` command, in bytes.
pub const MAX_DIRECTION_LEN: usize = 15;

/// Parameters of a `move` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveParams {
    /// Emergency-stop flag (`0` keeps moving, `1` stops).
    pub stop: i32,
    /// Mode character, e.g. `'S'` for speed or `'D'` for distance.
    pub mode: char,
    /// Direction token built from `W`, `A`, `S`, `D`.
    pub direction: String,
    /// Speed or distance, depending on `mode`.
    pub value: i32,
    /// Run time in speed mode; `0` means unbounded.
    pub time: i32,
}

/// Parameters of a `spin` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpinParams {
    /// `'L'` or `'R'`.
    pub lr: char,
    /// Rotation angle in degrees.
    pub angle: i32,
}

/// Parameters of a `motor` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorParams {
    /// Target motor index.
    pub motor_id: i32,
    /// Rotation direction character.
    pub dir: char,
    /// Rotation angle in degrees.
    pub angle: i32,
}

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drive the robot.
    Move(MoveParams),
    /// Rotate in place.
    Spin(SpinParams),
    /// Drive a single motor.
    Motor(MotorParams),
    /// Unrecognised verb or empty input.
    Unknown,
}

impl Command {
    /// Parses a command line. Never fails; see the module docs.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut tokens = text.split_whitespace();
        match tokens.next() {
            Some("move") => Self::Move(parse_move(tokens)),
            Some("spin") => Self::Spin(parse_spin(tokens)),
            Some("motor") => Self::Motor(parse_motor(tokens)),
            _ => Self::Unknown,
        }
    }

    /// Returns `true` if the command should reach the motor controller.
    #[must_use]
    pub const fn is_forwardable(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns the verb as a static string slice.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Move(_) => "move",
            Self::Spin(_) => "spin",
            Self::Motor(_) => "motor",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for Command {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

fn parse_move<'a>(mut tokens: impl Iterator<Item = &'a str>) -> MoveParams {
    let mut params = MoveParams::default();
    let Some(tok) = tokens.next() else {
        return params;
    };
    params.stop = int_or_zero(tok);
    let Some(tok) = tokens.next() else {
        return params;
    };
    params.mode = first_char(tok);
    let Some(tok) = tokens.next() else {
        return params;
    };
    params.direction = truncate_direction(tok);
    let Some(tok) = tokens.next() else {
        return params;
    };
    params.value = int_or_zero(tok);
    if let Some(tok) = tokens.next() {
        params.time = int_or_zero(tok);
    }
    params
}

fn parse_spin<'a>(mut tokens: impl Iterator<Item = &'a str>) -> SpinParams {
    let mut params = SpinParams::default();
    let Some(tok) = tokens.next() else {
        return params;
    };
    params.lr = first_char(tok);
    if let Some(tok) = tokens.next() {
        params.angle = int_or_zero(tok);
    }
    params
}

fn parse_motor<'a>(mut tokens: impl Iterator<Item = &'a str>) -> MotorParams {
    let mut params = MotorParams::default();
    let Some(tok) = tokens.next() else {
        return params;
    };
    params.motor_id = int_or_zero(tok);
    let Some(tok) = tokens.next() else {
        return params;
    };
    params.dir = first_char(tok);
    if let Some(tok) = tokens.next() {
        params.angle = int_or_zero(tok);
    }
    params
}

/// Reads an optional sign and the digits after it, ignoring the rest.
fn int_or_zero(token: &str) -> i32 {
    let (negative, digits) = match token.as_bytes() {
        [b'-', rest @ ..] => (true, rest),
        [b'+', rest @ ..] => (false, rest),
        rest => (false, rest),
    };
    let magnitude = digits
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0i64, |acc, b| {
            acc.saturating_mul(10)
                .saturating_add(i64::from(b - b'0'))
                .min(i64::from(i32::MAX) + 1)
        });
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).unwrap_or(if negative { i32::MIN } else { i32::MAX })
}

fn first_char(token: &str) -> char {
    token.chars().next().unwrap_or_default()
}

/// Keeps at most [`MAX_DIRECTION_LEN`] bytes, cutting on a char boundary.
fn truncate_direction(token: &str) -> String {
    let mut end = token.len().min(MAX_DIRECTION_LEN);
    while !token.is_char_boundary(end) {
        end -= 1;
    }
    token.get(..end).unwrap_or_default().to_string()
}
