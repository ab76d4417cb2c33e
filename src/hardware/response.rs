//! Incoming response layouts and their decoders.
//!
//! Every decoder takes one received line (terminator optional), checks it against the exact
//! layout of its response class and either returns a typed value or a `DecodeError`. A line
//! that is well formed but reports a rejected command is not a decode failure; it decodes to
//! `CommandAck::Rejected` and the session turns that into `CommandRejected`.
//!
//! The `encode` helpers produce the same layouts and exist for the simulated controller.

use crate::error::{DecodeError, ResponseKind};
use crate::hardware::types::{Axis, ControllerModel};

/// Width of a position field, sign included.
const POSITION_WIDTH: usize = 10;

fn strip(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Acceptance of the last command (ACK1 / `OK` / `NG`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAck {
    Accepted,
    Rejected,
}

impl CommandAck {
    /// Decode a stand-alone acknowledgement line.
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        match strip(line).trim() {
            "" => Err(DecodeError::EmptyResponse),
            "OK" | "K" => Ok(CommandAck::Accepted),
            "NG" | "X" => Ok(CommandAck::Rejected),
            other => Err(DecodeError::malformed(
                ResponseKind::Ack,
                other,
                "expected OK, NG, K or X",
            )),
        }
    }

    fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "K" => Some(CommandAck::Accepted),
            "X" => Some(CommandAck::Rejected),
            _ => None,
        }
    }

    fn flag(self) -> char {
        match self {
            CommandAck::Accepted => 'K',
            CommandAck::Rejected => 'X',
        }
    }

    /// Line a single-axis controller sends after a command.
    pub fn encode_line(self) -> &'static str {
        match self {
            CommandAck::Accepted => "OK",
            CommandAck::Rejected => "NG",
        }
    }
}

/// Why the stage last came to rest (ACK2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    Normal,
    LimitAxis1,
    LimitAxis2,
    LimitBoth,
}

impl StopCondition {
    fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "K" => Some(StopCondition::Normal),
            "L" => Some(StopCondition::LimitAxis1),
            "M" => Some(StopCondition::LimitAxis2),
            "W" => Some(StopCondition::LimitBoth),
            _ => None,
        }
    }

    fn flag(self) -> char {
        match self {
            StopCondition::Normal => 'K',
            StopCondition::LimitAxis1 => 'L',
            StopCondition::LimitAxis2 => 'M',
            StopCondition::LimitBoth => 'W',
        }
    }

    /// Whether `axis` was stopped by a limit sensor.
    pub fn limit_hit(self, axis: Axis) -> bool {
        matches!(
            (self, axis),
            (StopCondition::LimitAxis1, Axis::One)
                | (StopCondition::LimitAxis2, Axis::Two)
                | (StopCondition::LimitBoth, _)
        )
    }
}

/// Ready / busy flag (ACK3 and the status2 reply).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// `R`: all commands accepted
    Stopped,
    /// `B`: only `L`, `Q` and `!` accepted
    Moving,
}

impl MotionState {
    fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "R" => Some(MotionState::Stopped),
            "B" => Some(MotionState::Moving),
            _ => None,
        }
    }

    fn flag(self) -> char {
        match self {
            MotionState::Stopped => 'R',
            MotionState::Moving => 'B',
        }
    }

    pub fn is_stopped(self) -> bool {
        self == MotionState::Stopped
    }
}

/// Decoded `Q:` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status1 {
    pub position1: i64,
    /// Present only on dual-axis controllers
    pub position2: Option<i64>,
    pub ack: CommandAck,
    pub stop: StopCondition,
    pub motion: MotionState,
}

impl Status1 {
    pub fn position(&self, axis: Axis) -> Option<i64> {
        match axis {
            Axis::One => Some(self.position1),
            Axis::Two => self.position2,
        }
    }

    pub fn decode(line: &str, model: ControllerModel) -> Result<Self, DecodeError> {
        let line = strip(line);
        if line.trim().is_empty() {
            return Err(DecodeError::EmptyResponse);
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let expected = model.axis_count() + 3;
        if fields.len() != expected {
            return Err(DecodeError::malformed(
                ResponseKind::Status1,
                line,
                format!("expected {expected} fields, got {}", fields.len()),
            ));
        }

        let bad = |reason: &str| DecodeError::malformed(ResponseKind::Status1, line, reason);
        let position1 = parse_position(fields[0]).ok_or_else(|| bad("bad axis 1 position"))?;
        let position2 = match model {
            ControllerModel::SingleAxis => None,
            ControllerModel::DualAxis => {
                Some(parse_position(fields[1]).ok_or_else(|| bad("bad axis 2 position"))?)
            }
        };
        let flags = &fields[model.axis_count()..];
        let ack = CommandAck::from_flag(flags[0]).ok_or_else(|| bad("bad ACK1 flag"))?;
        let stop = StopCondition::from_flag(flags[1]).ok_or_else(|| bad("bad ACK2 flag"))?;
        let motion = MotionState::from_flag(flags[2]).ok_or_else(|| bad("bad ACK3 flag"))?;

        Ok(Self {
            position1,
            position2,
            ack,
            stop,
            motion,
        })
    }

    pub fn encode(&self) -> String {
        let mut fields = vec![format_position(self.position1)];
        if let Some(position2) = self.position2 {
            fields.push(format_position(position2));
        }
        fields.push(self.ack.flag().to_string());
        fields.push(self.stop.flag().to_string());
        fields.push(self.motion.flag().to_string());
        fields.join(",")
    }
}

/// Decoded `!:` reply: per-axis busy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status2 {
    pub axis1: MotionState,
    /// Present only on dual-axis controllers
    pub axis2: Option<MotionState>,
}

impl Status2 {
    pub fn motion(&self, axis: Axis) -> Option<MotionState> {
        match axis {
            Axis::One => Some(self.axis1),
            Axis::Two => self.axis2,
        }
    }

    /// `true` when `axis` is known to be at rest.
    pub fn is_ready(&self, axis: Axis) -> bool {
        self.motion(axis).is_some_and(MotionState::is_stopped)
    }

    /// Every command is accepted only while no axis is busy.
    pub fn accepts_all_commands(&self) -> bool {
        self.axis1.is_stopped() && self.axis2.map_or(true, MotionState::is_stopped)
    }

    /// Decode a status2 line. A dual-axis controller that answers with one flag reports the
    /// same state for both axes.
    pub fn decode(line: &str, model: ControllerModel) -> Result<Self, DecodeError> {
        let line = strip(line);
        if line.trim().is_empty() {
            return Err(DecodeError::EmptyResponse);
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let flag = |field: &str| {
            MotionState::from_flag(field).ok_or_else(|| {
                DecodeError::malformed(ResponseKind::Status2, line, "expected R or B")
            })
        };
        match (model, fields.as_slice()) {
            (ControllerModel::SingleAxis, [f]) => Ok(Self {
                axis1: flag(*f)?,
                axis2: None,
            }),
            (ControllerModel::DualAxis, [f]) => {
                let shared = flag(*f)?;
                Ok(Self {
                    axis1: shared,
                    axis2: Some(shared),
                })
            }
            (ControllerModel::DualAxis, [f1, f2]) => Ok(Self {
                axis1: flag(*f1)?,
                axis2: Some(flag(*f2)?),
            }),
            _ => Err(DecodeError::malformed(
                ResponseKind::Status2,
                line,
                format!("unexpected field count {}", fields.len()),
            )),
        }
    }

    pub fn encode(&self) -> String {
        match self.axis2 {
            Some(axis2) => format!("{},{}", self.axis1.flag(), axis2.flag()),
            None => self.axis1.flag().to_string(),
        }
    }
}

/// Decode a `?:` reply.
///
/// A version is a single field; a comma-separated line is a status reply read out of turn.
pub fn decode_version(line: &str) -> Result<String, DecodeError> {
    let text = strip(line).trim();
    if text.is_empty() {
        return Err(DecodeError::EmptyResponse);
    }
    if text.contains(',') {
        return Err(DecodeError::malformed(
            ResponseKind::Version,
            text,
            "expected a single field",
        ));
    }
    Ok(text.to_string())
}

/// Decode an `I:` reply into the four input bits.
pub fn decode_io_input(line: &str) -> Result<u8, DecodeError> {
    let text = strip(line).trim();
    if text.is_empty() {
        return Err(DecodeError::EmptyResponse);
    }
    text.parse::<u8>()
        .ok()
        .filter(|bits| *bits <= 15)
        .ok_or_else(|| DecodeError::malformed(ResponseKind::IoInput, text, "expected 0..=15"))
}

/// Positions are sign-left, digits-right in a fixed-width field: `-      1000`.
fn parse_position(field: &str) -> Option<i64> {
    let compact: String = field.chars().filter(|c| *c != ' ').collect();
    let digits = compact.strip_prefix(['+', '-']).unwrap_or(compact.as_str());
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    compact.parse().ok()
}

fn format_position(value: i64) -> String {
    let sign = if value < 0 { '-' } else { ' ' };
    format!(
        "{sign}{:>width$}",
        value.unsigned_abs(),
        width = POSITION_WIDTH - 1
    )
}
