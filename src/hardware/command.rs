//! Outgoing command grammar of the GSC controllers.
//!
//! Reference: GSC-01 / GSC-02 stage controller operation manuals
//!
//! Protocol Overview:
//! - Format: ASCII, `<PREFIX>:<FIELDS><CR><LF>`
//! - Baud: 9600, 8N1 by default
//! - Example: "A:1+00500" (axis 1, absolute pulse set, +500)
//! - Motion commands (`M`, `A`, `J`) only load a move; `G` starts it
//!
//! `Command::encode` validates every parameter against the controller model before producing a
//! line, so nothing malformed ever reaches the transport. `Command::parse` is the inverse and
//! is what the simulated controller uses to interpret what the session wrote.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, ResponseKind, StageError, StageResult};
use crate::hardware::types::{
    Axis, AxisSelect, ControllerModel, Direction, SpeedProfile, SpeedRange,
};

/// Line terminator for both directions.
pub const TERMINATOR: &str = "\r\n";

/// Minimum digit count of a zero-padded pulse field.
const PADDED_WIDTH: usize = 5;

/// Wire layout of signed pulse fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseFormat {
    /// Sign followed by zero-padded digits: `+00500`
    #[default]
    Padded,
    /// Sign, `P` marker, then digits: `+P500`
    Marked,
}

/// A per-axis value, either for one axis or for both axes in one line (`W`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerAxis<T> {
    Single(Axis, T),
    Both(T, T),
}

impl<T> PerAxis<T> {
    fn check(&self, model: ControllerModel) -> StageResult<()> {
        match self {
            PerAxis::Single(axis, _) => model.check_axis(*axis),
            // `W` with two values needs a second axis
            PerAxis::Both(..) => model.check_axis(Axis::Two),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionKind {
    /// ROM version, e.g. `V2.00`
    Rom,
    /// Revision number, e.g. `001`
    Revision,
}

/// One controller command, typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `H:` origin return with an explicit search direction (dual-axis controllers)
    ReturnOrigin(PerAxis<Direction>),
    /// `H:` origin return whose direction is fixed by controller switches (single-axis)
    Home(AxisSelect),
    /// `M:` relative pulse set
    MoveRelative(PerAxis<i64>),
    /// `A:` absolute pulse set
    MoveAbsolute(PerAxis<i64>),
    /// `J:` jog set
    Jog(PerAxis<Direction>),
    /// `G` / `G:` start the loaded move
    Drive,
    /// `L:` decelerate and stop
    DecelerateStop(AxisSelect),
    /// `L:E` stop at once
    ImmediateStop,
    /// `R:` make the current position the logical origin
    SetLogicalZero(AxisSelect),
    /// `D:` speed set on a single-axis controller
    SetSpeed(AxisSelect, SpeedProfile),
    /// `D:` speed set on a dual-axis controller, always carrying both axes
    SetSpeedPair {
        range: SpeedRange,
        axis1: SpeedProfile,
        axis2: SpeedProfile,
    },
    /// `C:` motor excitation on/off
    Energize(PerAxis<bool>),
    QueryStatus1,
    QueryStatus2,
    QueryVersion(VersionKind),
    /// `O:` drive the four output bits
    IoOutput(u8),
    /// `I:` read the four input bits
    IoInput,
}

impl Command {
    /// Commands answered by a data line instead of an acknowledgement.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Command::QueryStatus1
                | Command::QueryStatus2
                | Command::QueryVersion(_)
                | Command::IoInput
        )
    }

    /// Encode into one terminated line, validating against `model` first.
    pub fn encode(&self, model: ControllerModel, format: PulseFormat) -> StageResult<String> {
        let body = self.encode_body(model, format)?;
        Ok(format!("{body}{TERMINATOR}"))
    }

    fn encode_body(&self, model: ControllerModel, format: PulseFormat) -> StageResult<String> {
        let line = match self {
            Command::ReturnOrigin(target) => {
                target.check(model)?;
                if model == ControllerModel::SingleAxis {
                    return Err(StageError::InvalidParameter(
                        "single-axis controllers take no origin return direction".into(),
                    ));
                }
                match target {
                    PerAxis::Single(axis, dir) => format!("H:{axis}{}", dir.token()),
                    PerAxis::Both(d1, d2) => format!("H:W{}{}", d1.token(), d2.token()),
                }
            }
            Command::Home(select) => {
                model.check_select(*select)?;
                format!("H:{select}")
            }
            Command::MoveRelative(target) => format!("M:{}", encode_pulses(target, model, format)?),
            Command::MoveAbsolute(target) => format!("A:{}", encode_pulses(target, model, format)?),
            Command::Jog(target) => {
                target.check(model)?;
                match target {
                    PerAxis::Single(axis, dir) => format!("J:{axis}{}", dir.token()),
                    PerAxis::Both(d1, d2) => format!("J:W{}{}", d1.token(), d2.token()),
                }
            }
            Command::Drive => match model {
                ControllerModel::SingleAxis => "G:".to_string(),
                ControllerModel::DualAxis => "G".to_string(),
            },
            Command::DecelerateStop(select) => {
                model.check_select(*select)?;
                format!("L:{select}")
            }
            Command::ImmediateStop => "L:E".to_string(),
            Command::SetLogicalZero(select) => {
                model.check_select(*select)?;
                format!("R:{select}")
            }
            Command::SetSpeed(select, profile) => {
                if model == ControllerModel::DualAxis {
                    return Err(StageError::InvalidParameter(
                        "dual-axis controllers set both axes in one speed command".into(),
                    ));
                }
                model.check_select(*select)?;
                profile.validate()?;
                format!("D:{select}{}", speed_fields(profile))
            }
            Command::SetSpeedPair {
                range,
                axis1,
                axis2,
            } => {
                model.check_axis(Axis::Two)?;
                axis1.validate()?;
                axis2.validate()?;
                format!(
                    "D:{}{}{}",
                    range.selector(),
                    speed_fields(axis1),
                    speed_fields(axis2)
                )
            }
            Command::Energize(target) => {
                target.check(model)?;
                match target {
                    PerAxis::Single(axis, on) => format!("C:{axis}{}", u8::from(*on)),
                    PerAxis::Both(on1, on2) => format!("C:W{}{}", u8::from(*on1), u8::from(*on2)),
                }
            }
            Command::QueryStatus1 => "Q:".to_string(),
            Command::QueryStatus2 => "!:".to_string(),
            Command::QueryVersion(VersionKind::Rom) => "?:V".to_string(),
            Command::QueryVersion(VersionKind::Revision) => "?:-".to_string(),
            Command::IoOutput(bits) => {
                if *bits > 15 {
                    return Err(StageError::InvalidParameter(format!(
                        "I/O output must be 0..=15, got {bits}"
                    )));
                }
                format!("O:{bits}")
            }
            Command::IoInput => "I:".to_string(),
        };
        Ok(line)
    }

    /// Parse one line (terminator optional) back into a command.
    ///
    /// Accepts both pulse layouts. The model decides how `H:` and `D:` are read.
    pub fn parse(line: &str, model: ControllerModel) -> Result<Command, DecodeError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(DecodeError::EmptyResponse);
        }
        let bad = |reason: &str| DecodeError::malformed(ResponseKind::Command, line, reason);

        if line == "G" || line == "G:" {
            return Ok(Command::Drive);
        }

        let (prefix, rest) = line.split_once(':').ok_or_else(|| bad("missing ':'"))?;
        match prefix {
            "H" => match model {
                ControllerModel::SingleAxis => Ok(Command::Home(parse_select(rest).ok_or_else(|| bad("bad axis"))?)),
                ControllerModel::DualAxis => parse_directions(rest)
                    .map(Command::ReturnOrigin)
                    .ok_or_else(|| bad("bad origin return target")),
            },
            "M" => parse_pulses(rest)
                .map(Command::MoveRelative)
                .ok_or_else(|| bad("bad pulse field")),
            "A" => parse_pulses(rest)
                .map(Command::MoveAbsolute)
                .ok_or_else(|| bad("bad pulse field")),
            "J" => parse_directions(rest)
                .map(Command::Jog)
                .ok_or_else(|| bad("bad jog target")),
            "L" if rest == "E" => Ok(Command::ImmediateStop),
            "L" => parse_select(rest)
                .map(Command::DecelerateStop)
                .ok_or_else(|| bad("bad axis")),
            "R" => parse_select(rest)
                .map(Command::SetLogicalZero)
                .ok_or_else(|| bad("bad axis")),
            "D" => parse_speed(rest, model).ok_or_else(|| bad("bad speed fields")),
            "C" => parse_energize(rest)
                .map(Command::Energize)
                .ok_or_else(|| bad("bad excitation field")),
            "Q" if rest.is_empty() => Ok(Command::QueryStatus1),
            "!" if rest.is_empty() => Ok(Command::QueryStatus2),
            "?" if rest == "V" => Ok(Command::QueryVersion(VersionKind::Rom)),
            "?" if rest == "-" => Ok(Command::QueryVersion(VersionKind::Revision)),
            "O" => rest
                .parse::<u8>()
                .ok()
                .filter(|bits| *bits <= 15)
                .map(Command::IoOutput)
                .ok_or_else(|| bad("bad output bits")),
            "I" if rest.is_empty() => Ok(Command::IoInput),
            _ => Err(bad("unknown command")),
        }
    }
}

fn format_pulse(value: i64, format: PulseFormat) -> String {
    // Range is enforced by the controller, which rejects out-of-range targets
    let magnitude = value.unsigned_abs();
    let sign = if value < 0 { '-' } else { '+' };
    match format {
        PulseFormat::Padded => format!("{sign}{magnitude:0width$}", width = PADDED_WIDTH),
        PulseFormat::Marked => format!("{sign}P{magnitude}"),
    }
}

fn encode_pulses(
    target: &PerAxis<i64>,
    model: ControllerModel,
    format: PulseFormat,
) -> StageResult<String> {
    target.check(model)?;
    Ok(match target {
        PerAxis::Single(axis, pulses) => format!("{axis}{}", format_pulse(*pulses, format)),
        PerAxis::Both(p1, p2) => format!(
            "W{}{}",
            format_pulse(*p1, format),
            format_pulse(*p2, format)
        ),
    })
}

fn speed_fields(profile: &SpeedProfile) -> String {
    format!(
        "S{}F{}R{}",
        profile.min_pps, profile.max_pps, profile.accel_ms
    )
}

fn parse_axis(c: char) -> Option<Axis> {
    match c {
        '1' => Some(Axis::One),
        '2' => Some(Axis::Two),
        _ => None,
    }
}

fn parse_select(field: &str) -> Option<AxisSelect> {
    match field {
        "W" => Some(AxisSelect::All),
        _ => {
            let mut chars = field.chars();
            let axis = parse_axis(chars.next()?)?;
            chars.next().is_none().then_some(AxisSelect::Single(axis))
        }
    }
}

fn parse_directions(field: &str) -> Option<PerAxis<Direction>> {
    let mut chars = field.chars();
    let head = chars.next()?;
    let values: Vec<Direction> = chars.map(Direction::from_token).collect::<Option<_>>()?;
    match (head, values.as_slice()) {
        ('W', [d1, d2]) => Some(PerAxis::Both(*d1, *d2)),
        (c, [d]) => Some(PerAxis::Single(parse_axis(c)?, *d)),
        _ => None,
    }
}

fn parse_energize(field: &str) -> Option<PerAxis<bool>> {
    let flag = |c: char| match c {
        '0' => Some(false),
        '1' => Some(true),
        _ => None,
    };
    let mut chars = field.chars();
    let head = chars.next()?;
    let values: Vec<bool> = chars.map(flag).collect::<Option<_>>()?;
    match (head, values.as_slice()) {
        ('W', [on1, on2]) => Some(PerAxis::Both(*on1, *on2)),
        (c, [on]) => Some(PerAxis::Single(parse_axis(c)?, *on)),
        _ => None,
    }
}

/// Split a run of signed pulse fields (`+00500-00200`, `+P500-P200`) into values.
fn parse_signed_fields(field: &str) -> Option<Vec<i64>> {
    let mut values = Vec::new();
    let mut rest = field;
    while !rest.is_empty() {
        let sign = Direction::from_token(rest.chars().next()?)?;
        rest = &rest[1..];
        rest = rest.strip_prefix('P').unwrap_or(rest);
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return None;
        }
        let magnitude: i64 = rest[..digits_end].parse().ok()?;
        values.push(match sign {
            Direction::Plus => magnitude,
            Direction::Minus => -magnitude,
        });
        rest = &rest[digits_end..];
    }
    Some(values)
}

fn parse_pulses(field: &str) -> Option<PerAxis<i64>> {
    let head = field.chars().next()?;
    let values = parse_signed_fields(&field[head.len_utf8()..])?;
    match (head, values.as_slice()) {
        ('W', [p1, p2]) => Some(PerAxis::Both(*p1, *p2)),
        (c, [p]) => Some(PerAxis::Single(parse_axis(c)?, *p)),
        _ => None,
    }
}

fn take_number<'a>(rest: &mut &'a str, tag: char) -> Option<u32> {
    let current: &'a str = rest;
    let tail = current.strip_prefix(tag)?;
    let end = tail
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(tail.len());
    let value = tail[..end].parse().ok()?;
    *rest = &tail[end..];
    Some(value)
}

/// Read `S<n>F<n>R<n>` groups.
fn parse_speed_groups(mut rest: &str) -> Option<Vec<SpeedProfile>> {
    let mut profiles = Vec::new();
    while !rest.is_empty() {
        let min_pps = take_number(&mut rest, 'S')?;
        let max_pps = take_number(&mut rest, 'F')?;
        let accel_ms = take_number(&mut rest, 'R')?;
        profiles.push(SpeedProfile {
            min_pps,
            max_pps,
            accel_ms,
            range: None,
        });
    }
    Some(profiles)
}

fn parse_speed(field: &str, model: ControllerModel) -> Option<Command> {
    let head = field.chars().next()?;
    let profiles = parse_speed_groups(&field[head.len_utf8()..])?;
    match (model, profiles.as_slice()) {
        (ControllerModel::SingleAxis, [profile]) => {
            Some(Command::SetSpeed(parse_select(&head.to_string())?, *profile))
        }
        (ControllerModel::DualAxis, [p1, p2]) => {
            let range = SpeedRange::new(head.to_digit(10)? as u8).ok()?;
            Some(Command::SetSpeedPair {
                range,
                axis1: p1.with_range(range),
                axis2: p2.with_range(range),
            })
        }
        _ => None,
    }
}
