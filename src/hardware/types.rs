//! Value types shared by the codec, the session and the axis views.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{StageError, StageResult};

/// Largest pulse magnitude the controllers accept in a move command.
pub const MAX_PULSE_MAGNITUDE: u64 = 16_777_215;

/// Controller family, which fixes the valid axes and the command dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerModel {
    /// GSC-01 class controller, axis 1 only.
    SingleAxis,
    /// GSC-02 class controller, axes 1 and 2.
    DualAxis,
}

/// How a controller acknowledges commands that carry no data response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStyle {
    /// The controller answers every command with an `OK` / `NG` line.
    Line,
    /// The controller is silent; acceptance is read from ACK1 of a `Q:` status query.
    StatusQuery,
}

impl ControllerModel {
    /// Axes this model can drive, in index order.
    pub fn axes(self) -> &'static [Axis] {
        match self {
            ControllerModel::SingleAxis => &[Axis::One],
            ControllerModel::DualAxis => &[Axis::One, Axis::Two],
        }
    }

    pub fn supports(self, axis: Axis) -> bool {
        self.axes().contains(&axis)
    }

    pub fn axis_count(self) -> usize {
        self.axes().len()
    }

    pub fn ack_style(self) -> AckStyle {
        match self {
            ControllerModel::SingleAxis => AckStyle::Line,
            ControllerModel::DualAxis => AckStyle::StatusQuery,
        }
    }

    /// Fails with `InvalidAxis` when `axis` is not driven by this model.
    pub fn check_axis(self, axis: Axis) -> StageResult<()> {
        if self.supports(axis) {
            Ok(())
        } else {
            Err(StageError::InvalidAxis {
                axis: axis.index(),
                model: self,
            })
        }
    }

    pub fn check_select(self, select: AxisSelect) -> StageResult<()> {
        match select {
            AxisSelect::Single(axis) => self.check_axis(axis),
            AxisSelect::All => Ok(()),
        }
    }
}

impl fmt::Display for ControllerModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerModel::SingleAxis => f.write_str("single-axis"),
            ControllerModel::DualAxis => f.write_str("dual-axis"),
        }
    }
}

/// One drivable motion channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    One,
    Two,
}

impl Axis {
    /// 1-based index as written on the wire.
    pub fn index(self) -> u8 {
        match self {
            Axis::One => 1,
            Axis::Two => 2,
        }
    }

    /// Position of this axis in per-axis arrays.
    pub(crate) fn slot(self) -> usize {
        usize::from(self.index() - 1)
    }
}

impl TryFrom<u8> for Axis {
    type Error = StageError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            1 => Ok(Axis::One),
            2 => Ok(Axis::Two),
            other => Err(StageError::InvalidParameter(format!(
                "axis index must be 1 or 2, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Target of a command that may address one axis or every axis at once (`W`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSelect {
    Single(Axis),
    All,
}

impl From<Axis> for AxisSelect {
    fn from(axis: Axis) -> Self {
        AxisSelect::Single(axis)
    }
}

impl fmt::Display for AxisSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisSelect::Single(axis) => write!(f, "{axis}"),
            AxisSelect::All => f.write_str("W"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Plus,
    Minus,
}

impl Direction {
    pub fn token(self) -> char {
        match self {
            Direction::Plus => '+',
            Direction::Minus => '-',
        }
    }

    pub fn from_token(token: char) -> Option<Self> {
        match token {
            '+' => Some(Direction::Plus),
            '-' => Some(Direction::Minus),
            _ => None,
        }
    }
}

/// Speed range selector of dual-range controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpeedRange(u8);

impl SpeedRange {
    pub const LOW: SpeedRange = SpeedRange(1);
    pub const HIGH: SpeedRange = SpeedRange(2);

    pub fn new(selector: u8) -> StageResult<Self> {
        if (1..=3).contains(&selector) {
            Ok(SpeedRange(selector))
        } else {
            Err(StageError::InvalidParameter(format!(
                "speed range must be 1, 2 or 3, got {selector}"
            )))
        }
    }

    pub fn selector(self) -> u8 {
        self.0
    }
}

impl Default for SpeedRange {
    fn default() -> Self {
        SpeedRange::HIGH
    }
}

/// Start speed, top speed and ramp time of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpeedProfile {
    /// Start (minimum) speed S in pulses per second
    pub min_pps: u32,
    /// Top (maximum) speed F in pulses per second
    pub max_pps: u32,
    /// Acceleration / deceleration time R in milliseconds
    pub accel_ms: u32,
    /// Range selector, only encoded by dual-range controllers
    pub range: Option<SpeedRange>,
}

impl SpeedProfile {
    /// Build a profile, rejecting `min_pps > max_pps`.
    pub fn new(min_pps: u32, max_pps: u32, accel_ms: u32) -> StageResult<Self> {
        let profile = Self {
            min_pps,
            max_pps,
            accel_ms,
            range: None,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn with_range(mut self, range: SpeedRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn validate(&self) -> StageResult<()> {
        if self.min_pps > self.max_pps {
            return Err(StageError::InvalidSpeedProfile {
                min: self.min_pps,
                max: self.max_pps,
            });
        }
        Ok(())
    }
}

impl Default for SpeedProfile {
    /// Power-on setting of the controllers: S500 F5000 R200.
    fn default() -> Self {
        Self {
            min_pps: 500,
            max_pps: 5000,
            accel_ms: 200,
            range: None,
        }
    }
}
