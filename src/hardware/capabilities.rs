//! Atomic hardware capability traits
//!
//! `PulseAxis` is the single capability shared by everything that positions one motorized
//! axis in native pulses. Code written against the trait (unit conversion, scan loops,
//! tests) works equally with a live `AxisView`, a view over a simulated controller, or a
//! borrowed handle.
//!
//! # Design
//!
//! - Positions and distances are signed pulse counts
//! - Methods take `&self`; implementations serialize their own I/O
//! - `wait_until_ready` should give up after a bounded time

use crate::error::{StageError, StageResult};
use crate::hardware::axis::AxisView;
use crate::hardware::transport::Transport;
use crate::hardware::types::Axis;

/// Capability: one axis positioned in pulses
///
/// # Contract
/// - `move_absolute_pulses` / `move_relative_pulses` return once the move is accepted, or
///   once it has finished when the implementation waits automatically
/// - `position` never returns a cached value
pub trait PulseAxis {
    fn axis(&self) -> Axis;

    /// Current position in pulses
    fn position(&self) -> StageResult<i64>;

    /// Move to an absolute pulse position
    fn move_absolute_pulses(&self, target: i64) -> StageResult<()>;

    /// Move by a signed pulse distance
    fn move_relative_pulses(&self, delta: i64) -> StageResult<()>;

    /// Return to the mechanical origin
    fn reset(&self) -> StageResult<()>;

    /// `true` when the axis is at rest
    fn is_ready(&self) -> StageResult<bool>;

    /// Block until the axis is at rest
    fn wait_until_ready(&self) -> StageResult<()>;

    /// Stop motion in progress
    ///
    /// Default implementation reports the operation as unsupported.
    fn stop(&self) -> StageResult<()> {
        Err(StageError::InvalidParameter(format!(
            "axis {} does not support stop",
            self.axis()
        )))
    }
}

impl<A: PulseAxis + ?Sized> PulseAxis for &A {
    fn axis(&self) -> Axis {
        (**self).axis()
    }

    fn position(&self) -> StageResult<i64> {
        (**self).position()
    }

    fn move_absolute_pulses(&self, target: i64) -> StageResult<()> {
        (**self).move_absolute_pulses(target)
    }

    fn move_relative_pulses(&self, delta: i64) -> StageResult<()> {
        (**self).move_relative_pulses(delta)
    }

    fn reset(&self) -> StageResult<()> {
        (**self).reset()
    }

    fn is_ready(&self) -> StageResult<bool> {
        (**self).is_ready()
    }

    fn wait_until_ready(&self) -> StageResult<()> {
        (**self).wait_until_ready()
    }

    fn stop(&self) -> StageResult<()> {
        (**self).stop()
    }
}

impl<T: Transport> PulseAxis for AxisView<'_, T> {
    fn axis(&self) -> Axis {
        AxisView::axis(self)
    }

    fn position(&self) -> StageResult<i64> {
        AxisView::position(self)
    }

    fn move_absolute_pulses(&self, target: i64) -> StageResult<()> {
        AxisView::move_absolute_pulses(self, target)
    }

    fn move_relative_pulses(&self, delta: i64) -> StageResult<()> {
        AxisView::move_relative_pulses(self, delta)
    }

    fn reset(&self) -> StageResult<()> {
        AxisView::reset(self)
    }

    fn is_ready(&self) -> StageResult<bool> {
        AxisView::is_ready(self)
    }

    fn wait_until_ready(&self) -> StageResult<()> {
        AxisView::wait_until_ready(self).map(|_| ())
    }

    fn stop(&self) -> StageResult<()> {
        AxisView::stop(self)
    }
}
