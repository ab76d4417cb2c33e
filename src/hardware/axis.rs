//! Axis-scoped view of a controller session.
//!
//! An `AxisView` is a lightweight handle (a session reference plus an axis) that fixes the
//! axis argument of the session's operations. It owns no I/O of its own, so two views of one
//! dual-axis controller share the single transport safely.
//!
//! With auto-wait enabled (the default taken from the session's motion settings), motion
//! operations block until the axis reports stopped before returning. Jogging never waits,
//! since a jog runs until it is stopped.

use std::time::Duration;

use tracing::debug;

use crate::error::StageResult;
use crate::hardware::poller::{self, MotionReport};
use crate::hardware::response::{MotionState, Status2};
use crate::hardware::session::ControllerSession;
use crate::hardware::transport::Transport;
use crate::hardware::types::{Axis, AxisSelect, ControllerModel, Direction, SpeedProfile};

/// Origin search direction used by `reset()`.
const DEFAULT_ORIGIN_DIRECTION: Direction = Direction::Minus;

pub struct AxisView<'s, T: Transport> {
    session: &'s ControllerSession<T>,
    axis: Axis,
    auto_wait: bool,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl<'s, T: Transport> AxisView<'s, T> {
    /// Callers go through `ControllerSession::axis`, which validates `axis`.
    pub(crate) fn new(session: &'s ControllerSession<T>, axis: Axis) -> Self {
        let motion = session.motion_settings();
        Self {
            session,
            axis,
            auto_wait: motion.auto_wait,
            poll_interval: motion.poll_interval,
            wait_timeout: motion.wait_timeout,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn session(&self) -> &'s ControllerSession<T> {
        self.session
    }

    pub fn auto_wait(&self) -> bool {
        self.auto_wait
    }

    pub fn set_auto_wait(&mut self, enabled: bool) {
        self.auto_wait = enabled;
    }

    pub fn with_auto_wait(mut self, enabled: bool) -> Self {
        self.auto_wait = enabled;
        self
    }

    /// Override the polling cadence used by `wait_until_ready` for this view.
    pub fn with_wait_timing(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.wait_timeout = timeout;
        self
    }

    fn select(&self) -> AxisSelect {
        AxisSelect::Single(self.axis)
    }

    fn settle(&self) -> StageResult<()> {
        if self.auto_wait {
            self.wait_until_ready()?;
        }
        Ok(())
    }

    /// Current position in pulses, read fresh from the controller.
    pub fn position(&self) -> StageResult<i64> {
        self.session.position(self.axis)
    }

    pub fn move_absolute_pulses(&self, target: i64) -> StageResult<()> {
        debug!(axis = %self.axis, target, "Absolute move");
        self.session.set_position(self.axis, target)?;
        self.settle()
    }

    pub fn move_relative_pulses(&self, delta: i64) -> StageResult<()> {
        debug!(axis = %self.axis, delta, "Relative move");
        self.session.increment_position(self.axis, delta)?;
        self.settle()
    }

    /// Return to the mechanical origin in the default search direction.
    pub fn reset(&self) -> StageResult<()> {
        self.reset_towards(DEFAULT_ORIGIN_DIRECTION)
    }

    /// Return to the mechanical origin searching in `direction`.
    ///
    /// Single-axis controllers ignore `direction`; their search direction is set by switches.
    pub fn reset_towards(&self, direction: Direction) -> StageResult<()> {
        self.session.return_origin(direction, self.select())?;
        self.settle()
    }

    /// Start a constant-speed jog. Returns as soon as the jog is running.
    pub fn jog(&self, direction: Direction) -> StageResult<()> {
        self.session.start_jog(self.axis, direction)
    }

    /// Decelerate and stop this axis.
    pub fn stop(&self) -> StageResult<()> {
        self.session.decelerate_stop(self.select())
    }

    pub fn set_speed(&self, profile: SpeedProfile) -> StageResult<()> {
        self.session.set_speed(profile, self.select())
    }

    pub fn speed(&self) -> StageResult<SpeedProfile> {
        self.session.speed_profile(self.axis)
    }

    pub fn energize(&self, enable: bool) -> StageResult<()> {
        self.session.energize_motor(enable, self.select())
    }

    pub fn set_logical_zero(&self) -> StageResult<()> {
        self.session.set_logical_zero(self.select())
    }

    /// Fresh status2 of the whole controller.
    pub fn status2(&self) -> StageResult<Status2> {
        self.session.query_status2()
    }

    /// Busy flag of this axis from a fresh status2 query.
    pub fn motion_state(&self) -> StageResult<MotionState> {
        let status = self.status2()?;
        Ok(status.motion(self.axis).unwrap_or(MotionState::Stopped))
    }

    pub fn is_ready(&self) -> StageResult<bool> {
        self.session.is_ready(self.axis)
    }

    pub fn wait_until_ready(&self) -> StageResult<MotionReport> {
        poller::wait_until_stopped(self.session, self.axis, self.poll_interval, self.wait_timeout)
    }

    pub fn model(&self) -> ControllerModel {
        self.session.model()
    }
}
