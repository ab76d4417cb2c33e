//! Motion-completion polling.
//!
//! Controllers report completion only when asked, so waiting for a move means repeatedly
//! sending status2 and checking the busy flag of the axis in question. Each poll is an
//! ordinary session transaction: other callers of the same session can interleave their own
//! transactions between polls but never inside one.
//!
//! The first poll is sent immediately. Between polls the poller sleeps for the poll interval,
//! shortened so it never sleeps past the deadline. A query failure ends the wait at once; no
//! poll is retried.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{StageError, StageResult};
use crate::hardware::response::Status2;
use crate::hardware::session::ControllerSession;
use crate::hardware::transport::Transport;
use crate::hardware::types::Axis;

/// Outcome of a completed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionReport {
    /// Status2 queries sent, the final "stopped" one included
    pub polls: u32,
    pub elapsed: Duration,
}

/// Single non-blocking check: `true` if `axis` is at rest right now.
pub fn is_stopped<T: Transport>(session: &ControllerSession<T>, axis: Axis) -> StageResult<bool> {
    session.is_ready(axis)
}

/// Block until `axis` reports stopped or `timeout` elapses.
///
/// # Errors
/// - `InvalidAxis` if `axis` does not exist on the session's model (nothing is sent)
/// - `Timeout` if the axis is still busy once `timeout` has elapsed
/// - any error of the underlying status2 query, unchanged
pub fn wait_until_stopped<T: Transport>(
    session: &ControllerSession<T>,
    axis: Axis,
    poll_interval: Duration,
    timeout: Duration,
) -> StageResult<MotionReport> {
    session.model().check_axis(axis)?;
    poll_until(session, poll_interval, timeout, axis, |status| {
        status.is_ready(axis)
    })
}

/// Block until no axis of the controller is busy.
///
/// A timeout is reported against axis 1.
pub fn wait_until_all_stopped<T: Transport>(
    session: &ControllerSession<T>,
    poll_interval: Duration,
    timeout: Duration,
) -> StageResult<MotionReport> {
    poll_until(session, poll_interval, timeout, Axis::One, |status| {
        status.accepts_all_commands()
    })
}

fn poll_until<T, F>(
    session: &ControllerSession<T>,
    poll_interval: Duration,
    timeout: Duration,
    axis: Axis,
    done: F,
) -> StageResult<MotionReport>
where
    T: Transport,
    F: Fn(&Status2) -> bool,
{
    let start = Instant::now();
    let mut polls = 0u32;

    loop {
        polls += 1;
        let status = session.query_status2()?;
        let elapsed = start.elapsed();

        if done(&status) {
            debug!(%axis, polls, ?elapsed, "Motion complete");
            return Ok(MotionReport { polls, elapsed });
        }

        if elapsed >= timeout {
            warn!(%axis, polls, ?elapsed, "Gave up waiting for motion to stop");
            return Err(StageError::Timeout {
                axis,
                waited: elapsed,
            });
        }

        thread::sleep(poll_interval.min(timeout - elapsed));
    }
}
