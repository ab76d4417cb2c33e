//! Mock transports for testing without a controller attached.
//!
//! # Available Mocks
//!
//! - `MockTransport` - scripted replies, records every line written
//! - `SimulatedController` - interprets the command set and answers like a GSC controller
//!
//! Both are cheap `Clone` handles over shared state: hand one clone to the session and keep
//! the other to script or inspect the exchange.
//!
//! Neither mock sleeps. A read with nothing queued fails with `ReadTimeout` at once, and the
//! simulated stage advances its motion on every status2 poll instead of on a clock, so motion
//! tests are deterministic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

use crate::error::TransportError;
use crate::hardware::command::{Command, PerAxis, VersionKind};
use crate::hardware::response::{CommandAck, MotionState, Status1, Status2, StopCondition};
use crate::hardware::transport::{strip_terminator, Transport};
use crate::hardware::types::{
    Axis, AxisSelect, ControllerModel, Direction, SpeedProfile, MAX_PULSE_MAGNITUDE,
};

fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn written_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

// =============================================================================
// MockTransport - scripted replies
// =============================================================================

#[derive(Debug)]
enum Reply {
    Line(String),
    Timeout,
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Reply>,
    written: Vec<String>,
    /// Writes still allowed before every further write fails; `None` never fails
    writes_left: Option<usize>,
}

/// Transport that replays queued reply lines.
///
/// # Example
///
/// ```
/// use optosigma::hardware::mock::MockTransport;
/// use optosigma::hardware::session::ControllerSession;
/// use optosigma::hardware::types::{Axis, ControllerModel};
///
/// let mock = MockTransport::new();
/// mock.push_reply("       500,K,K,R");
/// let session = ControllerSession::new(mock.clone(), ControllerModel::SingleAxis);
/// assert_eq!(session.position(Axis::One).unwrap(), 500);
/// assert_eq!(mock.written(), vec!["Q:\r\n"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply line; the terminator is optional.
    pub fn push_reply(&self, line: impl Into<String>) {
        lock(&self.script).replies.push_back(Reply::Line(line.into()));
    }

    /// Queue a read that times out.
    pub fn push_timeout(&self) {
        lock(&self.script).replies.push_back(Reply::Timeout);
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.script).writes_left = fail.then_some(0);
    }

    /// Let `count` more writes through, then fail every write after them.
    pub fn fail_writes_after(&self, count: usize) {
        lock(&self.script).writes_left = Some(count);
    }

    /// Every line written so far, terminators included.
    pub fn written(&self) -> Vec<String> {
        lock(&self.script).written.clone()
    }

    pub fn pending_replies(&self) -> usize {
        lock(&self.script).replies.len()
    }
}

impl Transport for MockTransport {
    fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        let mut script = lock(&self.script);
        match script.writes_left {
            Some(0) => {
                return Err(TransportError::Write(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "mock write failure",
                )));
            }
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        script.written.push(written_line(line));
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        match lock(&self.script).replies.pop_front() {
            Some(Reply::Line(line)) => Ok(strip_terminator(line.into_bytes())),
            Some(Reply::Timeout) | None => Err(TransportError::ReadTimeout(timeout)),
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

// =============================================================================
// SimulatedController - behavioural controller model
// =============================================================================

/// Pulses a jogging axis travels per status2 poll.
const JOG_STEP: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Loaded {
    Relative(i64),
    Absolute(i64),
    Jog(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    /// Travelling to `target`; reports busy for `remaining` more status2 polls
    To { target: i64, remaining: u32 },
    Jog(Direction),
}

#[derive(Debug, Clone, Copy)]
struct SimAxis {
    position: i64,
    loaded: Option<Loaded>,
    motion: Option<Motion>,
    energized: bool,
    speed: SpeedProfile,
}

impl Default for SimAxis {
    fn default() -> Self {
        Self {
            position: 0,
            loaded: None,
            motion: None,
            energized: true,
            speed: SpeedProfile::default(),
        }
    }
}

#[derive(Debug)]
struct SimState {
    model: ControllerModel,
    axes: [SimAxis; 2],
    settle_polls: u32,
    last_ack: CommandAck,
    outputs: u8,
    inputs: u8,
    rom_version: String,
    revision: String,
    outbox: VecDeque<String>,
    written: Vec<String>,
}

impl SimState {
    fn axis_count(&self) -> usize {
        self.model.axis_count()
    }

    fn any_busy(&self) -> bool {
        self.axes[..self.axis_count()]
            .iter()
            .any(|axis| axis.motion.is_some())
    }

    fn selected(&self, select: AxisSelect) -> Vec<usize> {
        match select {
            AxisSelect::Single(axis) => vec![axis.slot()],
            AxisSelect::All => (0..self.axis_count()).collect(),
        }
    }

    fn per_axis<T: Copy>(&self, target: PerAxis<T>) -> Vec<(usize, T)> {
        match target {
            PerAxis::Single(axis, value) => vec![(axis.slot(), value)],
            PerAxis::Both(v1, v2) => vec![(0, v1), (1, v2)],
        }
    }

    fn start_travel(&mut self, slot: usize, target: i64) {
        let settle_polls = self.settle_polls;
        let axis = &mut self.axes[slot];
        if settle_polls == 0 {
            axis.position = target;
            axis.motion = None;
        } else {
            axis.motion = Some(Motion::To {
                target,
                remaining: settle_polls,
            });
        }
    }

    /// Advance every moving axis by one poll.
    fn tick(&mut self) {
        for axis in &mut self.axes {
            match axis.motion {
                Some(Motion::To { target, remaining }) if remaining <= 1 => {
                    axis.position = target;
                    axis.motion = None;
                }
                Some(Motion::To { target, remaining }) => {
                    axis.motion = Some(Motion::To {
                        target,
                        remaining: remaining - 1,
                    });
                }
                Some(Motion::Jog(direction)) => {
                    let step = match direction {
                        Direction::Plus => JOG_STEP,
                        Direction::Minus => -JOG_STEP,
                    };
                    axis.position = (axis.position + step)
                        .clamp(-(MAX_PULSE_MAGNITUDE as i64), MAX_PULSE_MAGNITUDE as i64);
                }
                None => {}
            }
        }
    }

    fn motion_state(&self, slot: usize) -> MotionState {
        if self.axes[slot].motion.is_some() {
            MotionState::Moving
        } else {
            MotionState::Stopped
        }
    }

    fn status1(&self) -> Status1 {
        let motion = if self.any_busy() {
            MotionState::Moving
        } else {
            MotionState::Stopped
        };
        Status1 {
            position1: self.axes[0].position,
            position2: (self.model == ControllerModel::DualAxis).then_some(self.axes[1].position),
            ack: self.last_ack,
            stop: StopCondition::Normal,
            motion,
        }
    }

    fn status2(&mut self) -> Status2 {
        let status = Status2 {
            axis1: self.motion_state(0),
            axis2: (self.model == ControllerModel::DualAxis).then(|| self.motion_state(1)),
        };
        self.tick();
        status
    }

    fn stop(&mut self, slots: &[usize]) {
        for &slot in slots {
            self.axes[slot].motion = None;
            self.axes[slot].loaded = None;
        }
    }

    /// Apply one command and return whether it is accepted.
    fn execute(&mut self, command: Command) -> bool {
        // A moving controller only takes stops and queries
        let allowed_while_busy = matches!(
            command,
            Command::DecelerateStop(_) | Command::ImmediateStop
        ) || command.is_query();
        if self.any_busy() && !allowed_while_busy {
            return false;
        }

        match command {
            Command::MoveRelative(target) => {
                for (slot, delta) in self.per_axis(target) {
                    self.axes[slot].loaded = Some(Loaded::Relative(delta));
                }
                true
            }
            Command::MoveAbsolute(target) => {
                for (slot, position) in self.per_axis(target) {
                    self.axes[slot].loaded = Some(Loaded::Absolute(position));
                }
                true
            }
            Command::Jog(target) => {
                for (slot, direction) in self.per_axis(target) {
                    self.axes[slot].loaded = Some(Loaded::Jog(direction));
                }
                true
            }
            Command::Drive => self.drive(),
            Command::ReturnOrigin(target) => {
                let slots: Vec<usize> = self.per_axis(target).into_iter().map(|(s, _)| s).collect();
                self.seek_origin(&slots)
            }
            Command::Home(select) => {
                let slots = self.selected(select);
                self.seek_origin(&slots)
            }
            Command::DecelerateStop(select) => {
                let slots = self.selected(select);
                self.stop(&slots);
                true
            }
            Command::ImmediateStop => {
                self.stop(&[0, 1]);
                true
            }
            Command::SetLogicalZero(select) => {
                for slot in self.selected(select) {
                    self.axes[slot].position = 0;
                }
                true
            }
            Command::SetSpeed(select, profile) => {
                for slot in self.selected(select) {
                    self.axes[slot].speed = profile;
                }
                true
            }
            Command::SetSpeedPair { axis1, axis2, .. } => {
                self.axes[0].speed = axis1;
                self.axes[1].speed = axis2;
                true
            }
            Command::Energize(target) => {
                for (slot, on) in self.per_axis(target) {
                    self.axes[slot].energized = on;
                }
                true
            }
            Command::IoOutput(bits) => {
                self.outputs = bits;
                true
            }
            Command::QueryStatus1
            | Command::QueryStatus2
            | Command::QueryVersion(_)
            | Command::IoInput => true,
        }
    }

    fn drive(&mut self) -> bool {
        let slots: Vec<usize> = (0..self.axis_count())
            .filter(|slot| self.axes[*slot].loaded.is_some())
            .collect();
        if slots.is_empty() || slots.iter().any(|slot| !self.axes[*slot].energized) {
            return false;
        }

        // Resolve every target first so a rejected axis leaves no partial motion
        let mut travels = Vec::with_capacity(slots.len());
        for slot in slots {
            let axis = self.axes[slot];
            let target = match axis.loaded {
                Some(Loaded::Relative(delta)) => axis.position.checked_add(delta),
                Some(Loaded::Absolute(position)) => Some(position),
                Some(Loaded::Jog(_)) | None => {
                    travels.push((slot, None));
                    continue;
                }
            };
            match target {
                Some(target) if target.unsigned_abs() <= MAX_PULSE_MAGNITUDE => {
                    travels.push((slot, Some(target)));
                }
                _ => return false,
            }
        }

        for (slot, target) in travels {
            match (target, self.axes[slot].loaded.take()) {
                (Some(target), _) => self.start_travel(slot, target),
                (None, Some(Loaded::Jog(direction))) => {
                    self.axes[slot].motion = Some(Motion::Jog(direction));
                }
                (None, _) => {}
            }
        }
        true
    }

    fn seek_origin(&mut self, slots: &[usize]) -> bool {
        if slots.iter().any(|slot| !self.axes[*slot].energized) {
            return false;
        }
        for &slot in slots {
            self.axes[slot].loaded = None;
            self.start_travel(slot, 0);
        }
        true
    }

    fn query_reply(&mut self, command: &Command) -> Option<String> {
        match command {
            Command::QueryStatus1 => Some(self.status1().encode()),
            Command::QueryStatus2 => Some(self.status2().encode()),
            Command::QueryVersion(VersionKind::Rom) => Some(self.rom_version.clone()),
            Command::QueryVersion(VersionKind::Revision) => Some(self.revision.clone()),
            Command::IoInput => Some(self.inputs.to_string()),
            _ => None,
        }
    }

    fn handle_line(&mut self, line: &str) {
        let ack = match Command::parse(line, self.model) {
            Ok(command) if command.is_query() => {
                if let Some(reply) = self.query_reply(&command) {
                    self.outbox.push_back(reply);
                }
                return;
            }
            Ok(command) => {
                if self.execute(command) {
                    CommandAck::Accepted
                } else {
                    CommandAck::Rejected
                }
            }
            Err(err) => {
                trace!(%err, "simulator could not parse command");
                CommandAck::Rejected
            }
        };

        self.last_ack = ack;
        // Dual-axis controllers report acceptance through the next `Q:` only
        if self.model == ControllerModel::SingleAxis {
            self.outbox.push_back(ack.encode_line().to_string());
        }
    }
}

/// In-memory GSC controller.
///
/// Moves complete after `settle_polls` busy status2 replies (0 means a move finishes as soon
/// as it is driven). Busy axes reject everything except stops and queries, `G` with nothing
/// loaded is rejected, and so is driving a de-energized motor.
///
/// # Example
///
/// ```
/// use optosigma::hardware::mock::SimulatedController;
/// use optosigma::hardware::session::ControllerSession;
/// use optosigma::hardware::types::{Axis, ControllerModel};
///
/// let sim = SimulatedController::new(ControllerModel::DualAxis);
/// let session = ControllerSession::new(sim.clone(), ControllerModel::DualAxis);
/// session.set_position(Axis::Two, 1200).unwrap();
/// assert_eq!(sim.position(Axis::Two), 1200);
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedController {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedController {
    pub fn new(model: ControllerModel) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                model,
                axes: [SimAxis::default(); 2],
                settle_polls: 0,
                last_ack: CommandAck::Accepted,
                outputs: 0,
                inputs: 0,
                rom_version: "V1.00".to_string(),
                revision: "001".to_string(),
                outbox: VecDeque::new(),
                written: Vec::new(),
            })),
        }
    }

    /// Number of busy status2 replies before a move arrives.
    pub fn with_settle_polls(self, polls: u32) -> Self {
        self.set_settle_polls(polls);
        self
    }

    pub fn set_settle_polls(&self, polls: u32) {
        lock(&self.state).settle_polls = polls;
    }

    pub fn model(&self) -> ControllerModel {
        lock(&self.state).model
    }

    pub fn position(&self, axis: Axis) -> i64 {
        lock(&self.state).axes[axis.slot()].position
    }

    /// Place the stage without any command traffic.
    pub fn set_position(&self, axis: Axis, position: i64) {
        lock(&self.state).axes[axis.slot()].position = position;
    }

    pub fn is_moving(&self, axis: Axis) -> bool {
        lock(&self.state).axes[axis.slot()].motion.is_some()
    }

    pub fn is_energized(&self, axis: Axis) -> bool {
        lock(&self.state).axes[axis.slot()].energized
    }

    pub fn speed(&self, axis: Axis) -> SpeedProfile {
        lock(&self.state).axes[axis.slot()].speed
    }

    pub fn outputs(&self) -> u8 {
        lock(&self.state).outputs
    }

    pub fn set_inputs(&self, bits: u8) {
        lock(&self.state).inputs = bits & 0x0F;
    }

    /// Every line written so far, terminators included.
    pub fn written(&self) -> Vec<String> {
        lock(&self.state).written.clone()
    }

    /// Number of written lines equal to `line` (terminator excluded).
    pub fn count_written(&self, line: &str) -> usize {
        lock(&self.state)
            .written
            .iter()
            .filter(|written| written.trim_end() == line)
            .count()
    }
}

impl Transport for SimulatedController {
    fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        let text = written_line(line);
        let mut state = lock(&self.state);
        state.written.push(text.clone());
        state.handle_line(&text);
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        lock(&self.state)
            .outbox
            .pop_front()
            .map(String::into_bytes)
            .ok_or(TransportError::ReadTimeout(timeout))
    }

    fn describe(&self) -> String {
        format!("simulated {}", self.model())
    }
}
