//! Controller session: the single gateway to one controller's transport.
//!
//! A `ControllerSession` exclusively owns its `Transport` and is the only component that writes
//! to or reads from it. Every public operation holds the session lock for all of its
//! request/response exchanges, so two operations can never interleave on the half-duplex line
//! even when several [`AxisView`]s share the session. Operations that load a move and then
//! start it (`set_position`, `increment_position`, `start_jog`) send both commands under one
//! lock hold, so another view cannot load its own move in between and have it started by this
//! operation's `G`.
//!
//! Positions are never cached. `position()` always asks the controller, and `set_position()`
//! sends a hardware-native absolute move rather than a relative move computed from a
//! previously read value.
//!
//! # Example Usage
//!
//! ```no_run
//! use optosigma::config::SessionConfig;
//! use optosigma::hardware::session::ControllerSession;
//! use optosigma::hardware::types::{Axis, ControllerModel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new(ControllerModel::DualAxis, "/dev/ttyUSB0");
//! let session = ControllerSession::open(&config)?;
//!
//! let x = session.axis(Axis::One)?;
//! let y = session.axis(Axis::Two)?;
//! x.move_absolute_pulses(500)?;
//! y.move_relative_pulses(-200)?;
//! println!("x = {}, y = {}", x.position()?, y.position()?);
//! # Ok(())
//! # }
//! ```

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, instrument, trace, warn};

use crate::config::{MotionSettings, SessionConfig};
use crate::error::{StageError, StageResult};
use crate::hardware::axis::AxisView;
use crate::hardware::command::{Command, PerAxis, PulseFormat, VersionKind};
use crate::hardware::poller::{self, MotionReport};
use crate::hardware::response::{self, CommandAck, Status1, Status2};
use crate::hardware::transport::Transport;
use crate::hardware::types::{
    AckStyle, Axis, AxisSelect, ControllerModel, Direction, SpeedProfile, SpeedRange,
};

/// Mutable state guarded by the session lock.
struct Channel<T> {
    transport: T,
    /// Last accepted speed profile per axis, re-sent by dual-axis speed commands
    speeds: [SpeedProfile; 2],
    speed_range: SpeedRange,
}

impl<T: Transport> Channel<T> {
    fn write(&mut self, line: &str) -> StageResult<()> {
        trace!(line = %line.escape_default(), "tx");
        self.transport.write_line(line.as_bytes())?;
        Ok(())
    }

    fn read(&mut self, timeout: Duration) -> StageResult<String> {
        let bytes = self.transport.read_line(timeout)?;
        let line = String::from_utf8_lossy(&bytes).into_owned();
        trace!(line = %line.escape_default(), "rx");
        Ok(line)
    }
}

/// One open connection to a GSC controller.
pub struct ControllerSession<T: Transport> {
    model: ControllerModel,
    pulse_format: PulseFormat,
    read_timeout: Duration,
    motion: MotionSettings,
    channel: Mutex<Channel<T>>,
}

#[cfg(feature = "instrument_serial")]
impl ControllerSession<crate::hardware::transport::SerialTransport> {
    /// Open the serial port named in `config` and wrap it in a session.
    ///
    /// # Errors
    /// Returns `InvalidParameter` for an invalid configuration and
    /// `Transport(PortUnavailable)` if the port cannot be opened.
    pub fn open(config: &SessionConfig) -> StageResult<Self> {
        config.validate()?;
        let transport = crate::hardware::transport::SerialTransport::open(&config.port)?;
        Ok(Self::with_config(transport, config))
    }
}

impl<T: Transport> ControllerSession<T> {
    /// Wrap `transport` with default timing for `model`.
    pub fn new(transport: T, model: ControllerModel) -> Self {
        let label = transport.describe();
        Self::with_config(transport, &SessionConfig::new(model, label))
    }

    /// Wrap `transport` using the model, timing and dialect from `config`.
    pub fn with_config(transport: T, config: &SessionConfig) -> Self {
        info!(
            model = %config.model,
            transport = %transport.describe(),
            "Controller session created"
        );
        Self {
            model: config.model,
            pulse_format: config.pulse_format,
            read_timeout: config.port.read_timeout,
            motion: config.motion.clone(),
            channel: Mutex::new(Channel {
                transport,
                speeds: [SpeedProfile::default(); 2],
                speed_range: SpeedRange::default(),
            }),
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_pulse_format(mut self, format: PulseFormat) -> Self {
        self.pulse_format = format;
        self
    }

    pub fn with_motion(mut self, motion: MotionSettings) -> Self {
        self.motion = motion;
        self
    }

    pub fn model(&self) -> ControllerModel {
        self.model
    }

    pub fn motion_settings(&self) -> &MotionSettings {
        &self.motion
    }

    /// Release the transport, ending the session.
    pub fn into_transport(self) -> StageResult<T> {
        self.channel
            .into_inner()
            .map(|channel| channel.transport)
            .map_err(|_| StageError::SessionPoisoned)
    }

    /// Axis-scoped handle bound to this session.
    ///
    /// # Errors
    /// Returns `InvalidAxis` if `axis` does not exist on this model.
    pub fn axis(&self, axis: Axis) -> StageResult<AxisView<'_, T>> {
        self.model.check_axis(axis)?;
        Ok(AxisView::new(self, axis))
    }

    fn lock(&self) -> StageResult<MutexGuard<'_, Channel<T>>> {
        self.channel.lock().map_err(|_| StageError::SessionPoisoned)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Send a command that has no data response and check its acknowledgement.
    ///
    /// Single-axis controllers answer with an `OK`/`NG` line. Dual-axis controllers stay
    /// silent, so acceptance is read from ACK1 of a follow-up `Q:` within the same
    /// transaction.
    ///
    /// # Errors
    /// - `InvalidAxis` / `InvalidParameter` / `InvalidSpeedProfile` before any I/O
    /// - `Transport` if the write fails or no line arrives in time
    /// - `Decode` if the acknowledgement is malformed
    /// - `CommandRejected` if the controller refused the command
    #[instrument(level = "debug", skip(self), fields(model = %self.model))]
    pub fn send(&self, command: &Command) -> StageResult<()> {
        if command.is_query() {
            return Err(StageError::InvalidParameter(format!(
                "{command:?} is a query, not an acknowledged command"
            )));
        }
        let line = command.encode(self.model, self.pulse_format)?;
        let mut channel = self.lock()?;
        self.send_locked(&mut channel, &line)
    }

    fn send_locked(&self, channel: &mut Channel<T>, line: &str) -> StageResult<()> {
        channel.write(line)?;

        let ack = match self.model.ack_style() {
            AckStyle::Line => {
                let reply = channel.read(self.read_timeout)?;
                CommandAck::decode(&reply)?
            }
            AckStyle::StatusQuery => {
                let query = Command::QueryStatus1.encode(self.model, self.pulse_format)?;
                channel.write(&query)?;
                let reply = channel.read(self.read_timeout)?;
                Status1::decode(&reply, self.model)?.ack
            }
        };

        let command = line.trim_end().to_string();
        match ack {
            CommandAck::Accepted => {
                debug!(%command, "Command accepted");
                Ok(())
            }
            CommandAck::Rejected => {
                warn!(%command, "Controller rejected command");
                Err(StageError::CommandRejected { command })
            }
        }
    }

    /// Load a move or jog and start it without releasing the lock in between.
    fn load_and_drive(&self, load: &Command) -> StageResult<()> {
        let load = load.encode(self.model, self.pulse_format)?;
        let drive = Command::Drive.encode(self.model, self.pulse_format)?;
        let mut channel = self.lock()?;
        self.send_locked(&mut channel, &load)?;
        self.send_locked(&mut channel, &drive)
    }

    /// Send a query and return its raw reply line.
    fn query(&self, command: &Command) -> StageResult<String> {
        let line = command.encode(self.model, self.pulse_format)?;
        let mut channel = self.lock()?;
        channel.write(&line)?;
        channel.read(self.read_timeout)
    }

    /// `Q:` positions, last-command acknowledgement, limit state and busy flag.
    #[instrument(level = "trace", skip(self))]
    pub fn query_status1(&self) -> StageResult<Status1> {
        let reply = self.query(&Command::QueryStatus1)?;
        let status = Status1::decode(&reply, self.model)?;
        debug!(?status, "status1");
        Ok(status)
    }

    /// `!:` per-axis busy flags.
    #[instrument(level = "trace", skip(self))]
    pub fn query_status2(&self) -> StageResult<Status2> {
        let reply = self.query(&Command::QueryStatus2)?;
        let status = Status2::decode(&reply, self.model)?;
        debug!(?status, "status2");
        Ok(status)
    }

    /// `?:V` ROM version or `?:-` revision number.
    pub fn query_version(&self, kind: VersionKind) -> StageResult<String> {
        let reply = self.query(&Command::QueryVersion(kind))?;
        Ok(response::decode_version(&reply)?)
    }

    // =========================================================================
    // Motion commands
    // =========================================================================

    /// Load a relative move for `axis`; `drive()` starts it.
    pub fn move_relative(&self, axis: Axis, delta: i64) -> StageResult<()> {
        self.send(&Command::MoveRelative(PerAxis::Single(axis, delta)))
    }

    /// Load relative moves for both axes of a dual-axis controller.
    pub fn move_relative_both(&self, delta1: i64, delta2: i64) -> StageResult<()> {
        self.send(&Command::MoveRelative(PerAxis::Both(delta1, delta2)))
    }

    /// Load an absolute move for `axis`; `drive()` starts it.
    pub fn move_absolute(&self, axis: Axis, target: i64) -> StageResult<()> {
        self.send(&Command::MoveAbsolute(PerAxis::Single(axis, target)))
    }

    pub fn move_absolute_both(&self, target1: i64, target2: i64) -> StageResult<()> {
        self.send(&Command::MoveAbsolute(PerAxis::Both(target1, target2)))
    }

    /// Load a constant-speed jog; it runs after `drive()` until stopped or a limit is hit.
    pub fn jog(&self, axis: Axis, direction: Direction) -> StageResult<()> {
        self.send(&Command::Jog(PerAxis::Single(axis, direction)))
    }

    pub fn jog_both(&self, direction1: Direction, direction2: Direction) -> StageResult<()> {
        self.send(&Command::Jog(PerAxis::Both(direction1, direction2)))
    }

    /// Load a jog for `axis` and start it (`J` then `G`).
    pub fn start_jog(&self, axis: Axis, direction: Direction) -> StageResult<()> {
        self.load_and_drive(&Command::Jog(PerAxis::Single(axis, direction)))
    }

    /// Start the loaded move or jog.
    pub fn drive(&self) -> StageResult<()> {
        self.send(&Command::Drive)
    }

    pub fn decelerate_stop(&self, select: AxisSelect) -> StageResult<()> {
        self.send(&Command::DecelerateStop(select))
    }

    /// Stop every axis at once, without deceleration.
    pub fn immediate_stop(&self) -> StageResult<()> {
        self.send(&Command::ImmediateStop)
    }

    /// Search the mechanical origin.
    ///
    /// Dual-axis controllers search in `direction` (for `All`, both axes use it).
    /// Single-axis controllers take their search direction from switch settings, so
    /// `direction` is not transmitted.
    pub fn return_origin(&self, direction: Direction, select: AxisSelect) -> StageResult<()> {
        let command = match (self.model, select) {
            (ControllerModel::SingleAxis, select) => Command::Home(select),
            (ControllerModel::DualAxis, AxisSelect::Single(axis)) => {
                Command::ReturnOrigin(PerAxis::Single(axis, direction))
            }
            (ControllerModel::DualAxis, AxisSelect::All) => {
                Command::ReturnOrigin(PerAxis::Both(direction, direction))
            }
        };
        self.send(&command)
    }

    /// Search the mechanical origin of both axes with independent directions.
    pub fn return_origin_both(
        &self,
        direction1: Direction,
        direction2: Direction,
    ) -> StageResult<()> {
        self.send(&Command::ReturnOrigin(PerAxis::Both(direction1, direction2)))
    }

    /// Make the current position the logical origin (position reads 0 afterwards).
    pub fn set_logical_zero(&self, select: AxisSelect) -> StageResult<()> {
        self.send(&Command::SetLogicalZero(select))
    }

    // =========================================================================
    // Configuration commands
    // =========================================================================

    /// Change the speed profile of one axis or of every axis.
    ///
    /// Dual-axis controllers always receive both axes' profiles, so the profile last
    /// accepted for the other axis is re-sent unchanged. The remembered profiles only change
    /// once the controller has accepted the command.
    ///
    /// # Errors
    /// Returns `InvalidSpeedProfile` (before any I/O) when `min_pps > max_pps`.
    pub fn set_speed(&self, profile: SpeedProfile, select: AxisSelect) -> StageResult<()> {
        profile.validate()?;
        self.model.check_select(select)?;

        let mut channel = self.lock()?;
        let mut speeds = channel.speeds;
        match select {
            AxisSelect::Single(axis) => speeds[axis.slot()] = profile,
            AxisSelect::All => speeds = [profile; 2],
        }
        let range = profile.range.unwrap_or(channel.speed_range);

        let command = match self.model {
            ControllerModel::SingleAxis => Command::SetSpeed(select, profile),
            ControllerModel::DualAxis => Command::SetSpeedPair {
                range,
                axis1: speeds[0],
                axis2: speeds[1],
            },
        };
        let line = command.encode(self.model, self.pulse_format)?;
        self.send_locked(&mut channel, &line)?;

        channel.speeds = speeds;
        channel.speed_range = range;
        Ok(())
    }

    /// Set both axes' profiles of a dual-axis controller in one command.
    pub fn set_speed_both(
        &self,
        range: SpeedRange,
        axis1: SpeedProfile,
        axis2: SpeedProfile,
    ) -> StageResult<()> {
        let command = Command::SetSpeedPair {
            range,
            axis1,
            axis2,
        };
        let line = command.encode(self.model, self.pulse_format)?;

        let mut channel = self.lock()?;
        self.send_locked(&mut channel, &line)?;
        channel.speeds = [axis1, axis2];
        channel.speed_range = range;
        Ok(())
    }

    /// Profile last accepted by the controller for `axis` (power-on default until changed).
    pub fn speed_profile(&self, axis: Axis) -> StageResult<SpeedProfile> {
        self.model.check_axis(axis)?;
        Ok(self.lock()?.speeds[axis.slot()])
    }

    /// Switch motor excitation on or off.
    pub fn energize_motor(&self, enable: bool, select: AxisSelect) -> StageResult<()> {
        let target = match (self.model, select) {
            (_, AxisSelect::Single(axis)) => PerAxis::Single(axis, enable),
            (ControllerModel::SingleAxis, AxisSelect::All) => PerAxis::Single(Axis::One, enable),
            (ControllerModel::DualAxis, AxisSelect::All) => PerAxis::Both(enable, enable),
        };
        self.send(&Command::Energize(target))
    }

    /// Drive the four general-purpose outputs (`0..=15`).
    pub fn io_output(&self, bits: u8) -> StageResult<()> {
        self.send(&Command::IoOutput(bits))
    }

    /// Read the four general-purpose inputs.
    pub fn io_input(&self) -> StageResult<u8> {
        let reply = self.query(&Command::IoInput)?;
        Ok(response::decode_io_input(&reply)?)
    }

    // =========================================================================
    // Position and readiness
    // =========================================================================

    /// Current position of `axis`, read fresh from the controller.
    pub fn position(&self, axis: Axis) -> StageResult<i64> {
        self.model.check_axis(axis)?;
        let status = self.query_status1()?;
        status.position(axis).ok_or_else(|| StageError::InvalidAxis {
            axis: axis.index(),
            model: self.model,
        })
    }

    /// Move `axis` to `target` with a hardware absolute move (`A` then `G`).
    pub fn set_position(&self, axis: Axis, target: i64) -> StageResult<()> {
        self.load_and_drive(&Command::MoveAbsolute(PerAxis::Single(axis, target)))
    }

    /// Move `axis` by `delta` with a hardware relative move (`M` then `G`).
    pub fn increment_position(&self, axis: Axis, delta: i64) -> StageResult<()> {
        self.load_and_drive(&Command::MoveRelative(PerAxis::Single(axis, delta)))
    }

    /// Whether `axis` is at rest according to a fresh status2 query.
    pub fn is_ready(&self, axis: Axis) -> StageResult<bool> {
        self.model.check_axis(axis)?;
        Ok(self.query_status2()?.is_ready(axis))
    }

    /// Block until `axis` reports stopped, using the session's motion settings.
    pub fn wait_until_stopped(&self, axis: Axis) -> StageResult<MotionReport> {
        poller::wait_until_stopped(
            self,
            axis,
            self.motion.poll_interval,
            self.motion.wait_timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, TransportError};
    use crate::hardware::mock::MockTransport;

    fn single() -> (ControllerSession<MockTransport>, MockTransport) {
        let mock = MockTransport::new();
        let session = ControllerSession::new(mock.clone(), ControllerModel::SingleAxis)
            .with_read_timeout(Duration::from_millis(10));
        (session, mock)
    }

    fn dual() -> (ControllerSession<MockTransport>, MockTransport) {
        let mock = MockTransport::new();
        let session = ControllerSession::new(mock.clone(), ControllerModel::DualAxis)
            .with_read_timeout(Duration::from_millis(10));
        (session, mock)
    }

    #[test]
    fn test_send_reads_ok_line() {
        let (session, mock) = single();
        mock.push_reply("OK");
        session.move_absolute(Axis::One, 500).unwrap();
        assert_eq!(mock.written(), vec!["A:1+00500\r\n"]);
    }

    #[test]
    fn test_send_rejected_line() {
        let (session, mock) = single();
        mock.push_reply("NG");
        let err = session.drive().unwrap_err();
        assert!(matches!(err, StageError::CommandRejected { ref command } if command == "G:"));
    }

    #[test]
    fn test_dual_axis_ack_from_status_query() {
        let (session, mock) = dual();
        mock.push_reply("         0,         0,K,K,R");
        session.move_relative(Axis::Two, -200).unwrap();
        assert_eq!(mock.written(), vec!["M:2-00200\r\n", "Q:\r\n"]);

        mock.push_reply("         0,         0,X,K,B");
        assert!(matches!(
            session.move_relative(Axis::Two, 10),
            Err(StageError::CommandRejected { .. })
        ));
    }

    #[test]
    fn test_send_refuses_queries() {
        let (session, mock) = single();
        assert!(session.send(&Command::QueryStatus1).is_err());
        assert!(mock.written().is_empty());
    }

    #[test]
    fn test_read_timeout_propagates() {
        let (session, mock) = single();
        let err = session.immediate_stop().unwrap_err();
        assert!(matches!(
            err,
            StageError::Transport(TransportError::ReadTimeout(_))
        ));
        assert_eq!(mock.written(), vec!["L:E\r\n"]);
    }

    #[test]
    fn test_malformed_ack_is_decode_error() {
        let (session, mock) = single();
        mock.push_reply("??");
        assert!(matches!(
            session.set_logical_zero(AxisSelect::All),
            Err(StageError::Decode(DecodeError::Malformed { .. }))
        ));
    }

    #[test]
    fn test_position_is_never_cached() {
        let (session, mock) = single();
        mock.push_reply("       100,K,K,R");
        mock.push_reply("       250,K,K,R");
        assert_eq!(session.position(Axis::One).unwrap(), 100);
        assert_eq!(session.position(Axis::One).unwrap(), 250);
        assert_eq!(mock.written(), vec!["Q:\r\n", "Q:\r\n"]);
    }

    #[test]
    fn test_set_position_uses_absolute_move() {
        let (session, mock) = single();
        mock.push_reply("OK");
        mock.push_reply("OK");
        session.set_position(Axis::One, -42).unwrap();
        assert_eq!(mock.written(), vec!["A:1-00042\r\n", "G:\r\n"]);
    }

    #[test]
    fn test_increment_position_uses_relative_move() {
        let (session, mock) = single();
        mock.push_reply("OK");
        mock.push_reply("OK");
        session.increment_position(Axis::One, 7).unwrap();
        assert_eq!(mock.written(), vec!["M:1+00007\r\n", "G:\r\n"]);
    }

    #[test]
    fn test_rejected_load_never_drives() {
        let (session, mock) = single();
        mock.push_reply("NG");
        assert!(matches!(
            session.increment_position(Axis::One, 7),
            Err(StageError::CommandRejected { .. })
        ));
        assert_eq!(mock.written(), vec!["M:1+00007\r\n"]);
    }

    #[test]
    fn test_start_jog_loads_and_drives() {
        let (session, mock) = dual();
        mock.push_reply("         0,         0,K,K,R");
        mock.push_reply("         0,         0,K,K,B");
        session.start_jog(Axis::Two, Direction::Minus).unwrap();
        assert_eq!(mock.written(), vec!["J:2-\r\n", "Q:\r\n", "G\r\n", "Q:\r\n"]);
    }

    #[test]
    fn test_write_failure_is_transport_error() {
        let (session, mock) = single();
        mock.push_reply("OK");
        mock.fail_writes(true);
        assert!(matches!(
            session.send(&Command::Drive),
            Err(StageError::Transport(TransportError::Write(_)))
        ));
        assert!(mock.written().is_empty());
        assert_eq!(mock.pending_replies(), 1);
    }

    #[test]
    fn test_write_failure_on_dual_axis_ack_path() {
        let (session, mock) = dual();
        mock.push_reply("         0,         0,K,K,R");
        mock.fail_writes(true);
        let slow = SpeedProfile::new(100, 1000, 100).unwrap();
        assert!(matches!(
            session.set_speed(slow, AxisSelect::Single(Axis::One)),
            Err(StageError::Transport(TransportError::Write(_)))
        ));
        assert!(matches!(
            session.set_position(Axis::Two, 10),
            Err(StageError::Transport(TransportError::Write(_)))
        ));
        assert!(mock.written().is_empty());
        assert_eq!(mock.pending_replies(), 1);
        assert_eq!(session.speed_profile(Axis::One).unwrap(), SpeedProfile::default());
    }

    #[test]
    fn test_status_query_write_failure_after_command() {
        let (session, mock) = dual();
        mock.push_reply("         0,         0,K,K,R");
        mock.fail_writes_after(1);
        let slow = SpeedProfile::new(100, 1000, 100).unwrap();
        assert!(matches!(
            session.set_speed(slow, AxisSelect::All),
            Err(StageError::Transport(TransportError::Write(_)))
        ));
        assert_eq!(mock.written(), vec!["D:2S100F1000R100S100F1000R100\r\n"]);
        assert_eq!(mock.pending_replies(), 1);
        assert_eq!(session.speed_profile(Axis::Two).unwrap(), SpeedProfile::default());
    }

    #[test]
    fn test_return_origin_by_model() {
        let (session, mock) = single();
        mock.push_reply("OK");
        session
            .return_origin(Direction::Plus, AxisSelect::Single(Axis::One))
            .unwrap();
        assert_eq!(mock.written(), vec!["H:1\r\n"]);

        let (session, mock) = dual();
        mock.push_reply("         0,         0,K,K,B");
        session.return_origin(Direction::Minus, AxisSelect::All).unwrap();
        assert_eq!(mock.written()[0], "H:W--\r\n");
    }

    #[test]
    fn test_dual_speed_keeps_other_axis_profile() {
        let (session, mock) = dual();
        let slow = SpeedProfile::new(100, 1000, 100).unwrap();
        mock.push_reply("         0,         0,K,K,R");
        session.set_speed(slow, AxisSelect::Single(Axis::Two)).unwrap();
        assert_eq!(mock.written()[0], "D:2S500F5000R200S100F1000R100\r\n");
        assert_eq!(session.speed_profile(Axis::Two).unwrap(), slow);
        assert_eq!(session.speed_profile(Axis::One).unwrap(), SpeedProfile::default());
    }

    #[test]
    fn test_rejected_speed_change_is_not_remembered() {
        let (session, mock) = dual();
        let fast = SpeedProfile::new(1000, 20000, 50).unwrap();
        mock.push_reply("         0,         0,X,K,R");
        assert!(session.set_speed(fast, AxisSelect::All).is_err());
        assert_eq!(session.speed_profile(Axis::One).unwrap(), SpeedProfile::default());
    }

    #[test]
    fn test_inverted_speed_profile_never_written() {
        let (session, mock) = single();
        let inverted = SpeedProfile {
            min_pps: 5000,
            max_pps: 500,
            accel_ms: 200,
            range: None,
        };
        assert!(matches!(
            session.set_speed(inverted, AxisSelect::All),
            Err(StageError::InvalidSpeedProfile { min: 5000, max: 500 })
        ));
        assert!(mock.written().is_empty());
    }

    #[test]
    fn test_version_and_io() {
        let (session, mock) = single();
        mock.push_reply("V1.00");
        mock.push_reply("001");
        mock.push_reply("2");
        mock.push_reply("OK");
        assert_eq!(session.query_version(VersionKind::Rom).unwrap(), "V1.00");
        assert_eq!(session.query_version(VersionKind::Revision).unwrap(), "001");
        assert_eq!(session.io_input().unwrap(), 2);
        session.io_output(9).unwrap();
        assert_eq!(
            mock.written(),
            vec!["?:V\r\n", "?:-\r\n", "I:\r\n", "O:9\r\n"]
        );
    }

    #[test]
    fn test_energize_all_on_dual() {
        let (session, mock) = dual();
        mock.push_reply("         0,         0,K,K,R");
        session.energize_motor(false, AxisSelect::All).unwrap();
        assert_eq!(mock.written()[0], "C:W00\r\n");
    }

    #[test]
    fn test_axis_handle_validation() {
        let (session, _mock) = single();
        assert!(session.axis(Axis::One).is_ok());
        assert!(matches!(
            session.axis(Axis::Two),
            Err(StageError::InvalidAxis { axis: 2, .. })
        ));
    }
}
