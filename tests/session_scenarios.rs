//! Integration tests for controller sessions, axis views and the poller
//!
//! Exercises the public API end to end against `MockTransport` (exact wire traffic) and
//! `SimulatedController` (behaviour across several transactions).

use std::time::Duration;

use optosigma::config::{MotionSettings, SessionConfig};
use optosigma::error::{DecodeError, StageError, TransportError};
use optosigma::hardware::mock::{MockTransport, SimulatedController};
use optosigma::hardware::poller;
use optosigma::hardware::{
    Axis, AxisSelect, Command, ControllerModel, ControllerSession, Direction, PerAxis,
    PulseAxis, PulseFormat, ScaledAxis, SpeedProfile,
};
use tracing_test::traced_test;

const POLL: Duration = Duration::from_millis(1);

fn quick_config(model: ControllerModel, auto_wait: bool) -> SessionConfig {
    SessionConfig::new(model, "test").with_motion(MotionSettings {
        auto_wait,
        poll_interval: POLL,
        wait_timeout: Duration::from_secs(2),
    })
}

fn mock_session(
    model: ControllerModel,
    auto_wait: bool,
) -> (ControllerSession<MockTransport>, MockTransport) {
    let mock = MockTransport::new();
    let session = ControllerSession::with_config(mock.clone(), &quick_config(model, auto_wait))
        .with_read_timeout(Duration::from_millis(10));
    (session, mock)
}

// =============================================================================
// Wire-level scenarios
// =============================================================================

#[test]
fn test_absolute_move_then_position_and_ready() {
    let (session, mock) = mock_session(ControllerModel::SingleAxis, false);
    mock.push_reply("OK");
    mock.push_reply("OK");
    mock.push_reply("       500,K,K,R");
    mock.push_reply("R");

    let x = session.axis(Axis::One).unwrap();
    x.move_absolute_pulses(500).unwrap();
    assert_eq!(x.position().unwrap(), 500);
    assert!(x.is_ready().unwrap());

    assert_eq!(
        mock.written(),
        vec!["A:1+00500\r\n", "G:\r\n", "Q:\r\n", "!:\r\n"]
    );
}

#[test]
fn test_marked_pulse_format() {
    let mock = MockTransport::new();
    let config = quick_config(ControllerModel::SingleAxis, false)
        .with_pulse_format(PulseFormat::Marked);
    let session = ControllerSession::with_config(mock.clone(), &config);
    mock.push_reply("OK");
    session.move_absolute(Axis::One, 500).unwrap();
    assert_eq!(mock.written(), vec!["A:1+P500\r\n"]);
}

#[test]
fn test_wait_returns_after_exactly_four_queries() {
    let (session, mock) = mock_session(ControllerModel::SingleAxis, false);
    for reply in ["B", "B", "B", "R", "R"] {
        mock.push_reply(reply);
    }

    let report =
        poller::wait_until_stopped(&session, Axis::One, POLL, Duration::from_secs(1)).unwrap();
    assert_eq!(report.polls, 4);
    assert_eq!(mock.written().len(), 4);
    assert!(mock.written().iter().all(|line| line == "!:\r\n"));
    assert_eq!(mock.pending_replies(), 1);
}

#[test]
fn test_read_timeout_propagates_without_state_change() {
    let (session, mock) = mock_session(ControllerModel::DualAxis, false);
    mock.push_timeout();

    let profile = SpeedProfile::new(100, 900, 50).unwrap();
    let err = session
        .set_speed(profile, AxisSelect::Single(Axis::One))
        .unwrap_err();
    assert!(matches!(
        err,
        StageError::Transport(TransportError::ReadTimeout(_))
    ));
    assert!(!err.is_recoverable());
    assert_eq!(
        session.speed_profile(Axis::One).unwrap(),
        SpeedProfile::default()
    );

    // The next transaction starts clean
    mock.push_reply("         0,         0,K,K,R");
    assert_eq!(session.position(Axis::Two).unwrap(), 0);
}

#[test]
fn test_send_propagates_timeout() {
    let (session, mock) = mock_session(ControllerModel::SingleAxis, false);
    mock.push_timeout();
    assert!(matches!(
        session.send(&Command::Drive),
        Err(StageError::Transport(TransportError::ReadTimeout(_)))
    ));
}

#[test]
fn test_per_axis_readiness_from_one_status() {
    let (session, mock) = mock_session(ControllerModel::DualAxis, false);
    mock.push_reply("B,R");

    let status = session.query_status2().unwrap();
    let x = session.axis(Axis::One).unwrap();
    let y = session.axis(Axis::Two).unwrap();
    assert!(status.is_ready(y.axis()));
    assert!(!status.is_ready(x.axis()));
    assert_eq!(mock.written(), vec!["!:\r\n"]);

    mock.push_reply("B,R");
    mock.push_reply("B,R");
    assert!(y.is_ready().unwrap());
    assert!(!x.is_ready().unwrap());
}

#[test]
fn test_invalid_axis_writes_nothing() {
    let (session, mock) = mock_session(ControllerModel::SingleAxis, false);
    let two = Axis::Two;
    let profile = SpeedProfile::default();

    let results = [
        session.move_relative(two, 1),
        session.move_absolute(two, 1),
        session.jog(two, Direction::Plus),
        session.decelerate_stop(AxisSelect::Single(two)),
        session.return_origin(Direction::Minus, AxisSelect::Single(two)),
        session.set_logical_zero(AxisSelect::Single(two)),
        session.set_speed(profile, AxisSelect::Single(two)),
        session.energize_motor(true, AxisSelect::Single(two)),
        session.set_position(two, 10),
        session.increment_position(two, 10),
        session.move_relative_both(1, 1),
    ];
    for result in results {
        assert!(matches!(result, Err(StageError::InvalidAxis { axis: 2, .. })));
    }
    assert!(matches!(
        session.position(two),
        Err(StageError::InvalidAxis { .. })
    ));
    assert!(matches!(
        session.is_ready(two),
        Err(StageError::InvalidAxis { .. })
    ));
    assert!(session.axis(two).is_err());
    assert!(mock.written().is_empty());
}

#[test]
fn test_inverted_speed_profile_rejected_before_io() {
    assert!(matches!(
        SpeedProfile::new(6000, 500, 100),
        Err(StageError::InvalidSpeedProfile { min: 6000, max: 500 })
    ));

    let (session, mock) = mock_session(ControllerModel::DualAxis, false);
    let result = session.send(&Command::SetSpeedPair {
        range: Default::default(),
        axis1: SpeedProfile::default(),
        axis2: SpeedProfile {
            min_pps: 6000,
            max_pps: 500,
            accel_ms: 100,
            range: None,
        },
    });
    assert!(matches!(result, Err(StageError::InvalidSpeedProfile { .. })));
    assert!(mock.written().is_empty());
}

#[test]
fn test_status_queries_do_not_change_state() {
    let sim = SimulatedController::new(ControllerModel::DualAxis);
    sim.set_position(Axis::One, 123);
    sim.set_position(Axis::Two, -456);
    let session = ControllerSession::new(sim.clone(), ControllerModel::DualAxis);

    let first = session.query_status1().unwrap();
    let second = session.query_status1().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.position(Axis::Two), Some(-456));
    assert_eq!(sim.position(Axis::One), 123);
}

#[test]
fn test_malformed_status_is_decode_error() {
    let (session, mock) = mock_session(ControllerModel::DualAxis, false);
    mock.push_reply("       500,K,K,R");
    assert!(matches!(
        session.query_status1(),
        Err(StageError::Decode(DecodeError::Malformed { .. }))
    ));
    mock.push_reply("");
    assert!(matches!(
        session.query_status2(),
        Err(StageError::Decode(DecodeError::EmptyResponse))
    ));
}

// =============================================================================
// Simulated controller
// =============================================================================

#[test]
fn test_dual_axis_simulated_workflow() {
    let sim = SimulatedController::new(ControllerModel::DualAxis).with_settle_polls(2);
    let session =
        ControllerSession::with_config(sim.clone(), &quick_config(ControllerModel::DualAxis, true));

    let x = session.axis(Axis::One).unwrap();
    let y = session.axis(Axis::Two).unwrap();

    x.move_absolute_pulses(2000).unwrap();
    y.move_relative_pulses(-750).unwrap();
    assert_eq!(x.position().unwrap(), 2000);
    assert_eq!(y.position().unwrap(), -750);

    // Both axes in one command
    session.move_relative_both(100, 100).unwrap();
    session.drive().unwrap();
    poller::wait_until_all_stopped(&session, POLL, Duration::from_secs(1)).unwrap();
    assert_eq!((sim.position(Axis::One), sim.position(Axis::Two)), (2100, -650));

    x.set_logical_zero().unwrap();
    assert_eq!(x.position().unwrap(), 0);

    session
        .return_origin(Direction::Minus, AxisSelect::All)
        .unwrap();
    poller::wait_until_all_stopped(&session, POLL, Duration::from_secs(1)).unwrap();
    assert_eq!(sim.position(Axis::Two), 0);
    assert_eq!(sim.count_written("H:W--"), 1);
}

#[test]
fn test_busy_controller_rejects_second_move() {
    let sim = SimulatedController::new(ControllerModel::SingleAxis).with_settle_polls(10);
    let session = ControllerSession::with_config(
        sim.clone(),
        &quick_config(ControllerModel::SingleAxis, false),
    );
    let x = session.axis(Axis::One).unwrap();

    x.move_relative_pulses(300).unwrap();
    let err = x.move_relative_pulses(300).unwrap_err();
    assert!(matches!(err, StageError::CommandRejected { ref command } if command == "M:1+00300"));
    assert!(err.is_recoverable());

    session.immediate_stop().unwrap();
    assert!(x.is_ready().unwrap());
    assert_eq!(x.position().unwrap(), 0);
}

#[test]
fn test_unreachable_target_is_rejected_by_controller() {
    let sim = SimulatedController::new(ControllerModel::SingleAxis);
    let session = ControllerSession::new(sim.clone(), ControllerModel::SingleAxis);
    sim.set_position(Axis::One, 1);

    let err = session.increment_position(Axis::One, i64::MAX).unwrap_err();
    assert!(matches!(err, StageError::CommandRejected { ref command } if command == "G:"));
    assert_eq!(session.position(Axis::One).unwrap(), 1);

    let err = session.set_position(Axis::One, -16_777_216).unwrap_err();
    assert!(matches!(err, StageError::CommandRejected { .. }));
    assert!(!sim.is_moving(Axis::One));
}

#[test]
fn test_concurrent_views_keep_load_and_drive_together() {
    let sim = SimulatedController::new(ControllerModel::DualAxis);
    let session = ControllerSession::new(sim.clone(), ControllerModel::DualAxis);

    std::thread::scope(|scope| {
        for axis in [Axis::One, Axis::Two] {
            let session = &session;
            scope.spawn(move || {
                for step in 1..=20 {
                    session.set_position(axis, step * 10).unwrap();
                }
            });
        }
    });

    let lines: Vec<String> = sim
        .written()
        .iter()
        .map(|line| line.trim_end().to_string())
        .collect();
    assert_eq!(lines.len(), 40 * 4);
    for exchange in lines.chunks(4) {
        assert!(exchange[0].starts_with("A:"), "{exchange:?}");
        assert_eq!(exchange[1..], ["Q:", "G", "Q:"], "{exchange:?}");
    }
    assert_eq!(sim.position(Axis::One), 200);
    assert_eq!(sim.position(Axis::Two), 200);
}

#[test]
fn test_speed_both_reaches_controller() {
    let sim = SimulatedController::new(ControllerModel::DualAxis);
    let session = ControllerSession::new(sim.clone(), ControllerModel::DualAxis);
    let slow = SpeedProfile::new(100, 1000, 300).unwrap();
    let fast = SpeedProfile::new(1000, 20000, 50).unwrap();

    session
        .set_speed_both(Default::default(), slow, fast)
        .unwrap();
    assert_eq!(sim.speed(Axis::One).max_pps, 1000);
    assert_eq!(sim.speed(Axis::Two).max_pps, 20000);
    assert_eq!(session.speed_profile(Axis::Two).unwrap(), fast);
    assert_eq!(sim.count_written("D:2S100F1000R300S1000F20000R50"), 1);
}

#[test]
fn test_energize_and_io_round_trip() {
    let sim = SimulatedController::new(ControllerModel::DualAxis);
    let session = ControllerSession::new(sim.clone(), ControllerModel::DualAxis);

    session
        .energize_motor(false, AxisSelect::Single(Axis::Two))
        .unwrap();
    assert!(sim.is_energized(Axis::One));
    assert!(!sim.is_energized(Axis::Two));

    session.io_output(0b0110).unwrap();
    assert_eq!(sim.outputs(), 0b0110);
    sim.set_inputs(0b1001);
    assert_eq!(session.io_input().unwrap(), 0b1001);
}

#[test]
fn test_scaled_axis_over_simulated_stage() {
    let sim = SimulatedController::new(ControllerModel::SingleAxis).with_settle_polls(1);
    let session = ControllerSession::with_config(
        sim.clone(),
        &quick_config(ControllerModel::SingleAxis, true),
    );
    let stage = ScaledAxis::new(session.axis(Axis::One).unwrap(), 0.002)
        .unwrap()
        .with_offset(5.0)
        .unwrap();

    stage.move_to_units(6.0).unwrap();
    assert_eq!(sim.position(Axis::One), 500);
    assert!((stage.units().unwrap() - 6.0).abs() < 1e-9);

    stage.move_by_units(-0.5).unwrap();
    assert_eq!(sim.position(Axis::One), 250);
    assert_eq!(sim.count_written("M:1-00250"), 1);

    stage.reset().unwrap();
    assert_eq!(stage.position().unwrap(), 0);
}

#[test]
fn test_dual_axis_jog_both() {
    let sim = SimulatedController::new(ControllerModel::DualAxis);
    let session = ControllerSession::new(sim.clone(), ControllerModel::DualAxis);

    session
        .send(&Command::Jog(PerAxis::Both(Direction::Plus, Direction::Minus)))
        .unwrap();
    session.drive().unwrap();
    assert!(sim.is_moving(Axis::One) && sim.is_moving(Axis::Two));

    session.decelerate_stop(AxisSelect::All).unwrap();
    assert!(!sim.is_moving(Axis::One) && !sim.is_moving(Axis::Two));
}

// =============================================================================
// Logging
// =============================================================================

#[test]
#[traced_test]
fn test_rejection_is_logged() {
    let (session, mock) = mock_session(ControllerModel::SingleAxis, false);
    mock.push_reply("NG");
    assert!(session.drive().is_err());
    assert!(logs_contain("Controller rejected command"));
}
