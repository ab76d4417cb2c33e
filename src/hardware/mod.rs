//! Stage controller hardware layer
//!
//! Layered bottom-up:
//! - `types`: axes, models, directions and speed profiles
//! - `command` / `response`: the ASCII wire grammar in both directions
//! - `transport`: the line channel trait and its serial implementation
//! - `session`: the single owner of a transport, one transaction at a time
//! - `poller`: motion-completion waits on top of status2
//! - `axis`, `capabilities`, `scaled`: per-axis handles in pulses and physical units
//! - `mock`: scripted and simulated transports for tests

pub mod axis;
pub mod capabilities;
pub mod command;
pub mod mock;
pub mod poller;
pub mod response;
pub mod scaled;
pub mod session;
pub mod transport;
pub mod types;

pub use axis::AxisView;
pub use capabilities::PulseAxis;
pub use command::{Command, PerAxis, PulseFormat, VersionKind};
pub use poller::MotionReport;
pub use response::{CommandAck, MotionState, Status1, Status2, StopCondition};
pub use scaled::ScaledAxis;
pub use session::ControllerSession;
#[cfg(feature = "instrument_serial")]
pub use transport::SerialTransport;
pub use transport::Transport;
pub use types::{Axis, AxisSelect, ControllerModel, Direction, SpeedProfile, SpeedRange};
