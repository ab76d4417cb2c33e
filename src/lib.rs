//! # OptoSigma stage controller library
//!
//! Drives OptoSigma GSC-01 (single-axis) and GSC-02 (dual-axis) stepper stage controllers
//! over their RS-232 ASCII protocol.
//!
//! ## Crate Structure
//!
//! - **`hardware`**: command/response codec, transports, the controller session, motion
//!   polling and per-axis views.
//! - **`config`**: `SessionConfig`, loaded from code, TOML and `OPTOSIGMA_*` variables.
//! - **`error`**: `StageError` and the transport/decode errors it wraps.
//! - **`tracing_setup`**: optional subscriber installation for applications.
//!
//! ## Example
//!
//! ```
//! use optosigma::hardware::mock::SimulatedController;
//! use optosigma::hardware::{Axis, ControllerModel, ControllerSession, ScaledAxis};
//!
//! # fn main() -> optosigma::error::StageResult<()> {
//! let controller = SimulatedController::new(ControllerModel::SingleAxis);
//! let session = ControllerSession::new(controller, ControllerModel::SingleAxis);
//!
//! let stage = ScaledAxis::new(session.axis(Axis::One)?, 0.002)?;
//! stage.move_to_units(1.5)?;
//! assert_eq!(stage.inner().position()?, 750);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hardware;
pub mod tracing_setup;

pub use config::SessionConfig;
pub use error::{StageError, StageResult};
