//! Error types for the controller protocol engine.
//!
//! Failures are split by where they originate so calling code can pick a recovery
//! strategy without string matching:
//!
//! - **`TransportError`**: the byte channel itself failed (port could not be opened, a write
//!   failed, or no terminator arrived before the read timeout).
//! - **`DecodeError`**: a line arrived but does not have the shape expected for the command
//!   that triggered it. This points at line noise or a model/protocol mismatch.
//! - **`StageError`**: the umbrella type returned by session, axis and poller operations. It
//!   wraps the two above and adds the hardware-level and caller-level conditions
//!   (`CommandRejected`, `InvalidAxis`, `Timeout`, ...).
//!
//! Nothing in the crate retries on its own; every failure is surfaced as-is.

use std::time::Duration;
use thiserror::Error;

use crate::hardware::types::{Axis, ControllerModel};

/// Convenience alias for results using the crate error type.
pub type StageResult<T> = std::result::Result<T, StageError>;

/// Failures of the duplex byte channel.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serial port '{port}' unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },

    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("No line terminator received within {0:?}")]
    ReadTimeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport closed")]
    Closed,
}

/// Which response layout a decoder was expecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Ack,
    Status1,
    Status2,
    Version,
    IoInput,
    Command,
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResponseKind::Ack => "ack",
            ResponseKind::Status1 => "status1",
            ResponseKind::Status2 => "status2",
            ResponseKind::Version => "version",
            ResponseKind::IoInput => "io input",
            ResponseKind::Command => "command",
        };
        f.write_str(name)
    }
}

/// A received line did not match the layout of its response class.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty response")]
    EmptyResponse,

    #[error("Malformed {kind} response '{line}': {reason}")]
    Malformed {
        kind: ResponseKind,
        line: String,
        reason: String,
    },
}

impl DecodeError {
    pub(crate) fn malformed(kind: ResponseKind, line: &str, reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            kind,
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Controller rejected command '{command}'")]
    CommandRejected { command: String },

    #[error("Axis {axis} is not valid for a {model} controller")]
    InvalidAxis { axis: u8, model: ControllerModel },

    #[error("Invalid speed profile: minimum {min} PPS exceeds maximum {max} PPS")]
    InvalidSpeedProfile { min: u32, max: u32 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Axis {axis} still moving after {waited:?}")]
    Timeout { axis: Axis, waited: Duration },

    #[error("Controller session lock poisoned")]
    SessionPoisoned,
}

impl StageError {
    /// Whether the caller can reasonably continue using the session after this error.
    ///
    /// Rejections and motion timeouts leave the channel framing intact. Transport and decode
    /// failures mean the channel state is unknown until the caller re-synchronizes.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StageError::CommandRejected { .. }
                | StageError::Timeout { .. }
                | StageError::InvalidAxis { .. }
                | StageError::InvalidSpeedProfile { .. }
                | StageError::InvalidParameter(_)
        )
    }
}
