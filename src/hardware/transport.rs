//! Line-oriented duplex byte channel consumed by the controller session.
//!
//! The session only needs two capabilities: write one already-terminated line, and block
//! until one CRLF-terminated line arrives or a timeout elapses. Lines handed back by
//! `read_line` have the terminator stripped.
//!
//! `SerialTransport` (feature `instrument_serial`) is the production implementation on top of
//! the `serialport` crate. Tests use `MockTransport` or `SimulatedController` from
//! [`crate::hardware::mock`].

use std::io::Read;
use std::time::{Duration, Instant};

use crate::error::TransportError;

/// A duplex channel carrying CRLF-terminated ASCII lines.
pub trait Transport: Send {
    /// Write `line` verbatim (it already carries its terminator) and flush.
    fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError>;

    /// Block until a full line has arrived and return it without its terminator.
    ///
    /// Fails with `TransportError::ReadTimeout` when no terminator is seen within `timeout`.
    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Short label used in log output.
    fn describe(&self) -> String {
        "transport".to_string()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        (**self).write_line(line)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).read_line(timeout)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Read from `reader` until CRLF, returning the line with its terminator.
///
/// Reads byte-wise so nothing past the terminator is consumed. Reader timeouts are retried
/// until `timeout` has elapsed overall.
pub(crate) fn read_terminated<R: Read + ?Sized>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Vec<u8>, TransportError> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    let start = Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(TransportError::ReadTimeout(timeout));
        }

        match reader.read(&mut byte) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(_) => {
                line.push(byte[0]);
                if line.ends_with(b"\r\n") {
                    return Ok(line);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => return Err(TransportError::Io(e)),
        }
    }
}

/// Remove a trailing CRLF (or lone LF) from a received buffer.
pub(crate) fn strip_terminator(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    line
}

#[cfg(feature = "instrument_serial")]
pub use serial::SerialTransport;

#[cfg(feature = "instrument_serial")]
mod serial {
    use std::io::Write;
    use std::time::Duration;

    use serialport::SerialPort;
    use tracing::{debug, trace};

    use super::{read_terminated, strip_terminator, Transport};
    use crate::config::{Parity, PortSettings, StopBits};
    use crate::error::TransportError;

    /// Longest single blocking read; the overall line timeout is enforced on top of it.
    const READ_SLICE: Duration = Duration::from_millis(50);

    /// RS-232 transport for GSC controllers.
    pub struct SerialTransport {
        port_name: String,
        port: Box<dyn SerialPort>,
    }

    impl SerialTransport {
        /// Open the port described by `settings`.
        ///
        /// # Errors
        /// Returns `TransportError::PortUnavailable` if the port cannot be opened.
        pub fn open(settings: &PortSettings) -> Result<Self, TransportError> {
            let data_bits = match settings.data_bits {
                5 => serialport::DataBits::Five,
                6 => serialport::DataBits::Six,
                7 => serialport::DataBits::Seven,
                _ => serialport::DataBits::Eight,
            };
            let parity = match settings.parity {
                Parity::None => serialport::Parity::None,
                Parity::Odd => serialport::Parity::Odd,
                Parity::Even => serialport::Parity::Even,
            };
            let stop_bits = match settings.stop_bits {
                StopBits::One => serialport::StopBits::One,
                StopBits::Two => serialport::StopBits::Two,
            };

            let port = serialport::new(&settings.name, settings.baud_rate)
                .data_bits(data_bits)
                .parity(parity)
                .stop_bits(stop_bits)
                .flow_control(serialport::FlowControl::None)
                .timeout(READ_SLICE.min(settings.read_timeout))
                .open()
                .map_err(|e| TransportError::PortUnavailable {
                    port: settings.name.clone(),
                    reason: e.to_string(),
                })?;

            debug!(
                port = %settings.name,
                baud = settings.baud_rate,
                "Serial port opened"
            );

            Ok(Self {
                port_name: settings.name.clone(),
                port,
            })
        }
    }

    impl Transport for SerialTransport {
        fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
            self.port.write_all(line).map_err(TransportError::Write)?;
            self.port.flush().map_err(TransportError::Write)?;
            trace!(port = %self.port_name, line = %String::from_utf8_lossy(line).escape_default(), "tx");
            Ok(())
        }

        fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
            let line = read_terminated(&mut self.port, timeout)?;
            trace!(port = %self.port_name, line = %String::from_utf8_lossy(&line).escape_default(), "rx");
            Ok(strip_terminator(line))
        }

        fn describe(&self) -> String {
            self.port_name.clone()
        }
    }
}
