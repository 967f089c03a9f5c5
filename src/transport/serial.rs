//! Serial transport implementation

use super::{Connector, Transport};
use crate::error::{Error, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Serial transport for UART communication
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Baud rate (e.g., 9600)
    /// * `poll_timeout` - Port read timeout; one `read` blocks at most this long
    pub fn open(path: &str, baud_rate: u32, poll_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(poll_timeout)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(0) => Err(Error::Timeout),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Err(Error::Timeout)
            }
            Err(e) => Err(Error::Transport(e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.port.write(data).map_err(Error::Transport)
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush().map_err(Error::Transport)
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }
}

/// Opens [`SerialTransport`]s for a fixed port configuration
#[derive(Debug, Clone)]
pub struct SerialConnector {
    path: String,
    baud_rate: u32,
    poll_timeout: Duration,
}

impl SerialConnector {
    pub fn new(path: impl Into<String>, baud_rate: u32, poll_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            poll_timeout,
        }
    }
}

impl Connector for SerialConnector {
    type Transport = SerialTransport;

    fn connect(&self) -> Result<SerialTransport> {
        SerialTransport::open(&self.path, self.baud_rate, self.poll_timeout)
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.path, self.baud_rate)
    }
}
