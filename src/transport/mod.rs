//! Transport layer for I/O abstraction
//!
//! A [`Transport`] is an open byte stream; a [`Connector`] knows how to open
//! one. The link manager only ever sees these two traits, so the serial port
//! and the in-memory mock are interchangeable.

use crate::error::Result;

pub mod mock;
mod serial;
pub use serial::{SerialConnector, SerialTransport};

/// Transport trait for device communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read
    ///
    /// Returns `Err(Error::Timeout)` when one poll window passes without
    /// data, and `Err(Error::Transport(_))` when the link itself failed.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Check if data is available to read
    fn available(&mut self) -> Result<usize> {
        Ok(0) // Default implementation
    }
}

/// Opens transports on demand (initial open and every reconnect)
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Open a fresh transport; only a confirmed-open handle is returned
    fn connect(&self) -> Result<Self::Transport>;

    /// Human-readable endpoint for logs
    fn describe(&self) -> String;
}
