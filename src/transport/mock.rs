//! Mock transport for testing
//!
//! `MockTransport` is a shared in-memory byte pipe. Bytes queued with
//! [`MockTransport::inject_read`] or produced by a responder closure are
//! handed back by `read`; every `write` call is logged as one chunk.
//! `MockConnector` hands out clones of one transport and can be told to
//! fail a number of opens first.

use super::{Connector, Transport};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Produces device output for each chunk written to the mock
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

/// Mock transport for unit testing
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_log: Vec<Vec<u8>>,
    responder: Option<Responder>,
    fail_reads: bool,
    fail_writes: bool,
    /// Largest number of bytes a single read returns
    max_read_chunk: usize,
    /// Largest number of bytes a single write accepts
    max_write_chunk: usize,
    /// How long an empty read blocks before reporting a timeout
    poll_delay: Duration,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                read_buffer: VecDeque::new(),
                write_log: Vec::new(),
                responder: None,
                fail_reads: false,
                fail_writes: false,
                max_read_chunk: usize::MAX,
                max_write_chunk: usize::MAX,
                poll_delay: Duration::from_millis(1),
            })),
        }
    }

    /// Create a mock whose responder answers every written chunk
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        let mock = Self::new();
        mock.set_responder(responder);
        mock
    }

    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.inner.lock().responder = Some(Box::new(responder));
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Get all written data, concatenated in write order
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_log.concat()
    }

    /// Get written data as one entry per `write` call
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().write_log.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.inner.lock().write_log.clear();
    }

    /// Clear read buffer
    pub fn clear_read(&self) {
        self.inner.lock().read_buffer.clear();
    }

    /// Make subsequent reads fail with a transport error
    pub fn fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    /// Make subsequent writes fail with a transport error
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Limit bytes returned per read to exercise partial reads
    pub fn set_max_read_chunk(&self, max: usize) {
        self.inner.lock().max_read_chunk = max.max(1);
    }

    /// Limit bytes accepted per write so frames span several write calls
    pub fn set_max_write_chunk(&self, max: usize) {
        self.inner.lock().max_write_chunk = max.max(1);
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let poll_delay = {
            let mut inner = self.inner.lock();
            if inner.fail_reads {
                return Err(Error::Transport(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "mock read failure",
                )));
            }
            if !inner.read_buffer.is_empty() {
                let available = inner
                    .read_buffer
                    .len()
                    .min(buffer.len())
                    .min(inner.max_read_chunk);
                for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..available)) {
                    *slot = byte;
                }
                return Ok(available);
            }
            inner.poll_delay
        };

        // Emulate the port's read timeout without holding the lock
        thread::sleep(poll_delay);
        Err(Error::Timeout)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.fail_writes {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        let chunk = &data[..data.len().min(inner.max_write_chunk)];
        inner.write_log.push(chunk.to_vec());
        if let Some(responder) = inner.responder.as_mut() {
            let reply = responder(chunk);
            inner.read_buffer.extend(reply);
        }
        Ok(chunk.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.inner.lock().read_buffer.len())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Connector handing out clones of a single [`MockTransport`]
#[derive(Clone)]
pub struct MockConnector {
    transport: MockTransport,
    state: Arc<Mutex<ConnectorState>>,
}

#[derive(Default)]
struct ConnectorState {
    attempts: u32,
    failures_remaining: u32,
    always_fail: bool,
}

impl MockConnector {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport,
            state: Arc::new(Mutex::new(ConnectorState::default())),
        }
    }

    /// Fail the next `n` open attempts, then succeed
    pub fn fail_first(self, n: u32) -> Self {
        self.state.lock().failures_remaining = n;
        self
    }

    /// Fail every open attempt
    pub fn fail_always(self) -> Self {
        self.state.lock().always_fail = true;
        self
    }

    /// Total open attempts so far
    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    pub fn transport(&self) -> MockTransport {
        self.transport.clone()
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn connect(&self) -> Result<MockTransport> {
        let mut state = self.state.lock();
        state.attempts += 1;
        if state.always_fail || state.failures_remaining > 0 {
            state.failures_remaining = state.failures_remaining.saturating_sub(1);
            return Err(Error::Serial(serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                "mock port unavailable",
            )));
        }
        Ok(self.transport.clone())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
