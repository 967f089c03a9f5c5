//! Command executor: one request/response exchange per call
//!
//! # Exchange
//!
//! 1. Lock the link (opening it under the configured retry policy)
//! 2. Drop stale input pending on the link
//! 3. Allocate the next sequence number while holding the lock, send the
//!    encoded request
//! 4. Read the 15-byte response header, derive the frame size from its
//!    argLength, read the rest before the response deadline
//! 5. Decode and validate, then check sequence and command echoes
//! 6. Map a non-OK status to `Error::Device`
//!
//! Sends are never retried here. A failed send drops the link handle and
//! the next call reconnects through the link manager.

use super::constants::RESP_HEADER_SIZE;
use super::datagram::{response_frame_len, RequestDatagram, ResponseDatagram};
use super::link::{LinkManager, RetryPolicy};
use super::status::CommandId;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::transport::Connector;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-process request counter
///
/// Starts at zero so the first issued sequence is 1. Never wraps: once
/// `i32::MAX` has been issued every further allocation fails.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    last: AtomicI32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next sequence number
    pub fn next(&self) -> Result<i32> {
        self.last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_add(1))
            .map(|prev| prev + 1)
            .map_err(|_| Error::SequenceExhausted)
    }

    /// Most recently issued sequence number (0 before the first request)
    pub fn last(&self) -> i32 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Executor settings
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Retry policy used when the link has to be (re)opened
    pub policy: RetryPolicy,
    /// Window for the whole response to arrive
    pub response_timeout: Duration,
}

/// Runs request/response exchanges over a shared link
pub struct CommandExecutor<C: Connector> {
    link: Arc<LinkManager<C>>,
    sequence: SequenceCounter,
    config: ExecutorConfig,
}

impl<C: Connector> CommandExecutor<C> {
    pub fn new(link: Arc<LinkManager<C>>, config: ExecutorConfig) -> Self {
        Self {
            link,
            sequence: SequenceCounter::new(),
            config,
        }
    }

    pub fn link(&self) -> &Arc<LinkManager<C>> {
        &self.link
    }

    /// Sequence number of the most recent request
    pub fn last_sequence(&self) -> i32 {
        self.sequence.last()
    }

    /// Execute one command and return the validated OK response
    pub fn execute(
        &self,
        command: CommandId,
        arg: &[u8],
        cancel: &CancelToken,
    ) -> Result<ResponseDatagram> {
        // Built before a sequence is spent so an oversized argument never consumes one
        let mut request =
            RequestDatagram::new(0, command, arg.to_vec()).map_err(Error::InvalidRequest)?;

        let mut link = self.link.acquire(self.config.policy, cancel)?;
        let deadline = Instant::now() + self.config.response_timeout;
        link.discard_input(deadline, cancel)?;

        // Allocated under the link lock, only once the request is about to go out
        request.sequence = self.sequence.next()?;
        let bytes = request.encode().map_err(Error::InvalidRequest)?;

        log::debug!(
            "{} request: seq={}, {} bytes (arg {})",
            command.name(),
            request.sequence,
            bytes.len(),
            request.arg_length
        );

        link.send(&bytes)?;

        let mut frame = vec![0u8; RESP_HEADER_SIZE];
        link.receive_exact(&mut frame, deadline, cancel)?;

        let total = response_frame_len(&frame).map_err(|e| {
            log::warn!("{} response header rejected: {}", command.name(), e);
            Error::InvalidResponse(e)
        })?;
        frame.resize(total, 0);
        link.receive_exact(&mut frame[RESP_HEADER_SIZE..], deadline, cancel)?;
        drop(link);

        let response = ResponseDatagram::decode(&frame).map_err(|e| {
            log::warn!("{} response rejected: {}", command.name(), e);
            Error::InvalidResponse(e)
        })?;

        log::debug!(
            "{} response: seq={}, status={}, {} arg bytes",
            command.name(),
            response.sequence,
            response.status,
            response.arg.len()
        );

        if response.sequence != request.sequence {
            return Err(Error::SequenceMismatch {
                expected: request.sequence,
                actual: response.sequence,
            });
        }
        if response.command != command.opcode() {
            return Err(Error::CommandMismatch {
                expected: command.opcode(),
                actual: response.command,
            });
        }
        if !response.status.is_ok() {
            return Err(Error::Device(response.status));
        }

        Ok(response)
    }
}
