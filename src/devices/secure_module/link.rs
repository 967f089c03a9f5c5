//! Link manager: owns the single shared connection handle
//!
//! # Exclusivity
//!
//! The handle lives behind one mutex. [`LinkManager::acquire`] returns a
//! [`LinkGuard`] that keeps the lock for a whole request/response exchange
//! and opens the link first when it is closed. Opening therefore never races
//! with another open or with an exchange in flight; other callers queue on
//! the mutex.
//!
//! # Recovery
//!
//! Any transport failure seen through a guard drops the handle. The next
//! `acquire` reconnects under the caller's retry policy.

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::transport::{Connector, Transport};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::{Duration, Instant};

/// How many times to retry opening the link
///
/// Serialized as `"infinite"` or `{ bounded = n }` in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry until success or cancellation
    Infinite,
    /// Retry up to `n` times after the first attempt (0 = single attempt)
    Bounded(u32),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Bounded(3)
    }
}

/// Owner of the shared link handle
pub struct LinkManager<C: Connector> {
    connector: C,
    retry_delay: Duration,
    handle: Mutex<Option<C::Transport>>,
}

impl<C: Connector> LinkManager<C> {
    /// Create a closed link; nothing is opened until `open` or `acquire`
    pub fn new(connector: C, retry_delay: Duration) -> Self {
        Self {
            connector,
            retry_delay,
            handle: Mutex::new(None),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Open the link, replacing any existing handle
    pub fn open(&self, policy: RetryPolicy, cancel: &CancelToken) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.take().is_some() {
            log::info!("Replacing open link to {}", self.connector.describe());
        }
        *handle = Some(self.connect_with_retry(policy, cancel)?);
        Ok(())
    }

    /// Lock the link for one exchange, opening it first if needed
    pub fn acquire(
        &self,
        policy: RetryPolicy,
        cancel: &CancelToken,
    ) -> Result<LinkGuard<'_, C::Transport>> {
        let mut handle = self.handle.lock();
        if handle.is_none() {
            *handle = Some(self.connect_with_retry(policy, cancel)?);
        }
        Ok(LinkGuard { handle })
    }

    /// Drop the handle; the next `acquire` reconnects
    pub fn close(&self) {
        if self.handle.lock().take().is_some() {
            log::info!("Closed link to {}", self.connector.describe());
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Attempt to connect per `policy`, sleeping `retry_delay` between attempts
    ///
    /// Every failed attempt is logged. The token is checked before each
    /// attempt and interrupts the delay.
    fn connect_with_retry(
        &self,
        policy: RetryPolicy,
        cancel: &CancelToken,
    ) -> Result<C::Transport> {
        let endpoint = self.connector.describe();
        let mut attempt: u32 = 0;

        loop {
            cancel.check()?;
            attempt = attempt.saturating_add(1);

            match self.connector.connect() {
                Ok(transport) => {
                    log::info!("Link {} open (attempt {})", endpoint, attempt);
                    return Ok(transport);
                }
                Err(e) => {
                    log::warn!("Open attempt {} on {} failed: {}", attempt, endpoint, e);
                    if let RetryPolicy::Bounded(retries) = policy {
                        if attempt > retries {
                            return Err(Error::Connection {
                                attempts: attempt,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }

            cancel.sleep(self.retry_delay)?;
        }
    }
}

/// Exclusive access to an open link for the guard's lifetime
pub struct LinkGuard<'a, T: Transport> {
    handle: MutexGuard<'a, Option<T>>,
}

impl<T: Transport> LinkGuard<'_, T> {
    fn transport(&mut self) -> Result<&mut T> {
        self.handle.as_mut().ok_or_else(|| {
            Error::Transport(io::Error::new(io::ErrorKind::NotConnected, "link closed"))
        })
    }

    /// Drop the handle after a failure so the next acquisition reconnects
    pub fn invalidate(&mut self) {
        if self.handle.take().is_some() {
            log::warn!("Link invalidated, will reconnect on next use");
        }
    }

    /// Invalidate on link-level failures, then hand the error back
    fn fail(&mut self, e: Error) -> Error {
        if matches!(e, Error::Transport(_) | Error::Serial(_)) {
            self.invalidate();
        }
        e
    }

    /// Drop bytes already waiting on the link (late replies, line noise)
    ///
    /// Only the bytes pending when called are drained, so a line that keeps
    /// producing data cannot hold the link. Stops with `Timeout` at
    /// `deadline` and `Cancelled` when the token fires.
    pub fn discard_input(&mut self, deadline: Instant, cancel: &CancelToken) -> Result<usize> {
        let mut scratch = [0u8; 256];
        let result = self.transport()?.available();
        let mut remaining = match result {
            Ok(n) => n,
            Err(e) => return Err(self.fail(e)),
        };
        let mut discarded = 0;

        while remaining > 0 {
            cancel.check()?;
            if Instant::now() >= deadline {
                log::debug!("Discard timed out after {} bytes", discarded);
                return Err(Error::Timeout);
            }
            let want = remaining.min(scratch.len());
            let result = self.transport()?.read(&mut scratch[..want]);
            match result {
                Ok(0) | Err(Error::Timeout) => break,
                Ok(n) => {
                    discarded += n;
                    remaining = remaining.saturating_sub(n);
                }
                Err(e) => return Err(self.fail(e)),
            }
        }

        if discarded > 0 {
            log::debug!("Discarded {} stale bytes", discarded);
        }
        Ok(discarded)
    }

    /// Write all bytes and flush
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            let result = self.transport()?.write(&bytes[written..]);
            match result {
                Ok(0) => {
                    let e = Error::Transport(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "link accepted no bytes",
                    ));
                    return Err(self.fail(e));
                }
                Ok(n) => written += n,
                Err(e) => return Err(self.fail(e)),
            }
        }
        let result = self.transport()?.flush();
        if let Err(e) = result {
            return Err(self.fail(e));
        }
        log::trace!("Wrote {} bytes", written);
        Ok(())
    }

    /// Fill `buf` completely, polling until `deadline`
    ///
    /// Returns `Timeout` if the deadline passes first and `Cancelled` if the
    /// token fires between polls.
    pub fn receive_exact(
        &mut self,
        buf: &mut [u8],
        deadline: Instant,
        cancel: &CancelToken,
    ) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            cancel.check()?;
            if Instant::now() >= deadline {
                log::debug!("Receive timed out with {}/{} bytes", filled, buf.len());
                return Err(Error::Timeout);
            }
            let result = self.transport()?.read(&mut buf[filled..]);
            match result {
                Ok(n) => filled += n,
                Err(Error::Timeout) => {}
                Err(e) => return Err(self.fail(e)),
            }
        }
        Ok(())
    }
}
