//! Cooperative cancellation for blocking waits
//!
//! A token wraps a zero-capacity crossbeam channel whose sender is never used
//! for messages. Cancelling drops the sender, which disconnects every
//! receiver at once and wakes any thread parked in [`CancelToken::sleep`].

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Clonable cancellation handle; all clones observe the same state.
#[derive(Clone)]
pub struct CancelToken {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: rx,
        }
    }

    /// Cancel every clone of this token. Idempotent.
    pub fn cancel(&self) {
        if self.sender.lock().take().is_some() {
            log::debug!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// `Err(Cancelled)` if the token has been cancelled
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Err(Cancelled)` on cancel
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        match self.receiver.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Cancelled),
            // Nothing is ever sent; treat a message like a cancel
            Ok(()) => Err(Error::Cancelled),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
