//! Phase cancellation
//!
//! The coordinator holds a [`CancelSource`]; every worker gets a
//! [`CancelToken`]. Workers poll the token once per loop iteration and use it
//! for their single barrier sleep, so a cancelled phase wakes sleeping workers
//! immediately instead of waiting out the lead time.

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Worker-side view of a phase's cancellation state
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    /// Disconnects when the source cancels or goes away
    signal: Receiver<()>,
}

impl CancelToken {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Sleep for `duration` unless cancelled first
    ///
    /// Returns `true` if the sleep was cut short by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        match self.signal.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

/// Coordinator-side handle that cancels every token it handed out
#[derive(Debug)]
pub struct CancelSource {
    cancelled: Arc<AtomicBool>,
    trigger: Option<Sender<()>>,
    signal: Receiver<()>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            trigger: Some(trigger),
            signal,
        }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            cancelled: self.cancelled.clone(),
            signal: self.signal.clone(),
        }
    }

    /// Cancel all tokens; idempotent
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.trigger.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}
