//! Deadline and cancellation plumbing for session setup
//!
//! A [`Context`] bounds an operation with an optional wall-clock deadline
//! and a cancel flag that can be flipped from another thread through a
//! [`CancelHandle`]. Loops check `done()` between blocking attempts and
//! derive their per-attempt read deadlines with `bounded_deadline()`, so a
//! cancellation is observed within one retransmit interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Deadline and cancellation state threaded through session setup
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

/// Handle that cancels the [`Context`] it was created from
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Cancel the associated context. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl Context {
    /// A context with no deadline that can only end by cancellation
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for cancelling this context from elsewhere
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    /// Whether the context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// The overall deadline, if one was set
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is finished, if it is.
    ///
    /// Cancellation takes precedence over deadline expiry.
    pub fn done(&self) -> Option<Error> {
        if self.is_cancelled() {
            return Some(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(Error::DeadlineExceeded);
            }
        }
        None
    }

    /// Shorthand for `done()` as a `Result`
    pub fn check(&self) -> Result<()> {
        match self.done() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// A per-attempt deadline `step` from now, clamped by the overall
    /// deadline. Used to derive retransmission read deadlines so that an
    /// expiring context cuts the final read attempt short.
    pub fn bounded_deadline(&self, step: Duration) -> Instant {
        let attempt = Instant::now() + step;
        match self.deadline {
            Some(deadline) if deadline < attempt => deadline,
            _ => attempt,
        }
    }
}
