//! Layered cancellation deadlines
//!
//! A [`Deadline`] pairs a cancellation token with an optional expiry instant.
//! Children derive their token from the parent and never outlive the
//! parent's expiry, so cancelling or expiring an ancestor reaches every
//! descendant.

use crate::error::CancelCause;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Deadline {
    token: CancellationToken,
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A root deadline with no expiry
    pub fn unbounded() -> Self {
        Deadline {
            token: CancellationToken::new(),
            expires_at: None,
        }
    }

    /// A root deadline expiring after `timeout`, or unbounded for `None`
    pub fn new(timeout: Option<Duration>) -> Self {
        Deadline {
            token: CancellationToken::new(),
            expires_at: timeout.map(|t| Instant::now() + t),
        }
    }

    /// Derive a child bound to `min(parent expiry, now + timeout)`
    pub fn child(&self, timeout: Duration) -> Self {
        let local = Instant::now() + timeout;
        let expires_at = match self.expires_at {
            Some(parent) => parent.min(local),
            None => local,
        };
        Deadline {
            token: self.token.child_token(),
            expires_at: Some(expires_at),
        }
    }

    /// Derive a child with an optional local bound
    pub fn child_with(&self, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(t) => self.child(t),
            None => self.unbounded_child(),
        }
    }

    /// Derive a child that inherits the parent's expiry
    pub fn unbounded_child(&self) -> Self {
        Deadline {
            token: self.token.child_token(),
            expires_at: self.expires_at,
        }
    }

    /// Cancel this deadline and all of its children
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.is_expired()
    }

    /// Why the deadline is done; an explicit cancel wins over expiry
    pub fn cause(&self) -> Option<CancelCause> {
        if self.token.is_cancelled() {
            Some(CancelCause::Stopped)
        } else if self.is_expired() {
            Some(CancelCause::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the deadline is cancelled or expired
    pub async fn done(&self) -> CancelCause {
        match self.expires_at {
            Some(at) => tokio::select! {
                _ = self.token.cancelled() => CancelCause::Stopped,
                _ = time::sleep_until(at) => CancelCause::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelCause::Stopped
            }
        }
    }

    /// Sleep for `duration` unless the deadline fires first
    pub async fn sleep(&self, duration: Duration) -> Result<(), CancelCause> {
        if let Some(cause) = self.cause() {
            return Err(cause);
        }
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            cause = self.done() => Err(cause),
            _ = time::sleep(duration) => Ok(()),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}
