//! Cancellation and deadlines.
//!
//! A single [`Deadline`] is threaded through workload creation, polling and
//! log retrieval. It expires at a fixed instant, and can also be cut short
//! through its [`CancelToken`] (the CLI wires Ctrl-C to it). Sleeping on a
//! deadline wakes as soon as it is cancelled, so nothing blocks past an
//! interrupt.

use anyhow::{Context, Result};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Upper bound used when a timeout is too large to add to `Instant::now()`.
const FOREVER: Duration = Duration::from_secs(u32::MAX as u64);

#[derive(Debug, Default)]
struct CancelState {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Cloneable cancellation flag. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every deadline sharing this token and wake their sleepers.
    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Block for up to `timeout`. Returns `true` if the token was cancelled.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let (guard, _) = self
            .inner
            .wake
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }

    /// Cancel this token on Ctrl-C / SIGTERM.
    ///
    /// Can only be installed once per process.
    pub fn cancel_on_interrupt(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("interrupt received, cancelling");
            token.cancel();
        })
        .context("Failed to set Ctrl+C handler")
    }
}

/// A point in time after which no operation may report an outcome.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    token: CancelToken,
}

impl Deadline {
    /// A deadline `timeout` from now with a fresh token.
    pub fn after(timeout: Duration) -> Self {
        Self::with_token(timeout, CancelToken::new())
    }

    /// A deadline `timeout` from now sharing an existing token.
    pub fn with_token(timeout: Duration, token: CancelToken) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FOREVER);
        Self { expires_at, token }
    }

    /// A deadline that expires at the earlier of `timeout` from now and this
    /// deadline, sharing the same token.
    pub fn child(&self, timeout: Duration) -> Self {
        let child = Self::with_token(timeout, self.token.clone());
        Self {
            expires_at: child.expires_at.min(self.expires_at),
            token: child.token,
        }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Expired or cancelled.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Sleep for `duration`, cut short by expiry or cancellation.
    ///
    /// Returns `true` only if the whole duration elapsed and the deadline is
    /// still live afterwards.
    pub fn sleep(&self, duration: Duration) -> bool {
        let nap = duration.min(self.remaining());
        let cancelled = self.token.wait_timeout(nap);
        !cancelled && !self.is_expired()
    }
}
