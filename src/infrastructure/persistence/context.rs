//! # Call Context
//!
//! Cancellation and deadline carried by every repository call.
//!
//! A [`CallContext`] wraps a [`CancellationToken`] and an optional deadline.
//! Repository operations race their backend work against both and return
//! [`RepositoryError::Canceled`] when either fires first. Work is abandoned
//! at the next await point, so a batch that has not yet been submitted is
//! never sent.
//!
//! A cancellation that fires while a batch is already in flight only stops
//! the wait for the reply. The server may still have applied the whole
//! batch, so `Canceled` from a write means the outcome is unknown, not that
//! nothing was written. Re-read the order before retrying.
//!
//! # Examples
//!
//! ```
//! use order_store::infrastructure::persistence::CallContext;
//! use std::time::Duration;
//!
//! let ctx = CallContext::background().with_timeout(Duration::from_secs(2));
//! assert!(ctx.deadline().is_some());
//!
//! let child = ctx.child();
//! ctx.cancel();
//! assert!(child.is_cancelled());
//! ```

use crate::infrastructure::persistence::traits::{RepositoryError, RepositoryResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation scope for repository calls.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never canceled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context driven by an existing token.
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Sets a deadline `timeout` from now, keeping any earlier deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets an absolute deadline, keeping any earlier deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Derives a context canceled whenever this one is, with the same
    /// deadline. Canceling the child does not affect the parent.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true if the context was canceled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The underlying token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fails fast if the context is already done.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Canceled` if canceled or past the deadline.
    pub fn check(&self, operation: &'static str) -> RepositoryResult<()> {
        if self.token.is_cancelled() {
            return Err(RepositoryError::canceled(operation, "context canceled"));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(RepositoryError::canceled(operation, "deadline exceeded"));
        }
        Ok(())
    }

    /// Runs `work` unless the context is canceled or times out first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Canceled` if the context finishes first,
    /// otherwise whatever `work` returns.
    pub async fn run<T, F>(&self, operation: &'static str, work: F) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        self.check(operation)?;
        tokio::select! {
            biased;
            () = self.token.cancelled() => {
                Err(RepositoryError::canceled(operation, "context canceled"))
            }
            () = sleep_until(self.deadline) => {
                Err(RepositoryError::canceled(operation, "deadline exceeded"))
            }
            result = work => result,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
