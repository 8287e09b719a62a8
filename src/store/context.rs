//! Per-call request context
//!
//! Every facade operation runs under a `RequestContext`: a cancellation token
//! plus an optional deadline. Contexts handed out by a `DocumentStore` are
//! children of the store's root token, so `shutdown` cancels all of them.

use crate::error::{Result, StoreError};
use std::future::{Future, IntoFuture};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token and deadline for one or more store calls
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().timeout(timeout)
    }

    /// Context that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub(crate) fn from_token(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// Tighten the deadline to at most `timeout` from now
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    /// Derived context: cancelled with its parent, same deadline
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` without a deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Run a driver action under this context
    pub(crate) async fn run<T, F>(&self, operation: &'static str, action: F) -> Result<T>
    where
        F: IntoFuture<Output = mongodb::error::Result<T>>,
    {
        self.guard(operation, async move { action.await.map_err(StoreError::from_driver) })
            .await
    }

    /// Run any store future under this context
    pub(crate) async fn guard<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.token.is_cancelled() {
            return Err(StoreError::Cancelled { operation });
        }

        match self.deadline {
            Some(deadline) => {
                if deadline <= Instant::now() {
                    return Err(StoreError::DeadlineExceeded { operation });
                }
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(StoreError::Cancelled { operation }),
                    res = tokio::time::timeout_at(deadline, fut) => match res {
                        Ok(inner) => inner,
                        Err(_) => Err(StoreError::DeadlineExceeded { operation }),
                    },
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(StoreError::Cancelled { operation }),
                    res = fut => res,
                }
            }
        }
    }
}
