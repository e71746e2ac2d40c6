//! Per-request deadline
//!
//! Every storage call takes a [`RequestContext`]. Backends run their work
//! through [`RequestContext::run`], which turns an elapsed deadline into
//! [`Error::Timeout`] so callers can tell it apart from other failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

/// Deadline carried through a single request
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    deadline: Option<Instant>,
    budget: Option<Duration>,
}

impl RequestContext {
    /// A context without a deadline
    pub fn background() -> Self {
        Self {
            deadline: None,
            budget: None,
        }
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            budget: Some(timeout),
        }
    }

    /// The absolute deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline has already passed
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Run a storage operation under this context's deadline
    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let Some(deadline) = self.deadline else {
            return fut.await;
        };

        match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                let elapsed_ms = self.budget.map_or(0, |b| b.as_millis());
                tracing::warn!(operation, elapsed_ms, "storage operation timed out");
                Err(Error::Timeout {
                    operation,
                    elapsed_ms,
                })
            }
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_run_within_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(5));
        let value = ctx.run("noop", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(!ctx.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_past_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(10));
        let err = ctx
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(matches!(err, Error::Timeout { operation: "slow", elapsed_ms: 10 }));
    }

    #[tokio::test]
    async fn test_background_has_no_deadline() {
        let ctx = RequestContext::background();
        assert!(ctx.deadline().is_none());
        assert!(!ctx.is_expired());
    }
}
