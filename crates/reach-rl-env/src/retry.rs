//! Bounded waits on external collaborators

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use reach_rl_core::{RLError, Result};

use crate::ports::{PortError, PortResult};

/// How long to keep polling a collaborator, and how often
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay between attempts (ms)
    pub poll_interval_ms: u64,
    /// Total budget per wait (ms)
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            timeout_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay between attempts
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Total budget per wait
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Call `attempt` until it succeeds or the budget runs out.
    ///
    /// Both [`PortError::NotReady`] and [`PortError::Failed`] are retried.
    ///
    /// # Errors
    ///
    /// [`RLError::Timeout`] once `timeout_ms` has elapsed without success.
    pub async fn wait_for<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PortResult<T>>,
    {
        let poll = async {
            let mut attempts = 0u32;
            loop {
                attempts += 1;
                match attempt().await {
                    Ok(value) => return value,
                    Err(PortError::NotReady(what)) => {
                        trace!(operation, attempts, %what, "not ready");
                    }
                    Err(PortError::Failed(reason)) => {
                        warn!(operation, attempts, %reason, "fail to get data");
                    }
                }
                tokio::time::sleep(self.poll_interval()).await;
            }
        };

        tokio::time::timeout(self.timeout(), poll)
            .await
            .map_err(|_| self.timeout_error(operation))
    }

    /// Await a single call within the budget, without retrying.
    ///
    /// # Errors
    ///
    /// [`RLError::Timeout`] if the call does not resolve in time,
    /// [`RLError::External`] if it fails.
    pub async fn within<T, Fut>(&self, operation: &str, call: Fut) -> Result<T>
    where
        Fut: Future<Output = PortResult<T>>,
    {
        match tokio::time::timeout(self.timeout(), call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(RLError::External(format!("{operation}: {err}"))),
            Err(_) => Err(self.timeout_error(operation)),
        }
    }

    fn timeout_error(&self, operation: &str) -> RLError {
        RLError::Timeout {
            operation: operation.to_string(),
            timeout_ms: self.timeout_ms,
        }
    }
}
