//! Per-attempt timeout enforcement.
//!
//! # Responsibilities
//! - Race a single attempt against its own deadline
//! - Abandon the attempt when the deadline wins, discarding any late result
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timeout surfaces as the caller's error type via `From<ExecutorFault>`

use std::future::Future;
use std::time::Duration;
use tokio::time;

use crate::resilience::error::ExecutorFault;

/// Run `attempt` with a deadline of `limit`.
pub async fn with_attempt_timeout<T, E, Fut>(limit: Duration, attempt: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: From<ExecutorFault>,
{
    match time::timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => Err(ExecutorFault::Timeout(limit).into()),
    }
}
