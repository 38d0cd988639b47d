//! Retry executor.
//!
//! # State Machine (per invocation)
//! ```text
//! INIT → ATTEMPTING → SUCCESS                       (terminal)
//!                   → CLASSIFY → RETRY_WAIT → ATTEMPTING
//!                   → CLASSIFY → ABORTED            (terminal, non-retryable)
//!                   → EXHAUSTED                     (terminal, retries used up)
//! ```
//!
//! # Design Decisions
//! - No state is shared between invocations; the executor only owns its
//!   sleep and jitter sources
//! - The pre-retry hook cannot fail the call; its errors are logged
//! - Terminal failure is logged exactly once, then the last error is returned

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::backoff::{calculate_backoff, JitterSource, RandomJitter};
use crate::resilience::error::ExecutorFault;
use crate::resilience::policy::RetryPolicy;
use crate::resilience::retries::{classify, RetryClassify};
use crate::resilience::timeouts::with_attempt_timeout;

/// Cooperative suspension between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Real-time sleep on the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// What the pre-retry hook is told about the upcoming retry.
#[derive(Debug)]
pub struct RetryNotice<'a, E> {
    /// Zero-based index of the attempt that just failed.
    pub attempt: u32,
    pub delay: Duration,
    pub error: &'a E,
    pub context: &'a str,
}

/// Boxed error returned by a pre-retry hook.
pub type HookError = Box<dyn StdError + Send + Sync>;

/// Pre-retry callback.
pub type RetryHook<'a, E> = &'a (dyn Fn(&RetryNotice<'_, E>) -> Result<(), HookError> + Send + Sync);

/// Optional per-invocation inputs.
pub struct ExecuteOptions<'a, E> {
    /// Label used in logs and metrics.
    pub context: Option<&'a str>,
    /// Invoked before each backoff sleep.
    pub on_retry: Option<RetryHook<'a, E>>,
}

impl<E> Default for ExecuteOptions<'_, E> {
    fn default() -> Self {
        Self {
            context: None,
            on_retry: None,
        }
    }
}

impl<'a, E> ExecuteOptions<'a, E> {
    pub fn context(context: &'a str) -> Self {
        Self {
            context: Some(context),
            on_retry: None,
        }
    }

    pub fn on_retry(mut self, hook: RetryHook<'a, E>) -> Self {
        self.on_retry = Some(hook);
        self
    }
}

/// Terminal state of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Aborted,
    Exhausted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Aborted => "aborted",
            Outcome::Exhausted => "exhausted",
        }
    }
}

/// Backoff/retry/timeout engine wrapping any asynchronous operation.
#[derive(Clone)]
pub struct RetryExecutor {
    sleeper: Arc<dyn Sleeper>,
    jitter: Arc<dyn JitterSource>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Arc::new(TokioSleeper), Arc::new(RandomJitter))
    }
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor").finish_non_exhaustive()
    }
}

impl RetryExecutor {
    pub fn new(sleeper: Arc<dyn Sleeper>, jitter: Arc<dyn JitterSource>) -> Self {
        Self { sleeper, jitter }
    }

    /// Run `operation` under `policy` with no context or hook.
    pub async fn execute<T, E, F, Fut>(&self, policy: &RetryPolicy, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClassify + From<ExecutorFault> + fmt::Display,
    {
        self.execute_with(policy, ExecuteOptions::default(), operation)
            .await
    }

    /// Run `operation` under `policy`.
    ///
    /// Returns the first success, or the last observed error once retries are
    /// exhausted or a non-retryable error is seen.
    pub async fn execute_with<T, E, F, Fut>(
        &self,
        policy: &RetryPolicy,
        options: ExecuteOptions<'_, E>,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryClassify + From<ExecutorFault> + fmt::Display,
    {
        let context = options.context.unwrap_or("external_call");
        let mut attempt: u32 = 0;

        let (outcome, error) = loop {
            metrics::record_call_attempt(context);
            let error = match with_attempt_timeout(policy.timeout(), operation()).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(context, attempts = attempt + 1, "Call succeeded after retry");
                    }
                    metrics::record_call_outcome(context, Outcome::Succeeded.as_str());
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt >= policy.max_retries {
                break (Outcome::Exhausted, error);
            }

            let classification = classify(&error, policy);
            if !classification.is_retryable() {
                tracing::warn!(
                    context,
                    attempt,
                    error = %error,
                    "Aborting: error is not retryable"
                );
                break (Outcome::Aborted, error);
            }

            let delay = calculate_backoff(
                attempt,
                policy.base_delay_ms,
                policy.max_delay_ms,
                self.jitter.sample(),
            );
            tracing::info!(
                context,
                attempt,
                delay_ms = delay.as_millis() as u64,
                class = classification.as_str(),
                error = %error,
                "Retrying call"
            );

            if let Some(hook) = options.on_retry {
                let notice = RetryNotice {
                    attempt,
                    delay,
                    error: &error,
                    context,
                };
                if let Err(hook_error) = hook(&notice) {
                    tracing::warn!(context, attempt, error = %hook_error, "Pre-retry hook failed");
                }
            }

            self.sleeper.sleep(delay).await;
            attempt += 1;
        };

        tracing::error!(
            context,
            attempts = attempt + 1,
            outcome = outcome.as_str(),
            error = %error,
            "Call failed"
        );
        metrics::record_call_outcome(context, outcome.as_str());
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::backoff::FixedJitter;
    use crate::resilience::error::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            timeout_ms: 1000,
            ..RetryPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success_never_sleeps() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = RetryExecutor::new(sleeper.clone(), Arc::new(FixedJitter(0.0)));

        let result: Result<&str, ApiError> = executor.execute(&policy(3), || async { Ok("ok") }).await;
        assert_eq!(result.unwrap(), "ok");
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hook_failure_is_swallowed() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = RetryExecutor::new(sleeper.clone(), Arc::new(FixedJitter(0.0)));
        let calls = AtomicU32::new(0);
        let hook_calls = AtomicU32::new(0);

        let hook = |notice: &RetryNotice<'_, ApiError>| -> Result<(), HookError> {
            hook_calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(notice.context, "hooked");
            Err("hook exploded".into())
        };

        let result: Result<u32, ApiError> = executor
            .execute_with(
                &policy(3),
                ExecuteOptions::context("hooked").on_retry(&hook),
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(ApiError::RateLimited("busy".into()))
                        } else {
                            Ok(n)
                        }
                    }
                },
            )
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*sleeper.delays.lock().unwrap(), vec![Duration::from_millis(100)]);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_single_attempt() {
        let executor = RetryExecutor::new(
            Arc::new(RecordingSleeper::default()),
            Arc::new(FixedJitter(0.0)),
        );
        let calls = AtomicU32::new(0);

        let result: Result<(), ApiError> = executor
            .execute(&policy(0), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::RateLimited("busy".into())) }
            })
            .await;

        assert!(matches!(result, Err(ApiError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_retryable_attempt() {
        let executor = RetryExecutor::new(
            Arc::new(RecordingSleeper::default()),
            Arc::new(FixedJitter(0.0)),
        );
        let calls = AtomicU32::new(0);
        let mut short = policy(1);
        short.timeout_ms = 50;

        let result: Result<u32, ApiError> = executor
            .execute(&short, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                    }
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
