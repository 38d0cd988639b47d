//! Retry executor behaviour against the documented scenarios.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use provider_registry::resilience::{
    ApiError, ExecuteOptions, FixedJitter, HookError, NetworkFault, RandomJitter, ResponseInfo,
    RetryExecutor, RetryNotice, RetryPolicy, Sleeper,
};

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

impl RecordingSleeper {
    fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

fn policy(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay_ms,
        max_delay_ms,
        ..RetryPolicy::default()
    }
}

fn unavailable() -> ApiError {
    ApiError::Status {
        status: 503,
        message: "service unavailable".into(),
    }
}

#[tokio::test]
async fn test_three_503s_then_success() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let executor = RetryExecutor::new(sleeper.clone(), Arc::new(RandomJitter));
    let calls = AtomicU32::new(0);

    let result: Result<&str, ApiError> = executor
        .execute(&policy(3, 500, 8000), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(unavailable())
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let delays = sleeper.delays();
    assert_eq!(delays.len(), 3);
    for (k, delay) in delays.iter().enumerate() {
        let floor = 500u64 << k;
        let ceiling = ((floor as f64) * 1.2).min(8000.0) as u64;
        let ms = delay.as_millis() as u64;
        assert!(ms >= floor && ms <= ceiling, "attempt {k}: {ms}ms outside [{floor}, {ceiling}]");
    }
}

#[tokio::test]
async fn test_non_retryable_error_makes_one_attempt() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let executor = RetryExecutor::new(sleeper.clone(), Arc::new(FixedJitter(0.0)));
    let calls = AtomicU32::new(0);

    let result: Result<(), ApiError> = executor
        .execute(&policy(5, 100, 1000), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ApiError::Status {
                    status: 400,
                    message: "bad request".into(),
                })
            }
        })
        .await;

    assert!(matches!(result, Err(ApiError::Status { status: 400, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_always_retryable_exhausts_and_returns_last_error() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let executor = RetryExecutor::new(sleeper.clone(), Arc::new(FixedJitter(0.0)));
    let calls = AtomicU32::new(0);

    let result: Result<(), ApiError> = executor
        .execute(&policy(4, 100, 250), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(ApiError::RateLimited(format!("attempt {n}"))) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    match result {
        Err(ApiError::RateLimited(message)) => assert_eq!(message, "attempt 4"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(250),
            Duration::from_millis(250),
        ]
    );
}

#[tokio::test]
async fn test_nested_response_status_is_classified() {
    let executor = RetryExecutor::new(
        Arc::new(RecordingSleeper::default()),
        Arc::new(FixedJitter(0.0)),
    );
    let calls = AtomicU32::new(0);

    let result: Result<u32, ApiError> = executor
        .execute(&policy(2, 10, 100), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ApiError::Wrapped {
                        message: "vendor SDK failure".into(),
                        original: Box::new(ApiError::Response {
                            message: "bad gateway".into(),
                            response: ResponseInfo {
                                status: 502,
                                body: None,
                            },
                        }),
                    })
                } else if n == 1 {
                    Err(ApiError::Network(NetworkFault::ConnectionReset))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 2);
}

#[tokio::test]
async fn test_hook_sees_each_retry_in_order() {
    let executor = RetryExecutor::new(
        Arc::new(RecordingSleeper::default()),
        Arc::new(FixedJitter(0.0)),
    );
    let seen = Mutex::new(Vec::new());
    let hook = |notice: &RetryNotice<'_, ApiError>| -> Result<(), HookError> {
        seen.lock().unwrap().push((notice.attempt, notice.delay));
        Ok(())
    };
    let calls = AtomicU32::new(0);

    let result: Result<u32, ApiError> = executor
        .execute_with(
            &policy(3, 10, 1000),
            ExecuteOptions::context("hook-order").on_retry(&hook),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(unavailable())
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(0, Duration::from_millis(10)), (1, Duration::from_millis(20))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_late_result_is_discarded_after_timeout() {
    let executor = RetryExecutor::default();
    let calls = Arc::new(AtomicU32::new(0));
    let mut short = policy(0, 10, 100);
    short.timeout_ms = 100;

    let counter = calls.clone();
    let result: Result<u32, ApiError> = executor
        .execute(&short, || {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(counter.fetch_add(1, Ordering::SeqCst))
            }
        })
        .await;

    assert!(matches!(result, Err(ApiError::Timeout(_))));
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
