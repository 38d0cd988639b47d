//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! External call:
//!     → policy.rs (resolve an immutable RetryPolicy for the API-class tag)
//!     → executor.rs (attempt loop)
//!         → timeouts.rs (race each attempt against its own deadline)
//!         → On failure: retries.rs (classify: transient / rate-limit / timeout / status / terminal)
//!         → backoff.rs (exponential delay with jitter, capped)
//!         → Sleeper (cooperative suspension, injectable)
//! ```
//!
//! # Design Decisions
//! - The executor is stateless; every invocation carries its own attempt counter
//! - Timeouts are per attempt, not per call; a late result is discarded
//! - The last observed error is returned unchanged so callers see the root cause
//! - Backoff is a pure function; sleep and jitter are injected for testing

pub mod backoff;
pub mod error;
pub mod executor;
pub mod policy;
pub mod retries;
pub mod timeouts;

pub use error::{ApiError, ExecutorFault, ResponseInfo};
pub use backoff::{calculate_backoff, FixedJitter, JitterSource, RandomJitter};
pub use executor::{
    ExecuteOptions, HookError, Outcome, RetryExecutor, RetryHook, RetryNotice, Sleeper, TokioSleeper,
};
pub use policy::{PolicyOverride, RetryPolicies, RetryPolicy, SharedPolicies};
pub use retries::{classify, is_retryable, Classification, ErrorCategory, NetworkFault, RetryClassify};
