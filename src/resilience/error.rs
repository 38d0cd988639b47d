//! Error types for external calls and their retry signals.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::resilience::retries::{ErrorCategory, NetworkFault, RetryClassify};
use crate::store::StoreError;

/// Failures produced by the executor itself rather than by the wrapped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecutorFault {
    /// The attempt did not complete before its deadline.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

/// Response metadata attached to an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    pub status: u16,
    pub body: Option<String>,
}

/// Errors from calls to external APIs.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure.
    #[error("network fault: {0}")]
    Network(NetworkFault),

    /// Vendor asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Attempt exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Vendor answered with a failing status.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// Failure carrying the full response object.
    #[error("{message} (status {})", .response.status)]
    Response {
        message: String,
        response: ResponseInfo,
    },

    /// Failure raised while handling another error.
    #[error("{message}: {original}")]
    Wrapped {
        message: String,
        #[source]
        original: Box<ApiError>,
    },

    /// HTTP client failure.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl From<ExecutorFault> for ApiError {
    fn from(fault: ExecutorFault) -> Self {
        match fault {
            ExecutorFault::Timeout(after) => ApiError::Timeout(after),
        }
    }
}

impl RetryClassify for ApiError {
    fn network_fault(&self) -> Option<NetworkFault> {
        match self {
            ApiError::Network(fault) => Some(*fault),
            ApiError::Http(e) => io_fault_in_chain(e).or_else(|| {
                e.is_connect().then_some(NetworkFault::NetworkUnreachable)
            }),
            _ => None,
        }
    }

    fn category(&self) -> Option<ErrorCategory> {
        match self {
            ApiError::RateLimited(_) => Some(ErrorCategory::RateLimit),
            ApiError::Timeout(_) => Some(ErrorCategory::Timeout),
            ApiError::Http(e) if e.is_timeout() => Some(ErrorCategory::Timeout),
            _ => None,
        }
    }

    fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    fn response_status(&self) -> Option<u16> {
        match self {
            ApiError::Response { response, .. } => Some(response.status),
            _ => None,
        }
    }

    fn original(&self) -> Option<&dyn RetryClassify> {
        match self {
            ApiError::Wrapped { original, .. } => Some(original.as_ref()),
            _ => None,
        }
    }
}

impl From<ExecutorFault> for StoreError {
    fn from(fault: ExecutorFault) -> Self {
        match fault {
            ExecutorFault::Timeout(after) => StoreError::Timeout(after),
        }
    }
}

impl RetryClassify for StoreError {
    fn network_fault(&self) -> Option<NetworkFault> {
        match self {
            StoreError::Io(e) => NetworkFault::from_io_kind(e.kind()),
            _ => None,
        }
    }

    fn category(&self) -> Option<ErrorCategory> {
        match self {
            StoreError::Timeout(_) => Some(ErrorCategory::Timeout),
            _ => None,
        }
    }

    fn status_code(&self) -> Option<u16> {
        match self {
            StoreError::Unavailable(_) => Some(503),
            _ => None,
        }
    }
}

/// Walk an error's source chain for an I/O error that maps to a network fault.
fn io_fault_in_chain(error: &(dyn StdError + 'static)) -> Option<NetworkFault> {
    let mut current = error.source();
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<io::Error>() {
            if let Some(fault) = NetworkFault::from_io_kind(io_err.kind()) {
                return Some(fault);
            }
        }
        current = source.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::policy::RetryPolicy;
    use crate::resilience::retries::{classify, Classification};

    #[test]
    fn test_executor_fault_conversion() {
        let err: ApiError = ExecutorFault::Timeout(Duration::from_millis(50)).into();
        assert!(matches!(err, ApiError::Timeout(d) if d == Duration::from_millis(50)));
        assert_eq!(err.category(), Some(ErrorCategory::Timeout));
    }

    #[test]
    fn test_store_error_classification() {
        let policy = RetryPolicy::default();
        assert_eq!(
            classify(&StoreError::Unavailable("down".into()), &policy),
            Classification::RetryableStatus(503)
        );
        let reset = StoreError::Io(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(
            classify(&reset, &policy),
            Classification::TransientNetwork(NetworkFault::ConnectionReset)
        );
        let missing = StoreError::NotFound {
            collection: "providers".into(),
            id: "x".into(),
        };
        assert_eq!(classify(&missing, &policy), Classification::Terminal);
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::Response {
            message: "upstream busy".into(),
            response: ResponseInfo {
                status: 503,
                body: None,
            },
        };
        assert_eq!(err.to_string(), "upstream busy (status 503)");
    }
}
