//! Retry classification.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is eligible for another attempt
//! - Recognise network-fault signals regardless of policy
//! - Fall back to status-code membership in the policy's retryable set
//!
//! # Design Decisions
//! - Network faults, rate limits and timeouts are always retryable
//! - Status is read from the error, then its response, then the original error's response
//! - Anything without a signal is terminal

use std::fmt;
use std::io;

use crate::resilience::policy::RetryPolicy;

/// Transport-level failures that are always worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkFault {
    ConnectionReset,
    TimedOut,
    ConnectionAborted,
    NetworkUnreachable,
    NameResolution,
}

impl NetworkFault {
    /// Parse a conventional socket error code (`ECONNRESET`, `ENOTFOUND`, ...).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "ECONNRESET" => Some(Self::ConnectionReset),
            "ETIMEDOUT" | "ESOCKETTIMEDOUT" => Some(Self::TimedOut),
            "ECONNABORTED" => Some(Self::ConnectionAborted),
            "ENETUNREACH" | "EHOSTUNREACH" => Some(Self::NetworkUnreachable),
            "ENOTFOUND" | "EAI_AGAIN" => Some(Self::NameResolution),
            _ => None,
        }
    }

    pub fn from_io_kind(kind: io::ErrorKind) -> Option<Self> {
        match kind {
            io::ErrorKind::ConnectionReset => Some(Self::ConnectionReset),
            io::ErrorKind::TimedOut => Some(Self::TimedOut),
            io::ErrorKind::ConnectionAborted => Some(Self::ConnectionAborted),
            io::ErrorKind::NetworkUnreachable | io::ErrorKind::HostUnreachable => {
                Some(Self::NetworkUnreachable)
            }
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionReset => "ECONNRESET",
            Self::TimedOut => "ETIMEDOUT",
            Self::ConnectionAborted => "ECONNABORTED",
            Self::NetworkUnreachable => "ENETUNREACH",
            Self::NameResolution => "ENOTFOUND",
        }
    }
}

impl fmt::Display for NetworkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error categories that are retryable independent of status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    RateLimit,
    Timeout,
}

/// Signals the executor reads from a failed attempt.
///
/// All methods default to "no signal", so an error type only implements
/// what it can actually report.
pub trait RetryClassify {
    fn network_fault(&self) -> Option<NetworkFault> {
        None
    }

    fn category(&self) -> Option<ErrorCategory> {
        None
    }

    /// Status code carried directly by the error.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Status code of a response object attached to the error.
    fn response_status(&self) -> Option<u16> {
        None
    }

    /// The error this one wraps, if any.
    fn original(&self) -> Option<&dyn RetryClassify> {
        None
    }
}

/// Result of classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    TransientNetwork(NetworkFault),
    RateLimit,
    Timeout,
    RetryableStatus(u16),
    Terminal,
}

impl Classification {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Classification::Terminal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::TransientNetwork(_) => "transient_network",
            Classification::RateLimit => "rate_limit",
            Classification::Timeout => "timeout",
            Classification::RetryableStatus(_) => "retryable_status",
            Classification::Terminal => "terminal",
        }
    }
}

/// Classify `error` against `policy`.
pub fn classify<E: RetryClassify + ?Sized>(error: &E, policy: &RetryPolicy) -> Classification {
    if let Some(fault) = error.network_fault() {
        return Classification::TransientNetwork(fault);
    }
    match error.category() {
        Some(ErrorCategory::RateLimit) => return Classification::RateLimit,
        Some(ErrorCategory::Timeout) => return Classification::Timeout,
        None => {}
    }
    let status = error
        .status_code()
        .or_else(|| error.response_status())
        .or_else(|| error.original().and_then(|original| original.response_status()));
    match status {
        Some(code) if policy.is_retryable_status(code) => Classification::RetryableStatus(code),
        _ => Classification::Terminal,
    }
}

/// Check if `error` is retryable under `policy`.
pub fn is_retryable<E: RetryClassify + ?Sized>(error: &E, policy: &RetryPolicy) -> bool {
    classify(error, policy).is_retryable()
}
