//! Credential lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! create / update / rotate:
//!     → validation.rs (reject bad input before any write)
//!     → DocumentStore (insert / partial update)
//!     → registry cache (upsert, ahead of the change feed)
//!     → audit (both outcomes)
//!
//! get_api_key:
//!     → registry (cache, then point read)
//!     → active + expiry checks
//!     → access_log.rs (detached write, both outcomes)
//! ```
//!
//! # Design Decisions
//! - Only `get_api_key` returns a raw key; every other result is a redacted view
//! - Rotation is the only operation that writes `previousKey`

pub mod access_log;
pub mod manager;
pub mod validation;

pub use access_log::{AccessLogEntry, AccessLogSink, MemoryAccessLog, StoreAccessLog};
pub use manager::{CredentialManager, TestResult};
pub use validation::{NewProvider, ProviderUpdate};
