//! Provider key probes.
//!
//! # Data Flow
//! ```text
//! test_api_key(id):
//!     → registry view (type, subtype)
//!     → credential manager raw key (active / expiry checks)
//!     → catalog.rs (ProbeTarget → Prober, length-only fallback)
//!     → format.rs (shape check) → live.rs (optional vendor round trip via RetryExecutor)
//!     → lastTested / lastTestResult / lastTestMessage persisted
//! ```

pub mod catalog;
pub mod format;
pub mod harness;
pub mod live;
pub mod types;

pub use catalog::ProberSet;
pub use format::{Charset, FormatProber, KeyFormat, LengthProber, PaymentProber};
pub use harness::ProviderTester;
pub use live::{KeyPlacement, LiveCheck};
pub use types::{ProbeError, ProbeOutcome, ProbeTarget, Prober};
