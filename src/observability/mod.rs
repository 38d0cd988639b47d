//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges via the `metrics` facade)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (provider_id, actor, attempt) instead of formatted strings
//! - Secrets never appear in log fields; keys are redacted by their own Display
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
