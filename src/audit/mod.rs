//! Audit trail for registry mutations.
//!
//! # Data Flow
//! ```text
//! credentials / defaults (every create, update, rotate, set-default)
//!     → AuditEvent (type, actor, payload with success / error)
//!     → emit() (metrics + failure logging)
//!     → AuditSink (store collection, tracing target, or memory)
//! ```
//!
//! # Design Decisions
//! - Events are written for both outcomes of an operation
//! - Callers decide whether a failed audit write is fatal; `emit` only reports it

pub mod events;
pub mod sink;

use std::sync::Arc;

pub use events::{AuditEvent, AuditEventType};
pub use sink::{AuditError, AuditSink, MemoryAuditSink, StoreAuditSink, TracingAuditSink};

use crate::config::{AuditConfig, AuditSinkKind};
use crate::observability::metrics;
use crate::store::DocumentStore;

/// Write `event` to `sink`, logging and counting the result.
pub async fn emit(sink: &dyn AuditSink, event: AuditEvent) -> Result<(), AuditError> {
    let event_type = event.event_type.as_str();
    let result = sink.record(&event).await;
    metrics::record_audit_event(event_type, result.is_ok());
    if let Err(e) = &result {
        tracing::warn!(
            event_type,
            actor = %event.actor_id,
            error = %e,
            "Failed to write audit record"
        );
    }
    result
}

/// Build the sink selected by configuration.
pub fn sink_from_config(
    config: &AuditConfig,
    store: Arc<dyn DocumentStore>,
    collection: &str,
) -> Arc<dyn AuditSink> {
    match config.sink {
        AuditSinkKind::Store => Arc::new(StoreAuditSink::new(store, collection)),
        AuditSinkKind::Log => Arc::new(TracingAuditSink),
    }
}
