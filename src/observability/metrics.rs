//! Metrics collection and exposition.
//!
//! # Metrics
//! - `registry_cache_size` (gauge): providers currently cached
//! - `registry_cache_events_total` (counter): feed events applied, by kind
//! - `external_call_attempts_total` (counter): executor attempts, by context
//! - `external_call_outcomes_total` (counter): terminal outcomes, by context and outcome
//! - `audit_events_total` (counter): audit records, by event type and outcome
//! - `provider_probes_total` (counter): probe results, by provider type and outcome
//! - `api_key_access_total` (counter): raw key reads, by outcome

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_size(size: usize) {
    gauge!("registry_cache_size").set(size as f64);
}

pub fn record_cache_event(kind: &'static str) {
    counter!("registry_cache_events_total", "kind" => kind).increment(1);
}

pub fn record_call_attempt(context: &str) {
    counter!("external_call_attempts_total", "context" => context.to_string()).increment(1);
}

pub fn record_call_outcome(context: &str, outcome: &'static str) {
    counter!(
        "external_call_outcomes_total",
        "context" => context.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_audit_event(event_type: &'static str, success: bool) {
    counter!(
        "audit_events_total",
        "event_type" => event_type,
        "outcome" => outcome_label(success)
    )
    .increment(1);
}

pub fn record_probe_result(provider_type: &'static str, success: bool) {
    counter!(
        "provider_probes_total",
        "provider_type" => provider_type,
        "outcome" => outcome_label(success)
    )
    .increment(1);
}

pub fn record_key_access(success: bool) {
    counter!("api_key_access_total", "outcome" => outcome_label(success)).increment(1);
}

fn outcome_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
