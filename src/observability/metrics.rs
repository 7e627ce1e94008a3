//! Metrics collection and exposition.
//!
//! # Metrics
//! - `access_decisions_total` (counter): decisions by outcome, justification
//! - `casa_verifications_total` (counter): CASA checks by result
//! - `repository_errors_total` (counter): failed lookups by operation, kind
//! - `embargo_data_quality_warnings_total` (counter): bad metadata by kind
//! - `resolved_subscriptions` (histogram): subscriptions resolved per request
//!
//! # Design Decisions
//! - Facade calls are no-ops until [`init_metrics`] installs the exporter
//! - Label values are static strings, never user input

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_decision(outcome: &'static str, justification: &'static str) {
    counter!(
        "access_decisions_total",
        "outcome" => outcome,
        "justification" => justification
    )
    .increment(1);
}

pub fn record_casa_verification(result: &'static str) {
    counter!("casa_verifications_total", "result" => result).increment(1);
}

pub fn record_repository_error(operation: &'static str, kind: &'static str) {
    counter!("repository_errors_total", "operation" => operation, "kind" => kind).increment(1);
}

pub fn record_data_quality_warning(kind: &'static str) {
    counter!("embargo_data_quality_warnings_total", "kind" => kind).increment(1);
}

pub fn record_resolved_subscriptions(count: usize) {
    histogram!("resolved_subscriptions").record(count as f64);
}
