//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Messages read from the replication stream
//! - Transaction assembly (completed, empty, protocol violations)
//! - Batch flushes and handler latency
//! - Confirmed position and keepalives
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `cdc_consumer_`, labelled by `slot`, and
//! follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! # Usage
//!
//! ```rust,no_run
//! use cdc_consumer::metrics;
//! use std::time::Duration;
//!
//! // In the event loop after a flush
//! metrics::record_batch_flush("orders_slot", 2, 3, Duration::from_millis(50));
//! ```

use crate::position::LogPosition;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one message read from the connection.
pub fn record_message_read(slot: &str, kind: &str) {
    counter!(
        "cdc_consumer_messages_read_total",
        "slot" => slot.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a completed transaction and its event count.
pub fn record_transaction_assembled(slot: &str, events: usize) {
    counter!("cdc_consumer_transactions_assembled_total", "slot" => slot.to_string()).increment(1);
    histogram!("cdc_consumer_transaction_events", "slot" => slot.to_string()).record(events as f64);
}

/// Record a committed transaction with no events (dropped).
pub fn record_empty_transaction(slot: &str) {
    counter!("cdc_consumer_empty_transactions_total", "slot" => slot.to_string()).increment(1);
}

/// Record a protocol violation.
pub fn record_protocol_violation(slot: &str, kind: &str) {
    counter!(
        "cdc_consumer_protocol_violations_total",
        "slot" => slot.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a batch handed to the handler.
pub fn record_batch_flush(slot: &str, transactions: usize, events: usize, duration: Duration) {
    let slot = slot.to_string();

    counter!("cdc_consumer_batches_flushed_total", "slot" => slot.clone()).increment(1);
    counter!("cdc_consumer_batch_events_total", "slot" => slot.clone()).increment(events as u64);
    histogram!("cdc_consumer_batch_transactions", "slot" => slot.clone()).record(transactions as f64);
    histogram!("cdc_consumer_batch_handle_duration_seconds", "slot" => slot)
        .record(duration.as_secs_f64());
}

/// Set the number of transactions waiting in the pending batch.
pub fn set_pending_transactions(slot: &str, count: usize) {
    gauge!("cdc_consumer_pending_transactions", "slot" => slot.to_string()).set(count as f64);
}

/// Set the last confirmed position.
pub fn record_confirmed_position(slot: &str, position: LogPosition) {
    gauge!("cdc_consumer_confirmed_position", "slot" => slot.to_string()).set(position.as_u64() as f64);
}

/// Record a keepalive by kind (`position` or `empty`).
pub fn record_keepalive(slot: &str, kind: &str) {
    counter!(
        "cdc_consumer_keepalives_total",
        "slot" => slot.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a confirmation that would have regressed and was clamped.
pub fn record_confirmation_clamped(slot: &str) {
    counter!("cdc_consumer_confirmation_clamped_total", "slot" => slot.to_string()).increment(1);
}

/// Record the error that ended a run.
pub fn record_error(slot: &str, error_type: &str) {
    counter!(
        "cdc_consumer_errors_total",
        "slot" => slot.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

// =============================================================================
// SLO Violation Metrics
// =============================================================================

/// Record an SLO violation (latency threshold exceeded).
///
/// Labels:
/// - `slot`: The slot whose handler violated the SLO
/// - `slo_type`: The type of SLO violated (batch_handle)
pub fn record_slo_violation(slot: &str, slo_type: &str, latency_ms: u64) {
    counter!(
        "cdc_consumer_slo_violations_total",
        "slot" => slot.to_string(),
        "slo_type" => slo_type.to_string()
    )
    .increment(1);

    histogram!(
        "cdc_consumer_slo_violation_latency_ms",
        "slot" => slot.to_string(),
        "slo_type" => slo_type.to_string()
    )
    .record(latency_ms as f64);
}
