//! Configuration for the CDC consumer.
//!
//! Configuration is fixed for the lifetime of a run: it is passed to
//! [`EventLoop::new()`](crate::EventLoop::new), validated once, and never
//! re-read. It can be constructed programmatically or deserialized from
//! YAML/JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use cdc_consumer::config::ConsumerConfig;
//!
//! let config = ConsumerConfig {
//!     slot_name: "orders_slot".into(),
//!     max_transactions_gather_count: Some(500),
//!     max_transactions_gather_time: Some("2s".into()),
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! ConsumerConfig
//! ├── slot_name: String                          # label for logs and metrics
//! ├── max_transactions_gather_count: Option<usize>  # count trigger
//! ├── max_transactions_gather_time: Option<String>  # time trigger ("500ms", "5s")
//! ├── keepalive_interval: String                 # idle feedback cadence
//! └── slo: SloConfig                             # handler latency warning
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! slot_name: "orders_slot"
//! max_transactions_gather_count: 500
//! max_transactions_gather_time: "2s"
//! keepalive_interval: "10s"
//! slo:
//!   max_batch_handle_latency_ms: 1000
//! ```

use crate::error::{ConsumerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config: passed to EventLoop::new()
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object passed to `EventLoop::new()`.
///
/// # Fields
///
/// - `slot_name`: Replication slot this consumer reads. Only used to label logs and metrics.
/// - `max_transactions_gather_count`: Flush once the batch holds this many transactions.
/// - `max_transactions_gather_time`: Flush no later than this long after the first
///   transaction entered the batch.
/// - `keepalive_interval`: Fixed cadence for keepalive feedback.
/// - `slo`: Latency thresholds that trigger warnings.
///
/// With both gather thresholds unset, every completed transaction is flushed
/// on the next idle turn (count threshold of 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_slot_name")]
    pub slot_name: String,

    #[serde(default)]
    pub max_transactions_gather_count: Option<usize>,

    /// Duration string (e.g., "500ms", "5s"), parsed with `humantime`.
    #[serde(default)]
    pub max_transactions_gather_time: Option<String>,

    /// Duration string (e.g., "10s"), parsed with `humantime`.
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: String,

    #[serde(default)]
    pub slo: SloConfig,
}

fn default_slot_name() -> String {
    "cdc_consumer".to_string()
}

fn default_keepalive_interval() -> String {
    "10s".to_string()
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            slot_name: default_slot_name(),
            max_transactions_gather_count: None,
            max_transactions_gather_time: None,
            keepalive_interval: default_keepalive_interval(),
            slo: SloConfig::default(),
        }
    }
}

impl ConsumerConfig {
    /// Create a config for testing with a short keepalive.
    pub fn for_testing(slot_name: &str) -> Self {
        Self {
            slot_name: slot_name.to_string(),
            keepalive_interval: "5s".to_string(),
            ..Self::default()
        }
    }

    /// Parse `max_transactions_gather_time`.
    pub fn gather_time_duration(&self) -> Result<Option<Duration>> {
        self.max_transactions_gather_time
            .as_deref()
            .map(|text| parse_positive_duration("max_transactions_gather_time", text))
            .transpose()
    }

    /// Parse `keepalive_interval`.
    pub fn keepalive_interval_duration(&self) -> Result<Duration> {
        parse_positive_duration("keepalive_interval", &self.keepalive_interval)
    }

    /// Check every field, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.max_transactions_gather_count == Some(0) {
            return Err(ConsumerError::Config(
                "max_transactions_gather_count must be at least 1".to_string(),
            ));
        }
        self.gather_time_duration()?;
        self.keepalive_interval_duration()?;
        Ok(())
    }
}

/// Upper bound for every configured duration (one year).
pub const MAX_CONFIG_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

fn parse_positive_duration(field: &str, text: &str) -> Result<Duration> {
    let duration = humantime::parse_duration(text)
        .map_err(|e| ConsumerError::Config(format!("{}: invalid duration '{}': {}", field, text, e)))?;
    if duration.is_zero() {
        return Err(ConsumerError::Config(format!("{} must be positive", field)));
    }
    if duration > MAX_CONFIG_DURATION {
        return Err(ConsumerError::Config(format!(
            "{} must be at most {}",
            field,
            humantime::format_duration(MAX_CONFIG_DURATION)
        )));
    }
    Ok(duration)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SloConfig: latency thresholds for alerting
// ═══════════════════════════════════════════════════════════════════════════════

/// SLO thresholds for detecting a slow downstream.
///
/// Violations are logged and counted; they never change loop behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloConfig {
    /// Maximum acceptable batch handler latency (ms).
    #[serde(default = "default_max_batch_handle_latency_ms")]
    pub max_batch_handle_latency_ms: u64,
}

fn default_max_batch_handle_latency_ms() -> u64 {
    1000
}

impl Default for SloConfig {
    fn default() -> Self {
        Self {
            max_batch_handle_latency_ms: default_max_batch_handle_latency_ms(),
        }
    }
}

impl SloConfig {
    /// Check if a batch handler latency violates SLO.
    pub fn is_batch_handle_violation(&self, latency: Duration) -> bool {
        latency.as_millis() as u64 > self.max_batch_handle_latency_ms
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
