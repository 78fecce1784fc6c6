//! Shared test utilities for event loop and chaos tests.
//!
//! This module provides:
//! - A scripted replication connection driven by (paused) tokio time
//! - A recording batch handler
//! - Message and position helpers

#![allow(dead_code)]

pub mod mock_connection;
pub mod recording_handler;

pub use mock_connection::*;
pub use recording_handler::*;

use cdc_consumer::{LogPosition, RawMessage};
use serde_json::json;
use std::sync::Once;

static INIT: Once = Once::new();

/// Route consumer logs to the test writer. Set `RUST_LOG` to see them.
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn pos(value: u64) -> LogPosition {
    LogPosition::new(value)
}

/// A `change` whose payload is its own position, so batches read as positions.
pub fn change_at(position: u64) -> RawMessage {
    RawMessage::change(json!(position), position)
}

/// `begin(begin)`, one change per `changes` entry, `commit(commit)`.
pub fn transaction(begin: u64, changes: &[u64], commit: u64) -> Vec<RawMessage> {
    let mut messages = vec![RawMessage::begin(begin)];
    messages.extend(changes.iter().map(|&p| change_at(p)));
    messages.push(RawMessage::commit(commit));
    messages
}
