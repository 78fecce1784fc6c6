// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the CDC consumer.
//!
//! Every error surfaced by the consumer is fatal to the current run: nothing
//! is retried inside the event loop. The embedding application owns the
//! restart/backoff policy and uses [`ConsumerError::is_retryable()`] to decide
//! whether restarting the whole run can help.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Connection` | Yes | Replication connection read/feedback failed or was closed |
//! | `Handler` | Yes | Downstream batch handler failed (batch is re-delivered after restart) |
//! | `ProtocolViolation` | No | Message kind invalid for the assembler's state |
//! | `Config` | No | Configuration invalid |
//!
//! # Shutdown
//!
//! Closing the replication connection is the only way to stop a running
//! loop. It surfaces as `Connection(ConnectionError::Closed)`; use
//! [`ConsumerError::is_shutdown()`] to tell it apart from a real failure.

use crate::connection::ConnectionError;
use crate::handler::HandlerError;
use crate::message::MessageKind;
use crate::position::LogPosition;
use thiserror::Error;

/// Result type alias for consumer operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;

/// Errors that can end a consumer run.
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// A message arrived that is invalid for the assembler's current state.
    ///
    /// Examples: `commit` with no open transaction, `begin` inside an open
    /// transaction, or a commit position lower than one already batched.
    /// The upstream ordering invariant is broken and cannot be repaired here.
    #[error("Protocol violation at {position}: {kind} received while {state}")]
    ProtocolViolation {
        state: String,
        kind: MessageKind,
        position: LogPosition,
    },

    /// Replication connection failure, including an orderly close.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The downstream batch handler returned an error.
    ///
    /// The batch is never confirmed, so a restart re-delivers it.
    #[error("Batch handler error: {0}")]
    Handler(#[from] HandlerError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConsumerError {
    /// Build a protocol violation for `kind` observed in `state`.
    pub fn protocol(state: impl Into<String>, kind: MessageKind, position: LogPosition) -> Self {
        Self::ProtocolViolation {
            state: state.into(),
            kind,
            position,
        }
    }

    /// Check if restarting the run may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Handler(_) => true,
            Self::ProtocolViolation { .. } => false,
            Self::Config(_) => false,
        }
    }

    /// Check if this error is the connection being closed.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Connection(ConnectionError::Closed))
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProtocolViolation { .. } => "protocol_violation",
            Self::Connection(ConnectionError::Closed) => "connection_closed",
            Self::Connection(_) => "connection",
            Self::Handler(_) => "handler",
            Self::Config(_) => "config",
        }
    }
}
