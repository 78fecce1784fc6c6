// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication connection interface.
//!
//! Establishing the connection, authenticating, managing the replication
//! slot and decoding the wire protocol all live behind this trait. The
//! consumer only needs to poll decoded messages, wait for readability, learn
//! the current stream position and send flush feedback.
//!
//! # Example
//!
//! ```rust,no_run
//! use cdc_consumer::connection::{BoxFuture, ConnectionError, ReplicationConnection};
//! use cdc_consumer::{LogPosition, RawMessage};
//! use std::collections::VecDeque;
//!
//! struct Replay {
//!     queue: VecDeque<RawMessage>,
//!     position: LogPosition,
//! }
//!
//! impl ReplicationConnection for Replay {
//!     fn poll_message(&mut self) -> Result<Option<RawMessage>, ConnectionError> {
//!         match self.queue.pop_front() {
//!             Some(message) => {
//!                 self.position = message.position;
//!                 Ok(Some(message))
//!             }
//!             None => Err(ConnectionError::Closed),
//!         }
//!     }
//!
//!     fn wait_readable(&mut self) -> BoxFuture<'_, ()> {
//!         Box::pin(async move { Ok(()) })
//!     }
//!
//!     fn current_position(&self) -> LogPosition {
//!         self.position
//!     }
//!
//!     fn send_feedback(&mut self, _flush: Option<LogPosition>) -> BoxFuture<'_, ()> {
//!         Box::pin(async move { Ok(()) })
//!     }
//! }
//! ```

use crate::message::RawMessage;
use crate::position::LogPosition;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Type alias for boxed connection futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ConnectionError>> + Send + 'a>>;

/// Failure reported by a replication connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection was closed. This is how a running consumer is stopped.
    #[error("replication connection closed")]
    Closed,

    /// Read, wait or feedback failed.
    #[error("{operation} failed: {message}")]
    Io { operation: String, message: String },
}

impl ConnectionError {
    pub fn io(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// What the consumer needs from a logical-replication connection.
///
/// All methods are called from the single consumer task; implementations
/// need not be `Sync`.
pub trait ReplicationConnection: Send {
    /// Return the next decoded message if one is buffered.
    ///
    /// Must never block. `Ok(None)` means nothing is available right now.
    /// After the connection is closed this returns `Err(ConnectionError::Closed)`.
    fn poll_message(&mut self) -> Result<Option<RawMessage>, ConnectionError>;

    /// Resolve once a message may be readable or the connection has closed.
    ///
    /// Spurious wake-ups are allowed: the consumer polls again and waits
    /// again if nothing is there. The consumer bounds this wait with its own
    /// timeout, so implementations should not add one.
    fn wait_readable(&mut self) -> BoxFuture<'_, ()>;

    /// Best-known current stream position, used for idle keepalives.
    fn current_position(&self) -> LogPosition;

    /// Send standby feedback.
    ///
    /// `None` is a content-free keepalive. `Some(position)` reports the
    /// stream as durably processed up to and including `position`.
    fn send_feedback(&mut self, flush: Option<LogPosition>) -> BoxFuture<'_, ()>;
}

impl<C: ReplicationConnection + ?Sized> ReplicationConnection for Box<C> {
    fn poll_message(&mut self) -> Result<Option<RawMessage>, ConnectionError> {
        (**self).poll_message()
    }

    fn wait_readable(&mut self) -> BoxFuture<'_, ()> {
        (**self).wait_readable()
    }

    fn current_position(&self) -> LogPosition {
        (**self).current_position()
    }

    fn send_feedback(&mut self, flush: Option<LogPosition>) -> BoxFuture<'_, ()> {
        (**self).send_feedback(flush)
    }
}
