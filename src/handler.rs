// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Downstream batch handler interface.
//!
//! The handler receives each flushed batch as one list of event lists: one
//! inner list per transaction, in commit order. It runs to completion before
//! the loop confirms the batch or reads anything else, which is the
//! consumer's backpressure.
//!
//! An error from the handler ends the run. The batch is not confirmed, so it
//! is delivered again after a restart (at-least-once).
//!
//! # Example
//!
//! Any `FnMut(Vec<Vec<Event>>) -> Result<(), HandlerError>` closure is a handler:
//!
//! ```rust
//! use cdc_consumer::handler::{BatchHandler, HandlerError};
//! use cdc_consumer::Event;
//!
//! let mut seen = 0usize;
//! let mut handler = move |batch: Vec<Vec<Event>>| -> Result<(), HandlerError> {
//!     seen += batch.len();
//!     Ok(())
//! };
//! # let _ = handler.handle(Vec::new());
//! ```

use crate::message::Event;
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`BatchHandler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

/// Error returned by a batch handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for HandlerError {}

/// Processes flushed batches.
pub trait BatchHandler: Send {
    /// Handle one batch: `batch[i]` holds the events of the i-th transaction.
    fn handle(&mut self, batch: Vec<Vec<Event>>) -> HandlerFuture<'_>;
}

impl<F> BatchHandler for F
where
    F: FnMut(Vec<Vec<Event>>) -> Result<(), HandlerError> + Send,
{
    fn handle(&mut self, batch: Vec<Vec<Event>>) -> HandlerFuture<'_> {
        let result = self(batch);
        Box::pin(std::future::ready(result))
    }
}
