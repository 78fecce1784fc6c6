//! Event loop state types.
//!
//! # Loop Context
//!
//! Delayed calls run with a [`LoopContext`]. They cannot touch the
//! connection or the batch directly; they raise flags that the loop acts on
//! later in the same turn:
//!
//! ```text
//! run_due_calls(now, &mut ctx) ──▶ ctx.keepalive_due = true
//!                                         │
//!                                         ▼
//!                             step 4: confirm_keepalive(...)
//! ```

use crate::position::LogPosition;
use serde::Serialize;
use std::time::Duration;

/// Context handed to delayed calls scheduled on the loop's scheduler.
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub(crate) keepalive_interval: Duration,
    pub(crate) keepalive_due: bool,
}

impl LoopContext {
    pub(crate) fn new(keepalive_interval: Duration) -> Self {
        Self {
            keepalive_interval,
            keepalive_due: false,
        }
    }

    /// Ask the loop to send a keepalive at the end of this turn's timer step.
    pub fn request_keepalive(&mut self) {
        self.keepalive_due = true;
    }

    /// Consume the keepalive request raised during this turn's timer step.
    pub(crate) fn take_keepalive_request(&mut self) -> bool {
        std::mem::take(&mut self.keepalive_due)
    }

    /// Configured keepalive cadence.
    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }
}

/// Counters for one consumer run.
///
/// Cheap to collect: [`EventLoop::stats()`](super::EventLoop::stats) copies
/// cached values and performs no I/O.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    /// Messages polled from the connection.
    pub messages_read: u64,
    /// Non-empty transactions added to a batch.
    pub transactions_assembled: u64,
    /// Committed transactions with no events, dropped.
    pub empty_transactions_discarded: u64,
    /// Batches handed to the handler and confirmed.
    pub batches_flushed: u64,
    /// Keepalive feedback messages sent (with or without a position).
    pub keepalives_sent: u64,
    /// Highest position confirmed so far.
    pub last_confirmed: Option<LogPosition>,
    /// Transactions waiting in the pending batch.
    pub pending_transactions: usize,
}
