//! Pending batch and flush gate.
//!
//! Completed transactions accumulate in a [`PendingBatch`] until the
//! [`BatchGate`] says to hand them downstream.
//!
//! # Design
//!
//! ```text
//! Transactions ──▶ PendingBatch ──┬──▶ count >= max_transactions_gather_count
//!                  (commit order) │
//!                                 └──▶ now >= deadline (first txn + gather time)
//!                                               │
//!                                               ▼
//!                                   BatchHandler::handle(Vec<Vec<Event>>)
//! ```
//!
//! With neither threshold configured the count threshold defaults to 1, so a
//! batch is flushed on every idle turn and never grows without bound.

use crate::config::ConsumerConfig;
use crate::error::{ConsumerError, Result};
use crate::message::{Event, MessageKind, Transaction};
use crate::position::LogPosition;
use crate::scheduler::deadline_after;
use std::time::Duration;
use tokio::time::Instant;

/// Decides when a pending batch is ready for the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchGate {
    /// Flush once the batch holds this many transactions. `None` disables the count trigger.
    count_threshold: Option<usize>,
    /// Flush no later than this long after the first transaction entered the batch.
    gather_time: Option<Duration>,
}

impl BatchGate {
    /// Build a gate from explicit thresholds.
    ///
    /// A zero count threshold is rejected. When both thresholds are `None`
    /// the count threshold becomes 1.
    pub fn new(count_threshold: Option<usize>, gather_time: Option<Duration>) -> Result<Self> {
        if count_threshold == Some(0) {
            return Err(ConsumerError::Config(
                "max_transactions_gather_count must be at least 1".to_string(),
            ));
        }
        let count_threshold = match (count_threshold, gather_time) {
            (None, None) => Some(1),
            (count, _) => count,
        };
        Ok(Self {
            count_threshold,
            gather_time,
        })
    }

    /// Build a gate from validated configuration.
    pub fn from_config(config: &ConsumerConfig) -> Result<Self> {
        Self::new(
            config.max_transactions_gather_count,
            config.gather_time_duration()?,
        )
    }

    /// Effective count threshold.
    pub fn count_threshold(&self) -> Option<usize> {
        self.count_threshold
    }

    /// Time threshold.
    pub fn gather_time(&self) -> Option<Duration> {
        self.gather_time
    }

    /// Deadline for a batch whose first transaction arrived at `now`.
    pub fn deadline_from(&self, now: Instant) -> Option<Instant> {
        self.gather_time.map(|gather| deadline_after(now, gather))
    }

    /// Check if a batch of `batch_len` transactions with `deadline` should flush at `now`.
    pub fn should_flush(&self, batch_len: usize, deadline: Option<Instant>, now: Instant) -> bool {
        if batch_len == 0 {
            return false;
        }

        // Size threshold
        if let Some(threshold) = self.count_threshold {
            if batch_len >= threshold {
                return true;
            }
        }

        // Time threshold
        if let Some(deadline) = deadline {
            if now >= deadline {
                return true;
            }
        }

        false
    }
}

/// Transactions waiting for the next flush, in commit order.
#[derive(Debug, Default)]
pub struct PendingBatch {
    transactions: Vec<Transaction>,
    /// Time by which the batch must be flushed (time trigger only).
    deadline: Option<Instant>,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed transaction.
    ///
    /// Starts the batch deadline when this is the first transaction. A commit
    /// position lower than the last one already batched is a protocol
    /// violation and the transaction is not added.
    pub fn push(&mut self, transaction: Transaction, gate: &BatchGate, now: Instant) -> Result<()> {
        if let Some(last) = self.last_position() {
            if transaction.commit_position < last {
                return Err(ConsumerError::protocol(
                    format!("batch ends at {}", last),
                    MessageKind::Commit,
                    transaction.commit_position,
                ));
            }
        }

        if self.transactions.is_empty() {
            self.deadline = gate.deadline_from(now);
        }
        self.transactions.push(transaction);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Commit position of the last (highest) transaction.
    pub fn last_position(&self) -> Option<LogPosition> {
        self.transactions.last().map(|t| t.commit_position)
    }

    /// Total number of events across all transactions.
    pub fn event_count(&self) -> usize {
        self.transactions.iter().map(Transaction::len).sum()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Event lists for the handler, one list per transaction, in commit order.
    ///
    /// The batch keeps its transactions; call [`clear`](Self::clear) once the
    /// handler succeeded and the batch end is confirmed.
    pub fn event_lists(&self) -> Vec<Vec<Event>> {
        self.transactions.iter().map(|t| t.events.clone()).collect()
    }

    /// Empty the batch and clear its deadline.
    pub fn clear(&mut self) {
        self.transactions.clear();
        self.deadline = None;
    }
}
