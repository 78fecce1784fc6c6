// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Consumer event loop.
//!
//! The orchestrator that ties together:
//! - The replication connection via [`ReplicationConnection`]
//! - Transaction assembly via [`TransactionAssembler`]
//! - Batching via [`BatchGate`] and [`PendingBatch`]
//! - Delivery via [`BatchHandler`]
//! - Flush feedback via [`ConfirmationTracker`]
//! - Timed work via [`DelayedCallScheduler`]
//!
//! # Turn Structure
//!
//! Each [`turn()`](EventLoop::turn) runs these steps in order:
//!
//! 1. Drain every message the connection has buffered into the assembler.
//!    Completed transactions join the pending batch.
//! 2. With nothing left to read, ask the gate whether to flush. A flush
//!    calls the handler and then confirms the batch's last commit position.
//! 3. Run due delayed calls (including the keepalive tick).
//! 4. If the keepalive tick fired, send a keepalive.
//! 5. Wait for the connection to become readable, for at most the time to
//!    the nearer of the batch deadline and the next delayed call.
//!
//! Nothing runs concurrently: the handler is awaited before anything else is
//! read, which bounds buffered state to the connection's own read buffer.
//!
//! # Shutdown
//!
//! There is no cancellation token. Closing the connection wakes the wait
//! in step 5, and the next poll fails with
//! [`ConnectionError::Closed`](crate::connection::ConnectionError::Closed),
//! which [`run()`](EventLoop::run) returns as an error.

mod types;

pub use types::{ConsumerStats, LoopContext};

use crate::assembler::{Assembled, TransactionAssembler};
use crate::batch::{BatchGate, PendingBatch};
use crate::config::ConsumerConfig;
use crate::confirmation::ConfirmationTracker;
use crate::connection::ReplicationConnection;
use crate::error::Result;
use crate::handler::BatchHandler;
use crate::message::RawMessage;
use crate::metrics;
use crate::position::LogPosition;
use crate::scheduler::DelayedCallScheduler;
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Single-task CDC consumer.
///
/// Owns the connection, the handler and all consumer state for the lifetime
/// of a run. Drive it with [`run()`](Self::run), or step it with
/// [`turn()`](Self::turn) in tests.
pub struct EventLoop<C: ReplicationConnection, H: BatchHandler> {
    config: ConsumerConfig,
    connection: C,
    handler: H,
    assembler: TransactionAssembler,
    gate: BatchGate,
    batch: PendingBatch,
    tracker: ConfirmationTracker,
    scheduler: DelayedCallScheduler<LoopContext>,
    context: LoopContext,
    keepalive_started: bool,
    stats: ConsumerStats,
}

impl<C: ReplicationConnection, H: BatchHandler> EventLoop<C, H> {
    /// Create an event loop.
    ///
    /// Validates `config`; nothing is read from the connection until the
    /// first turn.
    pub fn new(config: ConsumerConfig, connection: C, handler: H) -> Result<Self> {
        config.validate()?;
        let gate = BatchGate::from_config(&config)?;
        let keepalive_interval = config.keepalive_interval_duration()?;

        debug!(
            slot = %config.slot_name,
            count_threshold = ?gate.count_threshold(),
            gather_time = ?gate.gather_time(),
            keepalive_interval = ?keepalive_interval,
            "Event loop created"
        );

        Ok(Self {
            tracker: ConfirmationTracker::new(config.slot_name.clone()),
            config,
            connection,
            handler,
            assembler: TransactionAssembler::new(),
            gate,
            batch: PendingBatch::new(),
            scheduler: DelayedCallScheduler::new(),
            context: LoopContext::new(keepalive_interval),
            keepalive_started: false,
            stats: ConsumerStats::default(),
        })
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Scheduler for caller-supplied timed work.
    ///
    /// Calls run in step 3 of a turn with the loop's [`LoopContext`].
    pub fn scheduler_mut(&mut self) -> &mut DelayedCallScheduler<LoopContext> {
        &mut self.scheduler
    }

    /// Highest position confirmed so far.
    pub fn last_confirmed(&self) -> Option<LogPosition> {
        self.tracker.last_confirmed()
    }

    /// Check if there is work that has not been confirmed yet.
    ///
    /// True while the batch holds transactions or a transaction is open.
    pub fn has_pending_work(&self) -> bool {
        !self.batch.is_empty() || self.assembler.in_transaction()
    }

    /// Snapshot of the run's counters.
    pub fn stats(&self) -> ConsumerStats {
        ConsumerStats {
            last_confirmed: self.tracker.last_confirmed(),
            pending_transactions: self.batch.len(),
            ..self.stats.clone()
        }
    }

    /// Run until an error ends the run.
    ///
    /// Never returns `Ok`. A closed connection surfaces as an error for which
    /// [`ConsumerError::is_shutdown()`](crate::ConsumerError::is_shutdown)
    /// is true. Any partially assembled transaction is dropped.
    pub async fn run(&mut self) -> Result<Infallible> {
        let slot = self.config.slot_name.clone();
        let span = info_span!("cdc_consumer", slot = %slot);
        self.run_loop(slot).instrument(span).await
    }

    async fn run_loop(&mut self, slot: String) -> Result<Infallible> {
        info!(
            keepalive_interval = ?self.context.keepalive_interval(),
            "Starting CDC consumer"
        );

        loop {
            if let Err(e) = self.turn().await {
                metrics::record_error(&slot, e.kind());
                if e.is_shutdown() {
                    info!(stats = ?self.stats(), "Replication connection closed, consumer stopped");
                } else {
                    error!(error = %e, retryable = e.is_retryable(), "CDC consumer failed");
                }
                return Err(e);
            }
        }
    }

    /// Run one loop iteration (steps 1 through 5).
    ///
    /// On error any open transaction is dropped. A batch whose handler or
    /// confirmation failed stays pending, so a later turn re-delivers it and
    /// keepalives carry no position until it is confirmed.
    pub async fn turn(&mut self) -> Result<()> {
        let result = self.run_turn().await;
        if result.is_err() {
            self.assembler.abandon();
        }
        result
    }

    async fn run_turn(&mut self) -> Result<()> {
        if !self.keepalive_started {
            self.scheduler
                .schedule(self.context.keepalive_interval, keepalive_tick);
            self.keepalive_started = true;
        }

        // Step 1: drain greedily
        let drained = self.drain()?;
        if drained > 0 {
            debug!(drained, pending = self.batch.len(), "Drained messages");
        }

        // Step 2: flush if the gate allows
        if self
            .gate
            .should_flush(self.batch.len(), self.batch.deadline(), Instant::now())
        {
            self.flush().await?;
        }

        // Step 3: delayed calls
        self.scheduler
            .run_due_calls(Instant::now(), &mut self.context)?;

        // Step 4: keepalive
        if self.context.take_keepalive_request() {
            self.send_keepalive().await?;
        }

        // Step 5: bounded wait
        self.wait().await
    }

    fn drain(&mut self) -> Result<usize> {
        let mut drained = 0;
        loop {
            let message = match self.connection.poll_message() {
                Ok(Some(message)) => message,
                Ok(None) => return Ok(drained),
                Err(e) => {
                    if self.assembler.in_transaction() {
                        warn!(
                            open_events = self.assembler.open_event_count(),
                            "Abandoning open transaction after connection error"
                        );
                    }
                    self.assembler.abandon();
                    return Err(e.into());
                }
            };
            drained += 1;
            self.ingest(message)?;
        }
    }

    fn ingest(&mut self, message: RawMessage) -> Result<()> {
        let slot = self.config.slot_name.as_str();
        let kind = message.kind;
        self.stats.messages_read += 1;
        metrics::record_message_read(slot, kind.as_str());

        match self.assembler.feed(message) {
            Ok(Assembled::Pending) => Ok(()),
            Ok(Assembled::EmptyDiscarded(position)) => {
                self.stats.empty_transactions_discarded += 1;
                metrics::record_empty_transaction(slot);
                debug!(commit = %position, "Discarded empty transaction");
                Ok(())
            }
            Ok(Assembled::Transaction(transaction)) => {
                let events = transaction.len();
                self.batch.push(transaction, &self.gate, Instant::now())?;
                self.stats.transactions_assembled += 1;
                metrics::record_transaction_assembled(slot, events);
                metrics::set_pending_transactions(slot, self.batch.len());
                Ok(())
            }
            Err(e) => {
                metrics::record_protocol_violation(slot, kind.as_str());
                Err(e)
            }
        }
    }

    async fn flush(&mut self) -> Result<()> {
        let Some(batch_end) = self.batch.last_position() else {
            return Ok(());
        };
        let transactions = self.batch.len();
        let events = self.batch.event_count();
        let event_lists = self.batch.event_lists();

        let start = Instant::now();
        self.handler.handle(event_lists).await?;
        let elapsed = start.elapsed();

        let slot = self.config.slot_name.as_str();
        metrics::record_batch_flush(slot, transactions, events, elapsed);
        if self.config.slo.is_batch_handle_violation(elapsed) {
            warn!(
                transactions,
                events,
                latency_ms = elapsed.as_millis() as u64,
                threshold_ms = self.config.slo.max_batch_handle_latency_ms,
                "Batch handler SLO violation"
            );
            metrics::record_slo_violation(slot, "batch_handle", elapsed.as_millis() as u64);
        }

        let confirmed = self
            .tracker
            .confirm_for(&mut self.connection, batch_end)
            .await?;
        self.batch.clear();
        metrics::set_pending_transactions(self.config.slot_name.as_str(), 0);
        self.stats.batches_flushed += 1;

        debug!(
            transactions,
            events,
            confirmed = %confirmed,
            "Flushed batch"
        );
        Ok(())
    }

    async fn send_keepalive(&mut self) -> Result<()> {
        let current = self.connection.current_position();
        let pending = self.has_pending_work();
        self.tracker
            .confirm_keepalive(&mut self.connection, current, pending)
            .await?;
        self.stats.keepalives_sent += 1;
        Ok(())
    }

    async fn wait(&mut self) -> Result<()> {
        let timeout = self.wait_timeout(Instant::now());
        match timeout {
            Some(timeout) => {
                // An elapsed timeout is a normal wake-up.
                if let Ok(result) = tokio::time::timeout(timeout, self.connection.wait_readable()).await {
                    result?;
                }
            }
            None => self.connection.wait_readable().await?,
        }
        Ok(())
    }

    /// Nearer of the batch deadline and the next delayed call, or `None` for no bound.
    fn wait_timeout(&self, now: Instant) -> Option<Duration> {
        let batch = self
            .batch
            .deadline()
            .map(|deadline| deadline.saturating_duration_since(now));
        let call = self.scheduler.next_due_in(now);
        match (batch, call) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

fn keepalive_tick(scheduler: &mut DelayedCallScheduler<LoopContext>, ctx: &mut LoopContext) -> Result<()> {
    ctx.keepalive_due = true;
    scheduler.schedule(ctx.keepalive_interval, keepalive_tick);
    Ok(())
}
