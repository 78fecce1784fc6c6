//! Recording BatchHandler for testing.
//!
//! Records every batch with the time it was delivered. Can be told to fail
//! on a given call or to take a while, to exercise the error and SLO paths.

use cdc_consumer::handler::{BatchHandler, HandlerError, HandlerFuture};
use cdc_consumer::Event;
use std::time::Duration;
use tokio::time::Instant;

/// A recorded handle() call.
#[derive(Debug, Clone, PartialEq)]
pub struct HandledBatch {
    /// Offset from handler creation.
    pub at: Duration,
    pub batch: Vec<Vec<Event>>,
}

pub struct RecordingHandler {
    start: Instant,
    batches: Vec<HandledBatch>,
    /// Fail the n-th call (0-based)
    fail_on_call: Option<usize>,
    /// Simulated processing time per call
    latency: Duration,
    calls: usize,
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            batches: Vec::new(),
            fail_on_call: None,
            latency: Duration::ZERO,
            calls: 0,
        }
    }

    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Successfully handled batches.
    pub fn batches(&self) -> &[HandledBatch] {
        &self.batches
    }

    /// Handled batches without timings.
    pub fn event_lists(&self) -> Vec<Vec<Vec<Event>>> {
        self.batches.iter().map(|b| b.batch.clone()).collect()
    }

    /// Total calls, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl BatchHandler for RecordingHandler {
    fn handle(&mut self, batch: Vec<Vec<Event>>) -> HandlerFuture<'_> {
        Box::pin(async move {
            let call = self.calls;
            self.calls += 1;
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.fail_on_call == Some(call) {
                return Err(HandlerError::new(format!("downstream rejected batch {}", call)));
            }
            let at = Instant::now() - self.start;
            self.batches.push(HandledBatch { at, batch });
            Ok(())
        })
    }
}
