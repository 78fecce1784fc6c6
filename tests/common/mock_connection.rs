//! Scripted ReplicationConnection for testing.
//!
//! Messages become readable at fixed offsets from creation, measured with
//! tokio's clock, so tests run under `start_paused = true` see exact
//! simulated timings. Records every feedback call for assertions.

use cdc_consumer::connection::{BoxFuture, ConnectionError, ReplicationConnection};
use cdc_consumer::{LogPosition, RawMessage};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// A recorded send_feedback() call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackCall {
    /// Offset from connection creation.
    pub at: Duration,
    pub flush: Option<LogPosition>,
}

/// Mock connection that replays a script of timed arrivals.
///
/// # Example
/// ```rust,ignore
/// let conn = MockConnection::new()
///     .arrive_all(Duration::ZERO, transaction(1, &[2, 3], 4))
///     .close_at(Duration::from_secs(30));
/// ```
pub struct MockConnection {
    start: Instant,
    /// (arrival offset, message), in arrival order
    script: VecDeque<(Duration, RawMessage)>,
    closes_at: Option<Duration>,
    read_fails_at: Option<Duration>,
    fail_feedback: bool,
    /// Position of the last message handed out
    position: LogPosition,
    /// Overrides `position` for current_position()
    reported_position: Option<LogPosition>,
    feedback: Vec<FeedbackCall>,
    polls: usize,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            script: VecDeque::new(),
            closes_at: None,
            read_fails_at: None,
            fail_feedback: false,
            position: LogPosition::ZERO,
            reported_position: None,
            feedback: Vec::new(),
            polls: 0,
        }
    }

    /// Make `message` readable `at` after creation.
    pub fn arrive(mut self, at: Duration, message: RawMessage) -> Self {
        if let Some((last, _)) = self.script.back() {
            assert!(at >= *last, "arrivals must be scripted in order");
        }
        self.script.push_back((at, message));
        self
    }

    /// Make every message in `messages` readable at the same instant.
    pub fn arrive_all(mut self, at: Duration, messages: Vec<RawMessage>) -> Self {
        for message in messages {
            self = self.arrive(at, message);
        }
        self
    }

    /// Close the connection `at` after creation.
    pub fn close_at(mut self, at: Duration) -> Self {
        self.closes_at = Some(at);
        self
    }

    /// Fail reads with an I/O error from `at` onwards.
    pub fn fail_reads_at(mut self, at: Duration) -> Self {
        self.read_fails_at = Some(at);
        self
    }

    /// Fail every send_feedback() call.
    pub fn fail_feedback(mut self) -> Self {
        self.fail_feedback = true;
        self
    }

    /// Report this position from current_position() regardless of reads.
    pub fn with_current_position(mut self, position: LogPosition) -> Self {
        self.reported_position = Some(position);
        self
    }

    /// Recorded feedback calls.
    pub fn feedback(&self) -> &[FeedbackCall] {
        &self.feedback
    }

    /// Flush positions of the recorded feedback calls.
    pub fn flushes(&self) -> Vec<Option<LogPosition>> {
        self.feedback.iter().map(|call| call.flush).collect()
    }

    /// Messages scripted but not yet read.
    pub fn unread(&self) -> usize {
        self.script.len()
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    fn elapsed(&self) -> Duration {
        Instant::now() - self.start
    }

    fn reached(&self, at: Option<Duration>) -> bool {
        at.is_some_and(|at| self.elapsed() >= at)
    }

    fn next_wake(&self) -> Option<Duration> {
        let arrival = self.script.front().map(|(at, _)| *at);
        [arrival, self.closes_at, self.read_fails_at]
            .into_iter()
            .flatten()
            .min()
    }
}

impl ReplicationConnection for MockConnection {
    fn poll_message(&mut self) -> Result<Option<RawMessage>, ConnectionError> {
        self.polls += 1;
        if self.reached(self.closes_at) {
            return Err(ConnectionError::Closed);
        }
        if self.reached(self.read_fails_at) {
            return Err(ConnectionError::io("read", "connection reset by peer"));
        }

        let elapsed = self.elapsed();
        match self.script.front() {
            Some((at, _)) if *at <= elapsed => {}
            _ => return Ok(None),
        }
        let message = self.script.pop_front().map(|(_, message)| message);
        if let Some(ref message) = message {
            self.position = message.position;
        }
        Ok(message)
    }

    fn wait_readable(&mut self) -> BoxFuture<'_, ()> {
        let wake = self.next_wake().map(|offset| self.start + offset);
        Box::pin(async move {
            match wake {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
            Ok(())
        })
    }

    fn current_position(&self) -> LogPosition {
        self.reported_position.unwrap_or(self.position)
    }

    fn send_feedback(&mut self, flush: Option<LogPosition>) -> BoxFuture<'_, ()> {
        if self.fail_feedback {
            return Box::pin(async { Err(ConnectionError::io("send_feedback", "broken pipe")) });
        }
        let at = self.elapsed();
        self.feedback.push(FeedbackCall { at, flush });
        Box::pin(async { Ok(()) })
    }
}
