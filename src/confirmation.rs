//! Flush confirmation.
//!
//! Tells the upstream how far the stream has been durably processed so it
//! can trim its log.
//!
//! # Monotonic Confirmation
//!
//! The confirmed position never moves backwards within a run. A candidate
//! below the last confirmed position is clamped to it (and logged), so the
//! feedback still goes out but cannot regress.
//!
//! # Idle Keepalives
//!
//! With no unconfirmed work, a keepalive confirms the connection's current
//! position even though nothing was routed through a batch in the meantime.
//! This lets the upstream trim its log while the consumer is idle. With
//! unconfirmed work (a pending batch or an open transaction) the keepalive
//! carries no position, so it can never advance past undelivered data.
//!
//! ```text
//! handler OK ──▶ confirm_for(batch end) ──▶ send_feedback(Some(max(end, last)))
//! keepalive  ──▶ pending work?  yes ─────▶ send_feedback(None)
//!                               no  ─────▶ send_feedback(Some(max(current, last)))
//! ```

use crate::connection::ReplicationConnection;
use crate::error::Result;
use crate::metrics;
use crate::position::LogPosition;
use tracing::{debug, warn};

/// Outcome of a keepalive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keepalive {
    /// Feedback confirmed this position.
    Confirmed(LogPosition),
    /// Content-free keepalive; work was pending.
    Empty,
}

/// Tracks and issues flush confirmations.
#[derive(Debug)]
pub struct ConfirmationTracker {
    slot_name: String,
    last_confirmed: Option<LogPosition>,
}

impl ConfirmationTracker {
    pub fn new(slot_name: impl Into<String>) -> Self {
        Self {
            slot_name: slot_name.into(),
            last_confirmed: None,
        }
    }

    /// Highest position confirmed so far in this run.
    pub fn last_confirmed(&self) -> Option<LogPosition> {
        self.last_confirmed
    }

    /// Confirm a batch the handler has processed successfully.
    ///
    /// `batch_end` is the commit position of the last transaction in the
    /// batch. Only call this after the handler returned `Ok`.
    pub async fn confirm_for<C>(&mut self, conn: &mut C, batch_end: LogPosition) -> Result<LogPosition>
    where
        C: ReplicationConnection + ?Sized,
    {
        let position = self.clamp(batch_end);
        conn.send_feedback(Some(position)).await?;
        self.record(position);
        debug!(slot = %self.slot_name, position = %position, "Confirmed batch");
        Ok(position)
    }

    /// Send a keepalive.
    ///
    /// Confirms `current_position` when nothing is pending, otherwise sends
    /// an empty keepalive.
    pub async fn confirm_keepalive<C>(
        &mut self,
        conn: &mut C,
        current_position: LogPosition,
        has_pending_work: bool,
    ) -> Result<Keepalive>
    where
        C: ReplicationConnection + ?Sized,
    {
        if has_pending_work {
            conn.send_feedback(None).await?;
            metrics::record_keepalive(&self.slot_name, "empty");
            debug!(slot = %self.slot_name, "Sent empty keepalive (work pending)");
            return Ok(Keepalive::Empty);
        }

        let position = self.clamp(current_position);
        conn.send_feedback(Some(position)).await?;
        self.record(position);
        metrics::record_keepalive(&self.slot_name, "position");
        debug!(slot = %self.slot_name, position = %position, "Sent idle keepalive");
        Ok(Keepalive::Confirmed(position))
    }

    fn clamp(&self, candidate: LogPosition) -> LogPosition {
        match self.last_confirmed {
            Some(last) if candidate < last => {
                warn!(
                    slot = %self.slot_name,
                    candidate = %candidate,
                    last_confirmed = %last,
                    "Refusing to confirm below last confirmed position, clamping"
                );
                metrics::record_confirmation_clamped(&self.slot_name);
                last
            }
            _ => candidate,
        }
    }

    fn record(&mut self, position: LogPosition) {
        self.last_confirmed = Some(position);
        metrics::record_confirmed_position(&self.slot_name, position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{BoxFuture, ConnectionError};
    use crate::message::RawMessage;

    /// Connection that only records feedback.
    #[derive(Default)]
    struct FeedbackRecorder {
        feedback: Vec<Option<LogPosition>>,
        fail: bool,
    }

    impl ReplicationConnection for FeedbackRecorder {
        fn poll_message(&mut self) -> std::result::Result<Option<RawMessage>, ConnectionError> {
            Ok(None)
        }

        fn wait_readable(&mut self) -> BoxFuture<'_, ()> {
            Box::pin(std::future::pending())
        }

        fn current_position(&self) -> LogPosition {
            LogPosition::ZERO
        }

        fn send_feedback(&mut self, flush: Option<LogPosition>) -> BoxFuture<'_, ()> {
            if self.fail {
                return Box::pin(async { Err(ConnectionError::io("send_feedback", "broken pipe")) });
            }
            self.feedback.push(flush);
            Box::pin(async { Ok(()) })
        }
    }

    fn pos(value: u64) -> LogPosition {
        LogPosition::new(value)
    }

    #[tokio::test]
    async fn test_confirm_for_sends_batch_end() {
        let mut conn = FeedbackRecorder::default();
        let mut tracker = ConfirmationTracker::new("test_slot");

        let confirmed = tracker.confirm_for(&mut conn, pos(7)).await.unwrap();
        assert_eq!(confirmed, pos(7));
        assert_eq!(conn.feedback, vec![Some(pos(7))]);
        assert_eq!(tracker.last_confirmed(), Some(pos(7)));
    }

    #[tokio::test]
    async fn test_confirm_for_non_decreasing() {
        let mut conn = FeedbackRecorder::default();
        let mut tracker = ConfirmationTracker::new("test_slot");

        for end in [3, 3, 9, 12] {
            tracker.confirm_for(&mut conn, pos(end)).await.unwrap();
        }
        assert_eq!(
            conn.feedback,
            vec![Some(pos(3)), Some(pos(3)), Some(pos(9)), Some(pos(12))]
        );
    }

    #[tokio::test]
    async fn test_confirm_for_clamps_regression() {
        let mut conn = FeedbackRecorder::default();
        let mut tracker = ConfirmationTracker::new("test_slot");

        tracker.confirm_for(&mut conn, pos(10)).await.unwrap();
        let confirmed = tracker.confirm_for(&mut conn, pos(4)).await.unwrap();

        assert_eq!(confirmed, pos(10));
        assert_eq!(conn.feedback, vec![Some(pos(10)), Some(pos(10))]);
        assert_eq!(tracker.last_confirmed(), Some(pos(10)));
    }

    #[tokio::test]
    async fn test_idle_keepalive_confirms_current_position() {
        // Deliberate policy: an idle consumer confirms the stream position
        // even though nothing was delivered, so upstream retention can shrink.
        let mut conn = FeedbackRecorder::default();
        let mut tracker = ConfirmationTracker::new("test_slot");

        let outcome = tracker.confirm_keepalive(&mut conn, pos(0x100), false).await.unwrap();
        assert_eq!(outcome, Keepalive::Confirmed(pos(0x100)));
        assert_eq!(conn.feedback, vec![Some(pos(0x100))]);
        assert_eq!(tracker.last_confirmed(), Some(pos(0x100)));
    }

    #[tokio::test]
    async fn test_keepalive_with_pending_work_is_empty() {
        let mut conn = FeedbackRecorder::default();
        let mut tracker = ConfirmationTracker::new("test_slot");

        let outcome = tracker.confirm_keepalive(&mut conn, pos(0x100), true).await.unwrap();
        assert_eq!(outcome, Keepalive::Empty);
        assert_eq!(conn.feedback, vec![None]);
        assert_eq!(tracker.last_confirmed(), None);
    }

    #[tokio::test]
    async fn test_keepalive_never_regresses() {
        let mut conn = FeedbackRecorder::default();
        let mut tracker = ConfirmationTracker::new("test_slot");

        tracker.confirm_for(&mut conn, pos(50)).await.unwrap();
        let outcome = tracker.confirm_keepalive(&mut conn, pos(20), false).await.unwrap();
        assert_eq!(outcome, Keepalive::Confirmed(pos(50)));
        assert_eq!(conn.feedback, vec![Some(pos(50)), Some(pos(50))]);
    }

    #[tokio::test]
    async fn test_failed_feedback_does_not_record() {
        let mut conn = FeedbackRecorder {
            fail: true,
            ..Default::default()
        };
        let mut tracker = ConfirmationTracker::new("test_slot");

        let err = tracker.confirm_for(&mut conn, pos(5)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(tracker.last_confirmed(), None);
    }
}
