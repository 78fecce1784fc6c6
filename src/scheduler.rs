// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! One-shot delayed calls.
//!
//! A min-heap of `(due, seq)` keys with boxed callbacks. The event loop uses
//! it for generic timed work and for its own keepalive tick.
//!
//! # Ordering
//!
//! Calls run in due-time order. Calls with the same due time run in the
//! order they were scheduled (the insertion sequence number breaks ties).
//!
//! # Periodic Work
//!
//! There are no repeating timers. A callback receives the scheduler and
//! re-schedules itself:
//!
//! ```rust
//! use cdc_consumer::scheduler::DelayedCallScheduler;
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! fn tick(scheduler: &mut DelayedCallScheduler<u32>, count: &mut u32) -> cdc_consumer::Result<()> {
//!     *count += 1;
//!     scheduler.schedule(Duration::from_secs(1), tick);
//!     Ok(())
//! }
//!
//! let mut scheduler = DelayedCallScheduler::new();
//! scheduler.schedule(Duration::ZERO, tick);
//! let mut count = 0;
//! scheduler.run_due_calls(Instant::now(), &mut count).unwrap();
//! assert_eq!(count, 1);
//! assert_eq!(scheduler.len(), 1);
//! ```
//!
//! A call scheduled from inside a callback never runs in the same
//! [`run_due_calls`](DelayedCallScheduler::run_due_calls) pass, even when it
//! is already due. This keeps a zero-delay self-rescheduling callback from
//! spinning forever.

use crate::error::Result;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::time::Instant;

/// Roughly 30 years; stands in for "never" when `now + delay` overflows.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + delay`, saturating to a far-future instant instead of panicking.
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Callback stored by the scheduler.
///
/// `C` is the context handed to every callback when it runs.
pub type DelayedAction<C> = Box<dyn FnOnce(&mut DelayedCallScheduler<C>, &mut C) -> Result<()> + Send>;

struct DelayedCall<C> {
    due: Instant,
    seq: u64,
    action: DelayedAction<C>,
}

impl<C> DelayedCall<C> {
    fn key(&self) -> (Instant, u64) {
        (self.due, self.seq)
    }
}

impl<C> PartialEq for DelayedCall<C> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<C> Eq for DelayedCall<C> {}

impl<C> PartialOrd for DelayedCall<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for DelayedCall<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Priority queue of one-shot delayed calls.
pub struct DelayedCallScheduler<C> {
    heap: BinaryHeap<Reverse<DelayedCall<C>>>,
    next_seq: u64,
}

impl<C> Default for DelayedCallScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for DelayedCallScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedCallScheduler")
            .field("pending", &self.heap.len())
            .field("next_due", &self.next_due())
            .finish()
    }
}

impl<C> DelayedCallScheduler<C> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `action` to run `delay` from now.
    ///
    /// A delay too large to represent is treated as "far in the future".
    pub fn schedule<F>(&mut self, delay: Duration, action: F)
    where
        F: FnOnce(&mut DelayedCallScheduler<C>, &mut C) -> Result<()> + Send + 'static,
    {
        self.schedule_at(deadline_after(Instant::now(), delay), action);
    }

    /// Schedule `action` to run at `due`.
    pub fn schedule_at<F>(&mut self, due: Instant, action: F)
    where
        F: FnOnce(&mut DelayedCallScheduler<C>, &mut C) -> Result<()> + Send + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(DelayedCall {
            due,
            seq,
            action: Box::new(action),
        }));
    }

    /// Run every call due at or before `now`, earliest first.
    ///
    /// Stops at the first callback error and returns it. Calls not yet run
    /// stay scheduled.
    pub fn run_due_calls(&mut self, now: Instant, ctx: &mut C) -> Result<()> {
        // Calls scheduled during this pass carry a seq >= this boundary.
        let boundary = self.next_seq;
        let mut deferred = Vec::new();

        let result = loop {
            let due = match self.heap.peek() {
                Some(Reverse(call)) => call.due <= now,
                None => false,
            };
            if !due {
                break Ok(());
            }
            let Some(Reverse(call)) = self.heap.pop() else {
                break Ok(());
            };
            if call.seq >= boundary {
                deferred.push(call);
                continue;
            }
            if let Err(e) = (call.action)(self, ctx) {
                break Err(e);
            }
        };

        self.heap.extend(deferred.into_iter().map(Reverse));
        result
    }

    /// Time until the earliest call is due.
    ///
    /// `None` when nothing is scheduled. `Some(Duration::ZERO)` when a call
    /// is already due.
    pub fn next_due_in(&self, now: Instant) -> Option<Duration> {
        self.next_due().map(|due| due.saturating_duration_since(now))
    }

    /// Due time of the earliest call.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(call)| call.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
