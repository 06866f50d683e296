//! FIFO command queue between the capture and response workers.
//!
//! Besides plain FIFO transfer the queue owns the two operations that must
//! not interleave with each other: registering a barge-in (capture side) and
//! reconciling a round's FINISH marker (response side). Both run under the
//! queue lock, so a barge-in is either counted against the round being
//! reconciled or against one that is still queued, never lost in between.

use super::interrupt::InterruptCounter;
use super::messages::WorkItem;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How often a blocking [`CommandQueue::pop`] re-checks its cancellation token.
const POP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of reconciling a START with its FINISH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The matching FINISH was drained.
    Reconciled {
        /// Whether the counter was decremented for this round.
        interrupted: bool,
    },
    /// The next item was not this round's FINISH. It has been put back at the
    /// front of the queue.
    Mismatched(WorkItem),
    /// Nothing arrived within the bounded wait.
    TimedOut,
}

/// Shared producer/consumer queue of [`WorkItem`]s.
#[derive(Debug, Default)]
pub struct CommandQueue {
    items: Mutex<VecDeque<WorkItem>>,
    ready: Condvar,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<WorkItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no response is in flight or pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Enqueue a START and its FINISH so they are adjacent.
    pub fn push_pair(&self, start: WorkItem, finish: WorkItem) {
        let mut items = self.lock();
        items.push_back(start);
        items.push_back(finish);
        drop(items);
        self.ready.notify_all();
    }

    pub fn push_back(&self, item: WorkItem) {
        self.lock().push_back(item);
        self.ready.notify_all();
    }

    /// Return an item to the head of the queue.
    pub fn requeue_front(&self, item: WorkItem) {
        self.lock().push_front(item);
        self.ready.notify_all();
    }

    /// Block until an item is available or `cancel` fires.
    pub fn pop(&self, cancel: &CancellationToken) -> Option<WorkItem> {
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                drop(items);
                self.ready.notify_all();
                return Some(item);
            }
            if cancel.is_cancelled() {
                return None;
            }
            items = self
                .ready
                .wait_timeout(items, POP_POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wait at most `timeout` for an item.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<WorkItem> {
        let items = self.lock();
        let (mut items, _) = self
            .ready
            .wait_timeout_while(items, timeout, |items| items.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        let item = items.pop_front();
        drop(items);
        if item.is_some() {
            self.ready.notify_all();
        }
        item
    }

    /// Count a barge-in if a response is in flight.
    ///
    /// Returns the new counter value, or `None` when the queue was empty and
    /// nothing was counted.
    pub fn register_barge_in(&self, counter: &InterruptCounter) -> Option<usize> {
        let items = self.lock();
        if items.is_empty() {
            return None;
        }
        Some(counter.increment())
    }

    /// Drain the FINISH for `start` and acknowledge its interruption.
    ///
    /// `round_interrupted` is whether any stage of the round aborted on the
    /// counter. The counter is also sampled under the lock so a barge-in that
    /// arrived after the last checkpoint still counts against this round.
    pub fn reconcile(
        &self,
        start: &WorkItem,
        round_interrupted: bool,
        counter: &InterruptCounter,
        timeout: Duration,
    ) -> Reconciliation {
        let items = self.lock();
        let (mut items, _) = self
            .ready
            .wait_timeout_while(items, timeout, |items| items.is_empty())
            .unwrap_or_else(PoisonError::into_inner);

        let Some(next) = items.pop_front() else {
            return Reconciliation::TimedOut;
        };
        if !next.finishes(start) {
            items.push_front(next.clone());
            return Reconciliation::Mismatched(next);
        }

        let interrupted = Self::acknowledge(&items, round_interrupted, counter);
        drop(items);
        self.ready.notify_all();
        Reconciliation::Reconciled { interrupted }
    }

    /// Acknowledge a FINISH that was already popped (late or orphaned).
    ///
    /// Returns whether the counter was decremented.
    pub fn settle(&self, round_interrupted: bool, counter: &InterruptCounter) -> bool {
        let items = self.lock();
        Self::acknowledge(&items, round_interrupted, counter)
    }

    fn acknowledge(
        items: &VecDeque<WorkItem>,
        round_interrupted: bool,
        counter: &InterruptCounter,
    ) -> bool {
        let interrupted = round_interrupted || counter.is_interrupted();
        if interrupted {
            counter.decrement();
        }
        if items.is_empty() && counter.is_interrupted() {
            let surplus = counter.clear();
            warn!(surplus, "interrupt count left with nothing in flight, clearing");
        }
        interrupted
    }
}
