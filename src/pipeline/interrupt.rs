//! Shared barge-in primitives.
//!
//! [`InterruptCounter`] counts barge-ins the response side has not yet
//! acknowledged. The capture worker is the only incrementer and the queue
//! reconciliation is the only decrementer. [`PlaybackActive`] is written by
//! the response worker and read by the capture worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Non-negative count of outstanding interruptions.
#[derive(Debug, Clone, Default)]
pub struct InterruptCounter {
    count: Arc<AtomicUsize>,
}

impl InterruptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// True while any interruption is outstanding.
    pub fn is_interrupted(&self) -> bool {
        self.get() > 0
    }

    /// Record one barge-in. Returns the new count.
    pub fn increment(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Acknowledge one interruption. Saturates at zero; returns the new count.
    pub fn decrement(&self) -> usize {
        match self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            Err(_) => 0,
        }
    }

    /// Drop every outstanding interruption. Returns how many were cleared.
    pub fn clear(&self) -> usize {
        self.count.swap(0, Ordering::SeqCst)
    }
}

/// Set while the assistant's own voice is playing.
#[derive(Debug, Clone, Default)]
pub struct PlaybackActive {
    flag: Arc<AtomicBool>,
}

impl PlaybackActive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag until the returned guard is dropped.
    pub fn activate(&self) -> PlaybackGuard {
        self.flag.store(true, Ordering::SeqCst);
        PlaybackGuard {
            flag: Arc::clone(&self.flag),
        }
    }
}

/// Clears [`PlaybackActive`] on drop, including on early returns.
#[derive(Debug)]
pub struct PlaybackGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
