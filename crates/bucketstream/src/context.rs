use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::bucket::Bucket;

/// Auto-resetting binary wakeup event.
///
/// `set` on an already-set signal is a no-op, and a successful `wait` consumes the pending
/// set. Both go through the same lock, so anything stored before `set` is visible to the
/// thread that returns from `wait`.
#[derive(Debug)]
pub struct WakeSignal {
    set: Mutex<bool>,
    cond: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self {
            set: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Marks the signal as set. Redundant sets collapse into one wakeup.
    pub fn set(&self) {
        let mut set = self.set.lock();
        *set = true;
        self.cond.notify_one();
    }

    /// Blocks until the signal is set, then resets it.
    pub fn wait(&self) {
        let mut set = self.set.lock();
        while !*set {
            self.cond.wait(&mut set);
        }
        *set = false;
    }

    /// Consumes a pending set without blocking. Returns whether one was pending.
    #[cfg(test)]
    pub(crate) fn try_reset(&self) -> bool {
        std::mem::replace(&mut *self.set.lock(), false)
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Synchronisation hub shared by the renderer worker and the consuming thread.
///
/// ```text
///   producer ──push──▶ [pending: Mutex<VecDeque<Bucket>>] ──take_pending──▶ consumer
///       │                                                       ▲
///       └────────────── wake.set() ─────────────────────────────┘
///   consumer ──request_abort──▶ should_abort ──▶ producer (Flow::Stop)
///   producer ──close──▶ all_buckets_sent + final wake
/// ```
///
/// Only the pending queue is locked. Both flags are one-way `false -> true` transitions
/// and are read without the lock.
#[derive(Debug, Default)]
pub struct SharedRenderContext {
    pending: Mutex<VecDeque<Bucket>>,
    wake: WakeSignal,
    all_buckets_sent: AtomicBool,
    should_abort: AtomicBool,
    submitted: AtomicU64,
}

impl SharedRenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a bucket to the pending queue and wakes the consumer.
    ///
    /// Returns `false` and drops the bucket if the stream was already closed; the pending
    /// queue is never refilled after `close`.
    pub fn push(&self, bucket: Bucket) -> bool {
        {
            let mut pending = self.pending.lock();
            if self.all_buckets_sent() {
                tracing::warn!(
                    x = bucket.x(),
                    y = bucket.y(),
                    "bucket pushed after the stream was closed; dropping it"
                );
                return false;
            }
            let sequence = self.submitted.fetch_add(1, Ordering::Relaxed);
            pending.push_back(bucket.with_sequence(sequence));
        }
        self.wake.set();
        true
    }

    /// Moves every pending bucket onto the back of `local`, preserving order.
    ///
    /// Returns the number of buckets moved. The lock is held only for the move.
    pub fn take_pending(&self, local: &mut VecDeque<Bucket>) -> usize {
        let mut pending = self.pending.lock();
        let moved = pending.len();
        local.extend(pending.drain(..));
        moved
    }

    /// Declares end of stream and issues the final wakeup. Idempotent.
    pub fn close(&self) {
        if self.all_buckets_sent.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(
            submitted = self.submitted(),
            "producer closed the bucket stream"
        );
        self.wake.set();
    }

    pub fn request_abort(&self) {
        self.should_abort.store(true, Ordering::Release);
    }

    pub fn should_abort(&self) -> bool {
        self.should_abort.load(Ordering::Acquire)
    }

    pub fn all_buckets_sent(&self) -> bool {
        self.all_buckets_sent.load(Ordering::Acquire)
    }

    /// Total buckets accepted onto the pending queue so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub(crate) fn wake(&self) -> &WakeSignal {
        &self.wake
    }
}
