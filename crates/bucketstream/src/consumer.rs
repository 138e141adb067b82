//! Consuming side of the stream.
//!
//! The consumer runs on the controlling thread as a small state machine:
//!
//! ```text
//!   WAITING ──wake, stream open──▶ DRAINING ──▶ WAITING
//!      │
//!      └──wake, stream closed──▶ FINAL_DRAIN ──▶ DONE
//! ```
//!
//! Each DRAINING pass moves the whole pending queue into a private local queue under the
//! lock, then presents and retires those buckets with the lock released. Retired buckets
//! are held until [`BucketConsumer::release`], which the session calls after the worker
//! has been joined.

use std::collections::VecDeque;

use crate::bucket::Bucket;
use crate::context::SharedRenderContext;
use crate::progress::{Progress, ProgressMonitor};
use crate::sink::DisplaySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Waiting,
    Draining,
    FinalDrain,
    Done,
}

/// Counters describing what the consumer has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub displayed: usize,
    pub retired: usize,
    pub drain_passes: usize,
    pub empty_wakeups: usize,
    pub progress_reports: usize,
}

pub struct BucketConsumer<'ctx> {
    context: &'ctx SharedRenderContext,
    state: ConsumerState,
    local: VecDeque<Bucket>,
    retired: VecDeque<Bucket>,
    estimated_total: usize,
    abort_requested: bool,
    stats: ConsumerStats,
}

impl<'ctx> BucketConsumer<'ctx> {
    pub fn new(context: &'ctx SharedRenderContext, estimated_total: usize) -> Self {
        Self {
            context,
            state: ConsumerState::Waiting,
            local: VecDeque::new(),
            retired: VecDeque::new(),
            estimated_total,
            abort_requested: false,
            stats: ConsumerStats::default(),
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    /// Whether the progress monitor asked for an abort during this render.
    pub fn abort_requested(&self) -> bool {
        self.abort_requested
    }

    /// Buckets presented and awaiting release, oldest first.
    pub fn retired(&self) -> impl Iterator<Item = &Bucket> + '_ {
        self.retired.iter()
    }

    /// Drives the state machine until the stream has been closed and fully drained.
    pub fn run(&mut self, sink: &mut dyn DisplaySink, progress: &mut dyn ProgressMonitor) {
        while self.step(sink, progress) != ConsumerState::Done {}
    }

    /// Performs one transition and returns the new state.
    ///
    /// Only WAITING blocks; it returns once the wake signal fires.
    pub fn step(
        &mut self,
        sink: &mut dyn DisplaySink,
        progress: &mut dyn ProgressMonitor,
    ) -> ConsumerState {
        let next = match self.state {
            ConsumerState::Waiting => self.wait_for_wake(),
            ConsumerState::Draining => self.drain(sink, progress),
            ConsumerState::FinalDrain => self.final_drain(sink, progress),
            ConsumerState::Done => ConsumerState::Done,
        };
        if next != self.state {
            tracing::trace!(from = ?self.state, to = ?next, "consumer transition");
        }
        self.state = next;
        next
    }

    /// Frees every retired bucket and returns how many were released.
    pub fn release(mut self) -> usize {
        let mut freed = 0;
        while let Some(bucket) = self.retired.pop_front() {
            drop(bucket);
            freed += 1;
        }
        tracing::debug!(freed, "released retired buckets");
        freed
    }

    fn wait_for_wake(&mut self) -> ConsumerState {
        // The flag can flip between the last drain and this wait; the final wakeup is
        // still pending in that case, so blocking here cannot hang.
        if !self.context.all_buckets_sent() {
            self.context.wake().wait();
        }
        if self.context.all_buckets_sent() {
            ConsumerState::FinalDrain
        } else {
            ConsumerState::Draining
        }
    }

    fn drain(
        &mut self,
        sink: &mut dyn DisplaySink,
        progress: &mut dyn ProgressMonitor,
    ) -> ConsumerState {
        let moved = self.context.take_pending(&mut self.local);
        if moved == 0 {
            // A previous pass already took the buckets this wakeup was for.
            self.stats.empty_wakeups += 1;
            return ConsumerState::Waiting;
        }

        let shown = self.present_local(sink);
        tracing::debug!(
            batch = shown,
            displayed = self.stats.displayed,
            estimated_total = self.estimated_total,
            "drained pending buckets"
        );

        if self.report(progress) == Progress::Abort && !self.abort_requested {
            tracing::info!(
                displayed = self.stats.displayed,
                "abort requested; asking renderer to stop"
            );
            self.abort_requested = true;
            self.context.request_abort();
        }
        ConsumerState::Waiting
    }

    fn final_drain(
        &mut self,
        sink: &mut dyn DisplaySink,
        progress: &mut dyn ProgressMonitor,
    ) -> ConsumerState {
        let moved = self.context.take_pending(&mut self.local);
        if moved > 0 {
            let shown = self.present_local(sink);
            tracing::debug!(batch = shown, "drained buckets left after end of stream");
        }
        // The renderer has already finished, so the answer is irrelevant.
        let _ = self.report(progress);
        ConsumerState::Done
    }

    fn present_local(&mut self, sink: &mut dyn DisplaySink) -> usize {
        let mut shown = 0;
        while let Some(bucket) = self.local.pop_front() {
            sink.present(&bucket);
            tracing::trace!(
                sequence = bucket.sequence(),
                x = bucket.x(),
                y = bucket.y(),
                width = bucket.width(),
                height = bucket.height(),
                "presented bucket"
            );
            self.retired.push_back(bucket);
            shown += 1;
        }
        self.stats.drain_passes += 1;
        self.stats.displayed += shown;
        self.stats.retired = self.retired.len();
        shown
    }

    fn report(&mut self, progress: &mut dyn ProgressMonitor) -> Progress {
        self.stats.progress_reports += 1;
        progress.progress(self.stats.displayed, self.estimated_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    #[derive(Default)]
    struct Recorder(Vec<(u32, u32)>);

    impl DisplaySink for Recorder {
        fn present(&mut self, bucket: &Bucket) {
            self.0.push((bucket.x(), bucket.y()));
        }
    }

    fn bucket(x: u32) -> Bucket {
        Bucket::new(x, 0, 1, 1, 4, vec![0.0; 4]).unwrap()
    }

    #[test]
    fn drains_in_fifo_order_then_finishes() {
        let ctx = SharedRenderContext::new();
        ctx.push(bucket(0));
        ctx.push(bucket(1));

        let mut consumer = BucketConsumer::new(&ctx, 10);
        let mut sink = Recorder::default();
        let mut progress = NoProgress;

        assert_eq!(consumer.step(&mut sink, &mut progress), ConsumerState::Draining);
        assert_eq!(consumer.step(&mut sink, &mut progress), ConsumerState::Waiting);
        assert_eq!(sink.0, vec![(0, 0), (1, 0)]);

        ctx.push(bucket(2));
        ctx.close();
        consumer.run(&mut sink, &mut progress);

        assert_eq!(consumer.state(), ConsumerState::Done);
        assert_eq!(sink.0, vec![(0, 0), (1, 0), (2, 0)]);
        assert_eq!(consumer.stats().retired, 3);
        assert_eq!(consumer.release(), 3);
    }

    #[test]
    fn empty_wakeup_returns_to_waiting() {
        let ctx = SharedRenderContext::new();
        ctx.wake().set();

        let mut consumer = BucketConsumer::new(&ctx, 1);
        let mut sink = Recorder::default();
        let mut progress = NoProgress;
        assert_eq!(consumer.step(&mut sink, &mut progress), ConsumerState::Draining);
        assert_eq!(consumer.step(&mut sink, &mut progress), ConsumerState::Waiting);
        assert_eq!(consumer.stats().empty_wakeups, 1);
        assert_eq!(consumer.stats().progress_reports, 0);
    }

    #[test]
    fn closed_empty_stream_reaches_done() {
        let ctx = SharedRenderContext::new();
        ctx.close();
        let mut consumer = BucketConsumer::new(&ctx, 4);
        let mut sink = Recorder::default();
        consumer.run(&mut sink, &mut NoProgress);
        assert_eq!(consumer.state(), ConsumerState::Done);
        assert!(sink.0.is_empty());
        assert_eq!(consumer.stats().progress_reports, 1);
        assert_eq!(consumer.release(), 0);
    }

    #[test]
    fn abort_is_requested_once_and_buckets_still_drain() {
        let ctx = SharedRenderContext::new();
        ctx.push(bucket(0));

        let mut consumer = BucketConsumer::new(&ctx, 4);
        let mut sink = Recorder::default();
        let mut aborts = 0;
        let mut progress = |_done: usize, _total: usize| {
            aborts += 1;
            Progress::Abort
        };

        consumer.step(&mut sink, &mut progress);
        consumer.step(&mut sink, &mut progress);
        assert!(ctx.should_abort());
        assert!(consumer.abort_requested());

        ctx.push(bucket(1));
        ctx.push(bucket(2));
        ctx.close();
        consumer.run(&mut sink, &mut progress);

        assert_eq!(sink.0.len(), 3);
        assert_eq!(consumer.stats().displayed, 3);
        let retired: Vec<_> = consumer.retired().map(Bucket::sequence).collect();
        assert_eq!(retired, vec![0, 1, 2]);
        drop(consumer);
        assert_eq!(aborts, 2);
    }
}
