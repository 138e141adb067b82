/// Answer from a progress collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    /// Ask the renderer to stop. Advisory only; buckets already in flight are still shown.
    Abort,
}

/// Snapshot of how far a render has come.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderProgress {
    pub done: usize,
    pub estimated_total: usize,
}

impl RenderProgress {
    /// Completion ratio clamped to `[0, 1]`; the total is only an estimate.
    pub fn ratio(&self) -> f32 {
        if self.estimated_total == 0 {
            return 1.0;
        }
        (self.done as f32 / self.estimated_total as f32).min(1.0)
    }
}

/// Receives progress reports from the consuming thread.
pub trait ProgressMonitor {
    fn progress(&mut self, done: usize, estimated_total: usize) -> Progress;
}

impl<F> ProgressMonitor for F
where
    F: FnMut(usize, usize) -> Progress,
{
    fn progress(&mut self, done: usize, estimated_total: usize) -> Progress {
        self(done, estimated_total)
    }
}

/// Monitor that never asks for an abort.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressMonitor for NoProgress {
    fn progress(&mut self, _done: usize, _estimated_total: usize) -> Progress {
        Progress::Continue
    }
}

/// Requests an abort once `limit` reports have been received.
#[derive(Debug, Clone, Copy)]
pub struct AbortAfter {
    limit: usize,
    seen: usize,
}

impl AbortAfter {
    pub fn new(limit: usize) -> Self {
        Self { limit, seen: 0 }
    }

    pub fn reports_seen(&self) -> usize {
        self.seen
    }
}

impl ProgressMonitor for AbortAfter {
    fn progress(&mut self, _done: usize, _estimated_total: usize) -> Progress {
        self.seen += 1;
        if self.seen >= self.limit {
            Progress::Abort
        } else {
            Progress::Continue
        }
    }
}

/// Logs completion through `tracing` each time it crosses another `step_percent`.
#[derive(Debug, Clone)]
pub struct LogProgress {
    step_percent: u32,
    last_logged: Option<u32>,
}

impl LogProgress {
    pub fn new(step_percent: u32) -> Self {
        Self {
            step_percent: step_percent.clamp(1, 100),
            last_logged: None,
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ProgressMonitor for LogProgress {
    fn progress(&mut self, done: usize, estimated_total: usize) -> Progress {
        let snapshot = RenderProgress {
            done,
            estimated_total,
        };
        let percent = (snapshot.ratio() * 100.0).floor() as u32;
        let bucket = percent / self.step_percent;
        if self.last_logged.map_or(true, |last| bucket > last) {
            self.last_logged = Some(bucket);
            tracing::info!(done, estimated_total, percent, "render progress");
        }
        Progress::Continue
    }
}

/// Rough bucket count used only for progress feedback.
pub fn estimate_total_buckets(width: u32, height: u32, tile_size: u32) -> usize {
    let tile_area = u64::from(tile_size.max(1)).pow(2);
    let estimate = u64::from(width) * u64::from(height) / tile_area;
    usize::try_from(estimate).unwrap_or(usize::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_uses_typical_tile_area() {
        assert_eq!(estimate_total_buckets(640, 480, 32), 300);
        assert_eq!(estimate_total_buckets(4, 4, 32), 1);
        assert_eq!(estimate_total_buckets(64, 64, 0), 4096);
    }

    #[test]
    fn ratio_is_clamped() {
        let over = RenderProgress {
            done: 12,
            estimated_total: 10,
        };
        assert_eq!(over.ratio(), 1.0);
        let half = RenderProgress {
            done: 5,
            estimated_total: 10,
        };
        assert!((half.ratio() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn abort_after_trips_on_nth_report() {
        let mut monitor = AbortAfter::new(2);
        assert_eq!(monitor.progress(1, 10), Progress::Continue);
        assert_eq!(monitor.progress(2, 10), Progress::Abort);
        assert_eq!(monitor.progress(3, 10), Progress::Abort);
        assert_eq!(monitor.reports_seen(), 3);
    }

    #[test]
    fn closures_act_as_monitors() {
        let mut calls = Vec::new();
        let mut monitor = |done: usize, total: usize| {
            calls.push((done, total));
            Progress::Continue
        };
        assert_eq!(monitor.progress(3, 9), Progress::Continue);
        assert_eq!(calls, vec![(3, 9)]);
    }
}
