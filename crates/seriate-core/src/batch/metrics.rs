//! Batch metrics for monitoring and tests.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Counters shared by every task of a scheduler. All updates are relaxed
/// atomics; `snapshot` gives a point-in-time view.
#[derive(Debug, Default)]
pub struct BatchMetrics {
    tasks_started: AtomicU64,
    tasks_succeeded: AtomicU64,
    tasks_failed: AtomicU64,
    items_consumed: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    total_task_ms: AtomicU64,
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn task_started(&self) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::Relaxed);
    }

    pub(crate) fn task_finished(&self, elapsed: Duration, success: bool) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.total_task_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        if success {
            self.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn item_consumed(&self) {
        self.items_consumed.fetch_add(1, Ordering::Relaxed);
    }

    /// Highest number of transformations observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let started = self.tasks_started.load(Ordering::Relaxed);
        let total_ms = self.total_task_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            tasks_started: started,
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            items_consumed: self.items_consumed.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::Relaxed),
            average_task_ms: if started > 0 { total_ms / started } else { 0 },
        }
    }

    pub fn reset(&self) {
        self.tasks_started.store(0, Ordering::Relaxed);
        self.tasks_succeeded.store(0, Ordering::Relaxed);
        self.tasks_failed.store(0, Ordering::Relaxed);
        self.items_consumed.store(0, Ordering::Relaxed);
        self.in_flight.store(0, Ordering::Relaxed);
        self.peak_in_flight.store(0, Ordering::Relaxed);
        self.total_task_ms.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of [`BatchMetrics`].
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct MetricsSnapshot {
    pub tasks_started: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub items_consumed: u64,
    pub peak_in_flight: usize,
    pub average_task_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_high_water_mark() {
        let metrics = BatchMetrics::new();
        metrics.task_started();
        metrics.task_started();
        metrics.task_started();
        metrics.task_finished(Duration::from_millis(5), true);
        metrics.task_started();

        assert_eq!(metrics.peak_in_flight(), 3);
        let snap = metrics.snapshot();
        assert_eq!(snap.tasks_started, 4);
        assert_eq!(snap.tasks_succeeded, 1);
    }

    #[test]
    fn test_reset_clears_counters() {
        let metrics = BatchMetrics::new();
        metrics.task_started();
        metrics.task_finished(Duration::from_millis(1), false);
        metrics.reset();

        let snap = metrics.snapshot();
        assert_eq!(snap.tasks_started, 0);
        assert_eq!(snap.tasks_failed, 0);
        assert_eq!(snap.peak_in_flight, 0);
    }
}
