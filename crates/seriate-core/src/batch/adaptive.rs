//! Adaptive budget controller.
//!
//! Nudges the concurrency budget between batches based on observed task
//! latency. The budget is fixed for the duration of a single batch; the
//! controller only influences the next one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Tuning knobs for [`AdaptiveBudget`].
#[derive(Clone, Debug)]
pub struct BudgetConfig {
    /// Smallest budget the controller will suggest.
    pub min_budget: usize,
    /// Largest budget the controller will suggest.
    pub max_budget: usize,
    /// Latency the controller tries to stay below.
    pub target_latency: Duration,
    /// Number of recent samples considered.
    pub sample_count: usize,
    /// How much the budget moves per adjustment.
    pub adjustment_step: usize,
    /// Minimum time between adjustments.
    pub cooldown: Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            min_budget: 1,
            max_budget: 64,
            target_latency: Duration::from_millis(100),
            sample_count: 100,
            adjustment_step: 2,
            cooldown: Duration::from_millis(500),
        }
    }
}

/// Suggests a concurrency budget from recorded task latencies.
pub struct AdaptiveBudget {
    current: AtomicUsize,
    config: BudgetConfig,
    latencies: RwLock<VecDeque<Duration>>,
    last_adjustment: AtomicU64,
    total_tasks: AtomicU64,
    total_latency_ms: AtomicU64,
}

impl AdaptiveBudget {
    pub fn new(initial: usize, config: BudgetConfig) -> Self {
        let initial = initial.clamp(config.min_budget, config.max_budget);

        Self {
            current: AtomicUsize::new(initial),
            latencies: RwLock::new(VecDeque::with_capacity(config.sample_count)),
            config,
            last_adjustment: AtomicU64::new(0),
            total_tasks: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(initial: usize) -> Self {
        Self::new(initial, BudgetConfig::default())
    }

    /// Record how long one transformation took.
    pub fn record_latency(&self, latency: Duration) {
        self.total_tasks.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);

        {
            let mut latencies = self.latencies.write().unwrap();
            latencies.push_back(latency);
            while latencies.len() > self.config.sample_count {
                latencies.pop_front();
            }
        }

        self.try_adjust();
    }

    fn try_adjust(&self) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let last = self.last_adjustment.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.config.cooldown.as_millis() as u64 {
            return;
        }

        // One adjuster at a time.
        if self
            .last_adjustment
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let latencies = self.latencies.read().unwrap();
        if latencies.len() < 10 {
            return;
        }

        let avg_latency = latencies.iter().map(|d| d.as_millis() as u64).sum::<u64>()
            / latencies.len() as u64;

        let target = self.config.target_latency.as_millis() as u64;
        let current = self.current.load(Ordering::Relaxed);
        let mut next = current;

        if avg_latency > target * 2 {
            next = current.saturating_sub(self.config.adjustment_step);
        } else if avg_latency < target / 2 {
            next = current + self.config.adjustment_step;
        }

        next = next.clamp(self.config.min_budget, self.config.max_budget);
        if next != current {
            self.current.store(next, Ordering::Relaxed);
        }
    }

    /// Budget suggested for the next batch.
    pub fn get(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: usize) {
        let value = value.clamp(self.config.min_budget, self.config.max_budget);
        self.current.store(value, Ordering::Relaxed);
    }

    pub fn average_latency(&self) -> Duration {
        let tasks = self.total_tasks.load(Ordering::Relaxed);
        let total = self.total_latency_ms.load(Ordering::Relaxed);

        if tasks == 0 {
            return Duration::ZERO;
        }

        Duration::from_millis(total / tasks)
    }

    pub fn stats(&self) -> BudgetStats {
        let latencies = self.latencies.read().unwrap();
        let samples: Vec<u64> = latencies.iter().map(|d| d.as_millis() as u64).collect();

        BudgetStats {
            current_budget: self.current.load(Ordering::Relaxed),
            min_budget: self.config.min_budget,
            max_budget: self.config.max_budget,
            average_latency_ms: self.average_latency().as_millis() as u64,
            p50_latency_ms: percentile(&samples, 50),
            p95_latency_ms: percentile(&samples, 95),
            p99_latency_ms: percentile(&samples, 99),
            total_tasks: self.total_tasks.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.latencies.write().unwrap().clear();
        self.total_tasks.store(0, Ordering::Relaxed);
        self.total_latency_ms.store(0, Ordering::Relaxed);
        self.last_adjustment.store(0, Ordering::Relaxed);
    }
}

/// Latency and budget statistics.
#[derive(Clone, Debug, Default)]
pub struct BudgetStats {
    pub current_budget: usize,
    pub min_budget: usize,
    pub max_budget: usize,
    pub average_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
    pub total_tasks: u64,
}

fn percentile(values: &[u64], p: u64) -> u64 {
    if values.is_empty() {
        return 0;
    }

    let mut sorted: Vec<u64> = values.to_vec();
    sorted.sort_unstable();

    let idx = (sorted.len() as u64 * p / 100) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_budget_is_clamped() {
        let config = BudgetConfig {
            min_budget: 2,
            max_budget: 16,
            ..Default::default()
        };

        let adaptive = AdaptiveBudget::new(64, config);
        assert_eq!(adaptive.get(), 16);
    }

    #[test]
    fn test_set_respects_bounds() {
        let adaptive = AdaptiveBudget::with_defaults(8);
        adaptive.set(0);
        assert_eq!(adaptive.get(), 1);
        adaptive.set(1000);
        assert_eq!(adaptive.get(), 64);
    }

    #[test]
    fn test_average_latency() {
        let config = BudgetConfig {
            cooldown: Duration::from_secs(3600),
            ..Default::default()
        };
        let adaptive = AdaptiveBudget::new(8, config);

        adaptive.record_latency(Duration::from_millis(10));
        adaptive.record_latency(Duration::from_millis(30));

        assert_eq!(adaptive.average_latency(), Duration::from_millis(20));
        assert_eq!(adaptive.stats().total_tasks, 2);
    }

    #[test]
    fn test_percentile() {
        let values = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        assert_eq!(percentile(&values, 50), 6);
        assert_eq!(percentile(&values, 95), 10);
        assert_eq!(percentile(&values, 99), 10);
    }
}
