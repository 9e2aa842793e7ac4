//! Bounded batch scheduler: admission-controlled fan-out over a locally
//! owned task set, with in-order collection or strictly serial consumption.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::batch::adaptive::{AdaptiveBudget, BudgetConfig, BudgetStats};
use crate::batch::metrics::BatchMetrics;
use crate::batch::reorder::ReorderBuffer;
use crate::error_handling::{BatchError, InvariantViolation};
use crate::utils;

/// Advisory scheduling hint carried with every spawned task.
///
/// The runtime has no priority lanes; `Low` yields once before the
/// transformation starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Configuration for one batch scheduler.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Maximum simultaneously in-flight transformations. `0` means
    /// effectively unbounded (normalized to the input length).
    pub max_in_flight: usize,
    /// Advisory priority hint, passed through to the spawn wrapper.
    pub priority: Priority,
}

impl BatchConfig {
    pub fn bounded(max_in_flight: usize) -> Self {
        Self {
            max_in_flight,
            priority: Priority::Normal,
        }
    }

    pub fn unbounded() -> Self {
        Self::bounded(0)
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Batch scheduler. Owns its configuration and metrics; all execution state
/// lives inside a single operation call and is discarded when it returns.
pub struct Batch {
    config: BatchConfig,
    metrics: Arc<BatchMetrics>,
    adaptive: Option<Arc<AdaptiveBudget>>,
}

impl Batch {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(BatchMetrics::new()),
            adaptive: None,
        }
    }

    /// Scheduler whose budget follows an [`AdaptiveBudget`] controller.
    /// Within one batch the budget stays fixed; recorded latencies steer
    /// the budget of subsequent batches.
    pub fn adaptive(config: BatchConfig, budget: BudgetConfig) -> Self {
        let initial = if config.max_in_flight > 0 {
            config.max_in_flight
        } else {
            crate::config::max_in_flight_from_env()
        };

        Self {
            adaptive: Some(Arc::new(AdaptiveBudget::new(initial, budget))),
            config,
            metrics: Arc::new(BatchMetrics::new()),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn metrics(&self) -> &BatchMetrics {
        &self.metrics
    }

    /// Latency statistics from the adaptive controller, when one is attached.
    pub fn budget_stats(&self) -> Option<BudgetStats> {
        self.adaptive.as_ref().map(|a| a.stats())
    }

    fn effective_budget(&self, len: usize) -> usize {
        let configured = match &self.adaptive {
            Some(adaptive) => adaptive.get(),
            None => self.config.max_in_flight,
        };

        if configured == 0 {
            len
        } else {
            configured.min(len)
        }
    }

    /// Transform every element with at most the configured budget in flight.
    /// Results come back in ORIGINAL INPUT ORDER regardless of completion
    /// order. The first failure aborts the whole batch; no partial result is
    /// returned.
    pub async fn map<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        transform: F,
    ) -> Result<Vec<R>, BatchError<E>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let len = items.len();
        if len == 0 {
            return Ok(Vec::new());
        }

        let budget = self.effective_budget(len);
        utils::log(&format!("batch map: {} items, budget {}", len, budget));

        let transform = Arc::new(transform);
        let mut tasks = JoinSet::new();
        let mut pending = items.into_iter().enumerate();

        for _ in 0..budget {
            if let Some((index, item)) = pending.next() {
                self.admit(&mut tasks, index, item, &transform);
            }
        }

        let mut slots: Vec<Option<R>> = Vec::with_capacity(len);
        slots.resize_with(len, || None);

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| BatchError::Panic {
                detail: e.to_string(),
            })?;

            let value = match result {
                Ok(value) => value,
                Err(source) => {
                    utils::log_error(&format!("batch map: task {} failed, aborting", index));
                    return Err(BatchError::Task { index, source });
                }
            };

            if let Some((next_index, item)) = pending.next() {
                self.admit(&mut tasks, next_index, item, &transform);
            }

            slots[index] = Some(value);
        }

        let mut results = Vec::with_capacity(len);
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(value) => results.push(value),
                None => {
                    return Err(BatchError::Invariant(InvariantViolation::entry_missing(
                        index,
                    )))
                }
            }
        }

        Ok(results)
    }

    /// Run `action` once per element with at most the configured budget in
    /// flight. No ordering guarantee between invocations.
    pub async fn for_each<T, E, F, Fut>(&self, items: Vec<T>, action: F) -> Result<(), BatchError<E>>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.map(items, action).await.map(|_| ())
    }

    /// Transform every element concurrently, then feed the results one at a
    /// time into `consume` in STRICT ORIGINAL INPUT ORDER. Consumer calls
    /// never overlap; a buffered completion waits until every earlier index
    /// has been consumed. Failure of either closure aborts the batch; the
    /// consumer has then seen exactly the indices before the failing one.
    pub async fn map_consume_in_order<T, M, E, F, Fut, C, CFut>(
        &self,
        items: Vec<T>,
        transform: F,
        mut consume: C,
    ) -> Result<(), BatchError<E>>
    where
        T: Send + 'static,
        M: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M, E>> + Send + 'static,
        C: FnMut(M) -> CFut,
        CFut: Future<Output = Result<(), E>>,
    {
        let len = items.len();
        if len == 0 {
            return Ok(());
        }

        let budget = self.effective_budget(len);
        utils::log(&format!(
            "batch consume-in-order: {} items, budget {}",
            len, budget
        ));

        let transform = Arc::new(transform);
        let mut tasks = JoinSet::new();
        let mut pending = items.into_iter().enumerate();

        for _ in 0..budget {
            if let Some((index, item)) = pending.next() {
                self.admit(&mut tasks, index, item, &transform);
            }
        }

        let mut buffer = ReorderBuffer::with_capacity(budget);
        let mut next_expect = 0usize;

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| BatchError::Panic {
                detail: e.to_string(),
            })?;

            let value = match result {
                Ok(value) => value,
                Err(source) => {
                    utils::log_error(&format!(
                        "batch consume-in-order: task {} failed, aborting",
                        index
                    ));
                    return Err(BatchError::Task { index, source });
                }
            };

            if let Some((next_index, item)) = pending.next() {
                self.admit(&mut tasks, next_index, item, &transform);
            }

            buffer.insert(index, value).map_err(BatchError::Invariant)?;

            // Drain every now-contiguous entry. The consumer is awaited
            // before the cursor moves, so calls are strictly sequential.
            while let Some(ready) = buffer.take(next_expect) {
                consume(ready)
                    .await
                    .map_err(|source| BatchError::Task {
                        index: next_expect,
                        source,
                    })?;
                self.metrics.item_consumed();
                next_expect += 1;
            }
        }

        if next_expect != len || !buffer.is_empty() {
            return Err(BatchError::Invariant(InvariantViolation::entry_missing(
                next_expect,
            )));
        }

        Ok(())
    }

    fn admit<T, R, E, F, Fut>(
        &self,
        tasks: &mut JoinSet<(usize, Result<R, E>)>,
        index: usize,
        item: T,
        transform: &Arc<F>,
    ) where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let transform = Arc::clone(transform);
        let metrics = Arc::clone(&self.metrics);
        let adaptive = self.adaptive.clone();
        let priority = self.config.priority;

        tasks.spawn(async move {
            if priority == Priority::Low {
                tokio::task::yield_now().await;
            }

            metrics.task_started();
            let started = Instant::now();
            let result = transform(item).await;
            let elapsed = started.elapsed();
            metrics.task_finished(elapsed, result.is_ok());

            if let Some(adaptive) = &adaptive {
                adaptive.record_latency(elapsed);
            }

            (index, result)
        });
    }
}

/// Map every element with at most `max_in_flight` transformations in flight
/// (`0` = unbounded). Results are in original input order.
pub async fn map_bounded<T, R, E, F, Fut>(
    items: Vec<T>,
    max_in_flight: usize,
    transform: F,
) -> Result<Vec<R>, BatchError<E>>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    Batch::new(BatchConfig::bounded(max_in_flight))
        .map(items, transform)
        .await
}

/// Run `action` once per element with at most `max_in_flight` in flight
/// (`0` = unbounded).
pub async fn for_each_bounded<T, E, F, Fut>(
    items: Vec<T>,
    max_in_flight: usize,
    action: F,
) -> Result<(), BatchError<E>>
where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    Batch::new(BatchConfig::bounded(max_in_flight))
        .for_each(items, action)
        .await
}

/// Transform concurrently, consume strictly in original input order
/// (`0` = unbounded).
pub async fn map_consume_in_order<T, M, E, F, Fut, C, CFut>(
    items: Vec<T>,
    max_in_flight: usize,
    transform: F,
    consume: C,
) -> Result<(), BatchError<E>>
where
    T: Send + 'static,
    M: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<M, E>> + Send + 'static,
    C: FnMut(M) -> CFut,
    CFut: Future<Output = Result<(), E>>,
{
    Batch::new(BatchConfig::bounded(max_in_flight))
        .map_consume_in_order(items, transform, consume)
        .await
}
