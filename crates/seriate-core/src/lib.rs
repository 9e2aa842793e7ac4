//! Core library for Seriate: bounded-concurrency batch execution with
//! strictly ordered serial consumption.
//! Used by the CLI binary; can be reused by other tools (e.g. services, test
//! harnesses).

pub mod batch;
pub mod config;
pub mod error_handling;
pub mod utils;

// Re-export main API for CLI
pub use batch::{
    for_each_bounded, map_bounded, map_consume_in_order, AdaptiveBudget, Batch, BatchConfig,
    BatchMetrics, BudgetConfig, BudgetStats, MetricsSnapshot, Priority,
};
pub use config::{load_config, max_in_flight_from_env, Config, MAX_IN_FLIGHT_CAP};
pub use error_handling::{BatchError, InvariantViolation};
pub use utils::{log, log_error};
