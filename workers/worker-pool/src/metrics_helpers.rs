//! Helper functions and constants for recording worker pool metrics

/// Metric describing the number of successful swaps by sleepers
const NUM_SWAPS_METRIC: &str = "num_sleeper_swaps";
/// Metric describing the number of tasks executed
const NUM_EXECUTED_TASKS_METRIC: &str = "num_executed_tasks";
/// Metric describing the number of tasks harvested by maintenance
const NUM_HARVESTED_TASKS_METRIC: &str = "num_harvested_tasks";
/// Metric describing the number of maintenance sweeps attempted
const NUM_MAINTENANCE_SWEEPS_METRIC: &str = "num_maintenance_sweeps";

/// Increment the number of successful swaps
#[inline]
pub(crate) fn record_swap() {
    metrics::counter!(NUM_SWAPS_METRIC).increment(1);
}

/// Increment the number of executed tasks
#[inline]
pub(crate) fn record_task_executed() {
    metrics::counter!(NUM_EXECUTED_TASKS_METRIC).increment(1);
}

/// Record a maintenance sweep and the number of tasks it harvested
#[inline]
pub(crate) fn record_sweep(num_harvested: usize) {
    metrics::counter!(NUM_MAINTENANCE_SWEEPS_METRIC).increment(1);
    metrics::counter!(NUM_HARVESTED_TASKS_METRIC).increment(num_harvested as u64);
}
