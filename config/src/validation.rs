//! Validation of a parsed config

use crate::PoolConfig;

/// Check the config for values the pool cannot run with
pub(crate) fn validate_config(config: &PoolConfig) -> Result<(), String> {
    if config.num_sleepers == 0 {
        return Err("`num-sleepers` must be at least 1".to_string());
    }

    if config.executor_threads == 0 {
        return Err("`executor-threads` must be at least 1".to_string());
    }

    if config.idle_poll_interval.is_zero()
        || config.max_sleep.is_zero()
        || config.maintenance_interval.is_zero()
    {
        return Err("poll, sleep, and maintenance intervals must be non-zero".to_string());
    }

    if config.load_tasks_per_sec > 0 && config.load_max_delay.is_zero() {
        return Err("`load-max-delay-ms` must be non-zero when load is enabled".to_string());
    }

    if config.idle_poll_interval > config.max_sleep {
        return Err("`idle-poll-ms` must not exceed `max-sleep-ms`".to_string());
    }

    Ok(())
}
