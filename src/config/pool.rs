use super::traits::ConfigSection;
use crate::error::FilterOptError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads. 0 means one per available core.
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub backpressure: Backpressure,
    pub generation_timeout_ms: u64,
    /// On cancellation, discard queued work and detach workers instead of draining.
    pub abandon_in_flight_on_cancel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backpressure {
    Block,
    FailFast,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            queue_capacity: 256,
            backpressure: Backpressure::Block,
            generation_timeout_ms: 60_000,
            abandon_in_flight_on_cancel: false,
        }
    }
}

impl PoolConfig {
    pub fn effective_workers(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

impl ConfigSection for PoolConfig {
    fn section_name() -> &'static str {
        "pool"
    }

    fn validate(&self) -> Result<(), FilterOptError> {
        if self.queue_capacity == 0 {
            return Err(FilterOptError::Configuration(
                "Pool queue capacity must be at least 1".to_string(),
            ));
        }
        if self.generation_timeout_ms == 0 {
            return Err(FilterOptError::Configuration(
                "Generation timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_resolves_to_available_parallelism() {
        let config = PoolConfig::default();
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn explicit_worker_count_wins() {
        let config = PoolConfig {
            worker_count: 3,
            ..PoolConfig::default()
        };
        assert_eq!(config.effective_workers(), 3);
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = PoolConfig {
            queue_capacity: 0,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
