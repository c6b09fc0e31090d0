//! Linear decay of the learning rate.
use crate::error::ImpalaError;
use serde::{Deserialize, Serialize};

/// Configuration of [`LinearLrScheduler`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct LinearLrSchedulerConfig {
    /// Learning rate at timestep 0.
    pub initial_lr: f64,

    /// Timestep at which the decay reaches `min_lr`.
    pub total_timesteps: usize,

    /// Lower bound of the learning rate.
    pub min_lr: f64,
}

impl Default for LinearLrSchedulerConfig {
    fn default() -> Self {
        Self {
            initial_lr: 1e-3,
            total_timesteps: 1_000_000,
            min_lr: 1e-8,
        }
    }
}

impl LinearLrSchedulerConfig {
    /// Sets the initial learning rate.
    pub fn initial_lr(mut self, v: f64) -> Self {
        self.initial_lr = v;
        self
    }

    /// Sets the length of the decay in environment steps.
    pub fn total_timesteps(mut self, v: usize) -> Self {
        self.total_timesteps = v;
        self
    }

    /// Sets the lower bound.
    pub fn min_lr(mut self, v: f64) -> Self {
        self.min_lr = v;
        self
    }
}

/// Learning rate decaying linearly in the number of environment steps.
///
/// `lr(t) = initial_lr * max(min_lr / initial_lr, 1 - t / total_timesteps)`
#[derive(Debug, Clone)]
pub struct LinearLrScheduler {
    initial_lr: f64,
    total_timesteps: usize,
    min_factor: f64,
}

impl LinearLrScheduler {
    /// Builds a scheduler.
    ///
    /// Fails unless `0 < min_lr <= initial_lr` and `total_timesteps > 0`.
    pub fn build(config: &LinearLrSchedulerConfig) -> Result<Self, ImpalaError> {
        if config.total_timesteps == 0 {
            return Err(ImpalaError::InvalidConfig(
                "total_timesteps must be positive".to_string(),
            ));
        }
        if !(config.min_lr > 0.0 && config.min_lr <= config.initial_lr) {
            return Err(ImpalaError::InvalidConfig(format!(
                "expected 0 < min_lr <= initial_lr, got min_lr = {}, initial_lr = {}",
                config.min_lr, config.initial_lr
            )));
        }

        Ok(Self {
            initial_lr: config.initial_lr,
            total_timesteps: config.total_timesteps,
            min_factor: config.min_lr / config.initial_lr,
        })
    }

    /// Learning rate after `timestep` environment steps.
    pub fn lr(&self, timestep: usize) -> f64 {
        let progress = timestep as f64 / self.total_timesteps as f64;
        self.initial_lr * (1.0 - progress).max(self.min_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_decay() {
        let config = LinearLrSchedulerConfig::default()
            .initial_lr(1e-2)
            .total_timesteps(100)
            .min_lr(1e-4);
        let scheduler = LinearLrScheduler::build(&config).unwrap();

        assert!((scheduler.lr(0) - 1e-2).abs() < 1e-12);
        assert!((scheduler.lr(50) - 5e-3).abs() < 1e-12);
        assert!((scheduler.lr(99) - 1e-4).abs() < 1e-12);
        assert!((scheduler.lr(100) - 1e-4).abs() < 1e-12);
        assert!((scheduler.lr(1_000) - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_config() {
        let config = LinearLrSchedulerConfig::default().total_timesteps(0);
        assert!(LinearLrScheduler::build(&config).is_err());

        let config = LinearLrSchedulerConfig::default().initial_lr(1e-3).min_lr(1e-2);
        assert!(LinearLrScheduler::build(&config).is_err());
    }
}
