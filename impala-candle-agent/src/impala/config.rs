//! Configuration of IMPALA agent.
use crate::{mlp::FeatureMlpConfig, opt::OptimizerConfig, ActionSpace, Device};
use anyhow::Result;
use impala_core::{error::ImpalaError, LinearLrSchedulerConfig, VtraceConfig};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Impala`](super::Impala) agent.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ImpalaConfig {
    /// Feature network.
    pub feature_config: FeatureMlpConfig,

    /// Action space, selecting the action head.
    pub action_space: ActionSpace,

    /// Initial standard deviation of the Gaussian head.
    pub std0: f64,

    /// Optimizer.
    pub opt_config: OptimizerConfig,

    /// Discount factor and clipping thresholds of V-trace.
    pub vtrace_config: VtraceConfig,

    /// Standardizes advantages in each learning step.
    pub standardize_adv: bool,

    /// Weight of the value loss.
    pub value_coef: f64,

    /// Weight of the entropy loss.
    pub entropy_coef: f64,

    /// Maximum global norm of gradients.
    pub max_grad_norm: f64,

    /// Linear decay of the learning rate, disabled if `None`.
    ///
    /// `initial_lr` of the scheduler overrides the learning rate of `opt_config`.
    pub lr_scheduler_config: Option<LinearLrSchedulerConfig>,

    /// Device.
    pub device: Device,

    /// Seed of the random number generator sampling discrete actions.
    pub seed: u64,

    /// Records parameter statistics in learning reports if `>= 2`.
    pub record_verbose_level: usize,
}

impl Default for ImpalaConfig {
    fn default() -> Self {
        Self {
            feature_config: FeatureMlpConfig::default(),
            action_space: ActionSpace::default(),
            std0: 0.6,
            opt_config: OptimizerConfig::Adam { lr: 1e-3 },
            vtrace_config: VtraceConfig::default(),
            standardize_adv: true,
            value_coef: 0.5,
            entropy_coef: 0.01,
            max_grad_norm: 0.5,
            lr_scheduler_config: None,
            device: Device::Cpu,
            seed: 42,
            record_verbose_level: 0,
        }
    }
}

impl ImpalaConfig {
    /// Sets the configuration of the feature network.
    pub fn feature_config(mut self, v: FeatureMlpConfig) -> Self {
        self.feature_config = v;
        self
    }

    /// Sets the action space.
    pub fn action_space(mut self, v: ActionSpace) -> Self {
        self.action_space = v;
        self
    }

    /// Sets the initial standard deviation of the Gaussian head.
    pub fn std0(mut self, v: f64) -> Self {
        self.std0 = v;
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the configuration of V-trace.
    pub fn vtrace_config(mut self, v: VtraceConfig) -> Self {
        self.vtrace_config = v;
        self
    }

    /// Enables or disables standardization of advantages.
    pub fn standardize_adv(mut self, v: bool) -> Self {
        self.standardize_adv = v;
        self
    }

    /// Sets the weight of the value loss.
    pub fn value_coef(mut self, v: f64) -> Self {
        self.value_coef = v;
        self
    }

    /// Sets the weight of the entropy loss.
    pub fn entropy_coef(mut self, v: f64) -> Self {
        self.entropy_coef = v;
        self
    }

    /// Sets the maximum global norm of gradients.
    pub fn max_grad_norm(mut self, v: f64) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Sets the learning rate scheduler.
    pub fn lr_scheduler_config(mut self, v: LinearLrSchedulerConfig) -> Self {
        self.lr_scheduler_config = Some(v);
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the verbose level of learning reports.
    pub fn record_verbose_level(mut self, v: usize) -> Self {
        self.record_verbose_level = v;
        self
    }

    /// Checks values which cannot be used for learning.
    pub fn validate(&self) -> Result<(), ImpalaError> {
        self.vtrace_config.validate()?;
        if !(self.max_grad_norm > 0.0) {
            return Err(ImpalaError::InvalidConfig(format!(
                "max_grad_norm must be positive, got {}",
                self.max_grad_norm
            )));
        }
        if let ActionSpace::Continuous(_) = self.action_space {
            if !(self.std0 > 0.0) {
                return Err(ImpalaError::InvalidConfig(format!(
                    "std0 must be positive, got {}",
                    self.std0
                )));
            }
        }
        match self.action_space {
            ActionSpace::Discrete(0) | ActionSpace::Continuous(0) => Err(ImpalaError::InvalidConfig(
                "action space must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Loads [`ImpalaConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        info!("Load config of IMPALA agent from {:?}", path);
        Ok(config)
    }

    /// Saves [`ImpalaConfig`] to YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of IMPALA agent into {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_impala_config() -> Result<()> {
        let config = ImpalaConfig::default()
            .feature_config(FeatureMlpConfig::new(4, vec![32, 16]))
            .action_space(ActionSpace::Continuous(2))
            .vtrace_config(VtraceConfig::default().gamma(0.95).clip_pg_rho(2.0))
            .lr_scheduler_config(LinearLrSchedulerConfig::default().total_timesteps(1000))
            .seed(7);

        let dir = TempDir::new("impala_config")?;
        let path = dir.path().join("impala_config.yaml");
        config.save(&path)?;
        let config_ = ImpalaConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(ImpalaConfig::default().validate().is_ok());
        assert!(ImpalaConfig::default().max_grad_norm(0.0).validate().is_err());
        assert!(ImpalaConfig::default()
            .action_space(ActionSpace::Continuous(1))
            .std0(0.0)
            .validate()
            .is_err());
        assert!(ImpalaConfig::default()
            .action_space(ActionSpace::Discrete(0))
            .validate()
            .is_err());
    }
}
