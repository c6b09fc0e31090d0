//! Optimizer updating all parameters of the agent with one loss.
use anyhow::Result;
use candle_core::{backprop::GradStore, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::adam::{Adam, ParamsAdam};
use serde::{Deserialize, Serialize};

/// Configuration of the optimizer.
///
/// Omitted fields take the defaults of the underlying implementations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam of `candle-optimisers`.
    Adam {
        /// Learning rate.
        lr: f64,
    },

    /// AdamW of `candle-nn`.
    AdamW {
        /// Learning rate.
        lr: f64,

        /// Decoupled weight decay.
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,

        /// Term added to the denominator.
        #[serde(default = "default_eps")]
        eps: f64,
    },
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam { lr: 1e-3 }
    }
}

impl OptimizerConfig {
    /// Constructs an optimizer over `vars`.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        let opt = match *self {
            Self::Adam { lr } => Optimizer::Adam(Adam::new(
                vars,
                ParamsAdam {
                    lr,
                    ..ParamsAdam::default()
                },
            )?),
            Self::AdamW {
                lr,
                weight_decay,
                eps,
            } => Optimizer::AdamW(AdamW::new(
                vars,
                ParamsAdamW {
                    lr,
                    weight_decay,
                    eps,
                    ..ParamsAdamW::default()
                },
            )?),
        };
        Ok(opt)
    }

    /// Replaces the learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        match &mut self {
            Self::Adam { lr } | Self::AdamW { lr, .. } => *lr = v,
        }
        self
    }

    /// Learning rate.
    pub fn lr(&self) -> f64 {
        match *self {
            Self::Adam { lr } | Self::AdamW { lr, .. } => lr,
        }
    }
}

/// Optimizer built from [`OptimizerConfig`].
pub enum Optimizer {
    /// Adam.
    Adam(Adam),

    /// AdamW.
    AdamW(AdamW),
}

impl Optimizer {
    /// Applies gradients to the variables given at construction.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::Adam(opt) => opt.step(grads)?,
            Self::AdamW(opt) => opt.step(grads)?,
        }
        Ok(())
    }

    /// Current learning rate.
    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::Adam(opt) => opt.learning_rate(),
            Self::AdamW(opt) => opt.learning_rate(),
        }
    }

    /// Sets the learning rate of subsequent steps.
    pub fn set_learning_rate(&mut self, lr: f64) {
        match self {
            Self::Adam(opt) => opt.set_learning_rate(lr),
            Self::AdamW(opt) => opt.set_learning_rate(lr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_step_descends() -> Result<()> {
        for config in [
            OptimizerConfig::Adam { lr: 0.1 },
            OptimizerConfig::AdamW {
                lr: 0.1,
                weight_decay: 0.0,
                eps: 1e-8,
            },
        ]
        .iter()
        {
            let x = Var::new(&[1f32, -2.0], &Device::Cpu)?;
            let mut opt = config.build(vec![x.clone()])?;
            let loss = x.as_tensor().sqr()?.sum_all()?;
            opt.step(&loss.backward()?)?;
            let x: Vec<f32> = x.as_tensor().to_vec1()?;
            assert!(x[0] < 1.0 && x[1] > -2.0);

            opt.set_learning_rate(0.01);
            assert_eq!(opt.learning_rate(), 0.01);
        }
        Ok(())
    }

    #[test]
    fn test_override_lr() {
        let config = OptimizerConfig::AdamW {
            lr: 1e-3,
            weight_decay: 0.0,
            eps: 1e-8,
        }
        .learning_rate(5e-4);
        assert_eq!(config.lr(), 5e-4);

        let config: OptimizerConfig = serde_yaml::from_str("Adam:\n  lr: 0.01\n").unwrap();
        assert_eq!(config, OptimizerConfig::Adam { lr: 0.01 });
    }
}
