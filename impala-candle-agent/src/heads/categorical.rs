use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{DType, Tensor, D};
use candle_nn::{linear, ops::log_softmax, Linear, Module, VarBuilder};
use rand::{distributions::WeightedIndex, Rng};
use serde::{Deserialize, Serialize};

/// Configuration of [`CategoricalHead`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CategoricalHeadConfig {
    /// Dimension of the input features.
    pub feature_dim: usize,

    /// Number of actions.
    pub n_actions: usize,
}

/// Linear layer producing logits of a categorical distribution.
pub struct CategoricalHead {
    fc: Linear,
}

impl SubModel1 for CategoricalHead {
    type Config = CategoricalHeadConfig;
    type Input = Tensor;
    type Output = Categorical;

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let fc = linear(config.feature_dim, config.n_actions, vb.pp("logits"))?;
        Ok(Self { fc })
    }

    fn forward(&self, features: &Tensor) -> Result<Categorical> {
        let logits = self.fc.forward(features)?;
        Ok(Categorical {
            log_probs: log_softmax(&logits, D::Minus1)?,
        })
    }
}

/// Categorical distributions, parametrized by normalized log-probabilities `[N, n]`.
pub struct Categorical {
    log_probs: Tensor,
}

impl Categorical {
    /// Log-probabilities of all actions.
    pub fn log_probs(&self) -> &Tensor {
        &self.log_probs
    }

    /// Probabilities of all actions.
    pub fn probs(&self) -> Result<Tensor> {
        Ok(self.log_probs.exp()?)
    }

    /// Samples action indices `[N]` with weights given by the probabilities.
    pub fn sample(&self, rng: &mut impl Rng) -> Result<Tensor> {
        let probs = self.probs()?.detach().to_vec2::<f32>()?;
        let n_samples = probs.len();
        let mut data = Vec::with_capacity(n_samples);
        for p in probs.iter() {
            data.push(rng.sample(WeightedIndex::new(p)?) as u32);
        }
        Ok(Tensor::from_vec(data, (n_samples,), self.log_probs.device())?)
    }

    /// Log-probabilities `[N]` of action indices `[N]`.
    pub fn log_prob(&self, actions: &Tensor) -> Result<Tensor> {
        let ix = actions.to_dtype(DType::U32)?.unsqueeze(1)?.contiguous()?;
        Ok(self.log_probs.gather(&ix, 1)?.squeeze(1)?)
    }

    /// Entropies `[N]`.
    pub fn entropy(&self) -> Result<Tensor> {
        let plogp = (self.probs()? * &self.log_probs)?;
        Ok(plogp.sum(D::Minus1)?.neg()?)
    }
}
