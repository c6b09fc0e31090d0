//! Policy and value heads on top of the feature network.
mod categorical;
mod gaussian;
mod value;
use crate::{model::SubModel1, ActionSpace};
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarBuilder;
pub use categorical::{Categorical, CategoricalHead, CategoricalHeadConfig};
pub use gaussian::{DiagGaussian, DiagGaussianHead, DiagGaussianHeadConfig};
use rand::Rng;
pub use value::ValueHead;

/// Action head selected once from the action space.
pub enum ActionHead {
    /// For [`ActionSpace::Discrete`].
    Categorical(CategoricalHead),

    /// For [`ActionSpace::Continuous`].
    DiagGaussian(DiagGaussianHead),
}

impl ActionHead {
    /// Builds the head matching `action_space`.
    ///
    /// `std0` is the initial standard deviation of the Gaussian head and is
    /// ignored for discrete actions.
    pub fn build(vb: VarBuilder, feature_dim: usize, action_space: &ActionSpace, std0: f64) -> Result<Self> {
        Ok(match action_space {
            ActionSpace::Discrete(n) => Self::Categorical(CategoricalHead::build(
                vb,
                CategoricalHeadConfig {
                    feature_dim,
                    n_actions: *n,
                },
            )?),
            ActionSpace::Continuous(dim) => Self::DiagGaussian(DiagGaussianHead::build(
                vb,
                DiagGaussianHeadConfig {
                    feature_dim,
                    action_dim: *dim,
                    std0,
                },
            )?),
        })
    }

    /// Returns the action distribution given features.
    pub fn forward(&self, features: &Tensor) -> Result<ActionDist> {
        Ok(match self {
            Self::Categorical(head) => ActionDist::Categorical(head.forward(features)?),
            Self::DiagGaussian(head) => ActionDist::DiagGaussian(head.forward(features)?),
        })
    }
}

/// Batch of action distributions, one per row of the features.
pub enum ActionDist {
    /// Categorical distributions.
    Categorical(Categorical),

    /// Diagonal Gaussian distributions.
    DiagGaussian(DiagGaussian),
}

impl ActionDist {
    /// Samples one action per distribution.
    ///
    /// Returns `[N]` of `u32` for categorical and `[N, dim]` of `f32` for
    /// Gaussian distributions.
    pub fn sample(&self, rng: &mut impl Rng) -> Result<Tensor> {
        match self {
            Self::Categorical(d) => d.sample(rng),
            Self::DiagGaussian(d) => d.sample(rng),
        }
    }

    /// Log-probabilities (densities) of the given actions, `[N]`.
    pub fn log_prob(&self, actions: &Tensor) -> Result<Tensor> {
        match self {
            Self::Categorical(d) => d.log_prob(actions),
            Self::DiagGaussian(d) => d.log_prob(actions),
        }
    }

    /// Entropies, `[N]`.
    pub fn entropy(&self) -> Result<Tensor> {
        match self {
            Self::Categorical(d) => d.entropy(),
            Self::DiagGaussian(d) => d.entropy(),
        }
    }
}
