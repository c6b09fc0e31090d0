use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::{linear, Init, Linear, Module, VarBuilder};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// `0.5 * ln(2π)`
const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;

/// Configuration of [`DiagGaussianHead`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DiagGaussianHeadConfig {
    /// Dimension of the input features.
    pub feature_dim: usize,

    /// Dimension of actions.
    pub action_dim: usize,

    /// Initial standard deviation.
    pub std0: f64,
}

/// Gaussian policy head with a state-independent diagonal covariance.
///
/// The mean is a linear function of the features. The log standard
/// deviation is a free parameter initialized to `ln(std0)`.
pub struct DiagGaussianHead {
    fc: Linear,
    log_std: Tensor,
}

impl SubModel1 for DiagGaussianHead {
    type Config = DiagGaussianHeadConfig;
    type Input = Tensor;
    type Output = DiagGaussian;

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let fc = linear(config.feature_dim, config.action_dim, vb.pp("mean"))?;
        let log_std = vb.get_with_hints(config.action_dim, "log_std", Init::Const(config.std0.ln()))?;
        Ok(Self { fc, log_std })
    }

    fn forward(&self, features: &Tensor) -> Result<DiagGaussian> {
        Ok(DiagGaussian {
            mean: self.fc.forward(features)?,
            log_std: self.log_std.clone(),
        })
    }
}

/// Diagonal Gaussian distributions with means `[N, dim]` and a shared log
/// standard deviation `[dim]`.
pub struct DiagGaussian {
    mean: Tensor,
    log_std: Tensor,
}

impl DiagGaussian {
    /// Means of the distributions.
    pub fn mean(&self) -> &Tensor {
        &self.mean
    }

    /// Standard deviations.
    pub fn std(&self) -> Result<Tensor> {
        Ok(self.log_std.exp()?)
    }

    /// Samples `mean + std * eps` with `eps ~ N(0, I)`.
    pub fn sample(&self, rng: &mut impl Rng) -> Result<Tensor> {
        let mean = self.mean.detach();
        let eps: Vec<f32> = (0..mean.elem_count())
            .map(|_| rng.sample(StandardNormal))
            .collect();
        let eps = Tensor::from_vec(eps, mean.dims(), mean.device())?;
        Ok((mean + eps.broadcast_mul(&self.std()?.detach())?)?)
    }

    /// Log-densities `[N]` of actions `[N, dim]`, summed over dimensions.
    pub fn log_prob(&self, actions: &Tensor) -> Result<Tensor> {
        let z = actions
            .broadcast_sub(&self.mean)?
            .broadcast_div(&self.std()?)?;
        let lp = ((z.sqr()? * -0.5)?.broadcast_sub(&self.log_std)? - HALF_LN_2PI)?;
        Ok(lp.sum(D::Minus1)?)
    }

    /// Entropies `[N]`, all equal since the covariance does not depend on the state.
    pub fn entropy(&self) -> Result<Tensor> {
        let n = self.mean.dims()[0];
        let h = (&self.log_std + (0.5 + HALF_LN_2PI))?.sum_all()?;
        Ok(h.broadcast_as((n,))?)
    }
}
