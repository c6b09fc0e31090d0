use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder};

/// State-value head, `Linear(feature_dim, 1)` squeezed to `[N]`.
pub struct ValueHead {
    fc: Linear,
}

impl SubModel1 for ValueHead {
    /// Dimension of the input features.
    type Config = usize;
    type Input = Tensor;
    type Output = Tensor;

    fn build(vb: VarBuilder, feature_dim: usize) -> Result<Self> {
        Ok(Self {
            fc: linear(feature_dim, 1, vb.pp("v"))?,
        })
    }

    fn forward(&self, features: &Tensor) -> Result<Tensor> {
        Ok(self.fc.forward(features)?.squeeze(D::Minus1)?)
    }
}
