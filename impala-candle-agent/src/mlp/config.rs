use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`FeatureMlp`](super::FeatureMlp).
pub struct FeatureMlpConfig {
    /// Dimension of observations.
    pub in_dim: usize,

    /// Output sizes of the hidden layers.
    pub units: Vec<usize>,
}

impl FeatureMlpConfig {
    /// Creates configuration of the feature network.
    pub fn new(in_dim: usize, units: Vec<usize>) -> Self {
        Self { in_dim, units }
    }

    /// Dimension of the features, `in_dim` if there is no hidden layer.
    pub fn out_dim(&self) -> usize {
        self.units.last().copied().unwrap_or(self.in_dim)
    }
}

impl Default for FeatureMlpConfig {
    fn default() -> Self {
        Self {
            in_dim: 1,
            units: vec![64, 64],
        }
    }
}
