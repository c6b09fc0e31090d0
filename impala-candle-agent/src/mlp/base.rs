use super::FeatureMlpConfig;
use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::{layer_norm, linear, LayerNorm, Linear, Module, VarBuilder};
use log::trace;

/// Returns pairs of a linear layer and the layer normalization following it.
fn create_layers(prefix: &str, vb: VarBuilder, config: &FeatureMlpConfig) -> Result<Vec<(Linear, LayerNorm)>> {
    let vb = vb.pp(prefix);
    let mut in_dim = config.in_dim;
    let mut layers = Vec::with_capacity(config.units.len());

    for (i, &out_dim) in config.units.iter().enumerate() {
        let fc = linear(in_dim, out_dim, vb.pp(format!("ln{}", i)))?;
        let norm = layer_norm(out_dim, 1e-5, vb.pp(format!("norm{}", i)))?;
        layers.push((fc, norm));
        in_dim = out_dim;
    }

    Ok(layers)
}

/// Feature network, a stack of `Linear -> ReLU -> LayerNorm` blocks.
pub struct FeatureMlp {
    config: FeatureMlpConfig,
    device: Device,
    layers: Vec<(Linear, LayerNorm)>,
}

impl FeatureMlp {
    /// Dimension of the output features.
    pub fn out_dim(&self) -> usize {
        self.config.out_dim()
    }
}

impl SubModel1 for FeatureMlp {
    type Config = FeatureMlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        trace!("FeatureMlp input: {:?}", xs.dims());
        let mut xs = xs.to_device(&self.device)?;
        for (fc, norm) in self.layers.iter() {
            xs = norm.forward(&fc.forward(&xs)?.relu()?)?;
        }
        Ok(xs)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vb.device().clone();
        let layers = create_layers("feature", vb, &config)?;

        Ok(Self {
            config,
            device,
            layers,
        })
    }
}
