//! Running moments of observations.
use crate::error::ImpalaError;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Per-dimension running mean and variance.
///
/// Batches are merged with the parallel algorithm of Chan et al., so the
/// result does not depend on how samples are split into batches.
/// The moments are what an agent needs, together with its parameters, to
/// reproduce its behavior on standardized observations.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RunningMeanVar {
    /// Number of samples seen.
    pub count: f64,

    /// Running mean.
    pub mean: Vec<f64>,

    /// Running population variance.
    pub var: Vec<f64>,
}

impl RunningMeanVar {
    /// Moments of `dim`-dimensional samples, before any sample is seen.
    pub fn new(dim: usize) -> Self {
        Self {
            count: 0.0,
            mean: vec![0.0; dim],
            var: vec![1.0; dim],
        }
    }

    /// Dimension of samples.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Merges a batch of samples.
    pub fn update(&mut self, xs: &[Vec<f32>]) -> Result<(), ImpalaError> {
        if xs.is_empty() {
            return Ok(());
        }
        let dim = self.dim();
        for x in xs.iter() {
            ImpalaError::check_len("observation", dim, x.len())?;
        }

        let n_b = xs.len() as f64;
        let mut mean_b = vec![0f64; dim];
        for x in xs.iter() {
            for (m, v) in mean_b.iter_mut().zip(x) {
                *m += *v as f64 / n_b;
            }
        }
        let mut var_b = vec![0f64; dim];
        for x in xs.iter() {
            for ((s, v), m) in var_b.iter_mut().zip(x).zip(&mean_b) {
                *s += (*v as f64 - m).powi(2) / n_b;
            }
        }

        let n_a = self.count;
        let n = n_a + n_b;
        for i in 0..dim {
            let delta = mean_b[i] - self.mean[i];
            let m2 = if n_a == 0.0 {
                var_b[i] * n_b
            } else {
                self.var[i] * n_a + var_b[i] * n_b + delta.powi(2) * n_a * n_b / n
            };
            self.mean[i] += delta * n_b / n;
            self.var[i] = m2 / n;
        }
        self.count = n;

        Ok(())
    }

    /// Returns `(x - mean) / sqrt(var + 1e-8)` clipped to `[-clip, clip]`.
    pub fn normalize(&self, x: &[f32], clip: f32) -> Result<Vec<f32>, ImpalaError> {
        ImpalaError::check_len("observation", self.dim(), x.len())?;
        Ok(x.iter()
            .zip(self.mean.iter().zip(&self.var))
            .map(|(v, (m, s))| {
                let z = (*v as f64 - m) / (s + 1e-8).sqrt();
                (z as f32).max(-clip).min(clip)
            })
            .collect())
    }

    /// Loads the moments from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let moments = serde_yaml::from_reader(rdr)?;
        info!("Load observation moments from {:?}", path);
        Ok(moments)
    }

    /// Saves the moments to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save observation moments to {:?}", path);
        Ok(())
    }
}
