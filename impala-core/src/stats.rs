//! Summary statistics used in learning steps and reports.
use serde::{Deserialize, Serialize};
use std::fmt;

fn mean(x: &[f32]) -> f32 {
    x.iter().sum::<f32>() / x.len() as f32
}

/// Population variance.
fn variance(x: &[f32]) -> f32 {
    let m = mean(x);
    x.iter().map(|v| (v - m).powi(2)).sum::<f32>() / x.len() as f32
}

/// Unbiased standard deviation, `0` when `x.len() < 2`.
pub fn unbiased_std(x: &[f32]) -> f32 {
    let n = x.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(x);
    let ss = x.iter().map(|v| (v - m).powi(2)).sum::<f32>();
    (ss / (n - 1) as f32).sqrt()
}

/// Fraction of the variance of `y_true` explained by `y_pred`.
///
/// Computes `1 - Var(y_true - y_pred) / Var(y_true)`, clamped below at `-1`.
/// If `y_true` is constant, returns `1` for a perfect prediction and `0`
/// otherwise. Returns `NaN` for empty or mismatched inputs.
pub fn explained_variance(y_true: &[f32], y_pred: &[f32]) -> f32 {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return f32::NAN;
    }
    let residual: Vec<f32> = y_true.iter().zip(y_pred).map(|(y, p)| y - p).collect();
    let var_y = variance(y_true);
    let var_res = variance(&residual);

    if var_y == 0.0 {
        if var_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        (1.0 - var_res / var_y).max(-1.0)
    }
}

/// Mean, standard deviation, min and max of a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Describe {
    /// Number of samples.
    pub n: usize,

    /// Mean.
    pub mean: f32,

    /// Unbiased standard deviation.
    pub std: f32,

    /// Minimum.
    pub min: f32,

    /// Maximum.
    pub max: f32,
}

impl fmt::Display for Describe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4} ± {:.4} | min: {:.4}, max: {:.4}, n: {}",
            self.mean, self.std, self.min, self.max, self.n
        )
    }
}

/// Summarizes a sample, `None` if it is empty.
pub fn describe(x: &[f32]) -> Option<Describe> {
    if x.is_empty() {
        return None;
    }
    let min = x.iter().copied().fold(f32::INFINITY, f32::min);
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    Some(Describe {
        n: x.len(),
        mean: mean(x),
        std: unbiased_std(x),
        min,
        max,
    })
}

/// Returns `(x - mean) / (std + eps)` with the unbiased standard deviation.
pub fn standardize(x: &[f32], eps: f32) -> Vec<f32> {
    if x.is_empty() {
        return vec![];
    }
    let m = mean(x);
    let s = unbiased_std(x);
    x.iter().map(|v| (v - m) / (s + eps)).collect()
}
