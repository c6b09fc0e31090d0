//! Orthogonal initialization of linear layers.
use anyhow::{bail, Result};
use candle_core::{Tensor, Var};
use rand::Rng;
use rand_distr::StandardNormal;

/// Gain for layers followed by ReLU.
pub const RELU_GAIN: f64 = std::f64::consts::SQRT_2;

/// Returns a `rows x cols` matrix in row-major order scaled by `gain`.
///
/// Rows are orthonormal if `rows <= cols`, columns otherwise. Vectors drawn
/// from a standard normal distribution are orthogonalized with the
/// Gram-Schmidt process.
pub fn orthogonal(rows: usize, cols: usize, gain: f64, rng: &mut impl Rng) -> Vec<f32> {
    let (k, len) = if rows >= cols { (cols, rows) } else { (rows, cols) };
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(k);

    while basis.len() < k {
        let mut v: Vec<f64> = (0..len).map(|_| rng.sample(StandardNormal)).collect();
        for u in basis.iter() {
            let dot: f64 = v.iter().zip(u).map(|(a, b)| a * b).sum();
            v.iter_mut().zip(u).for_each(|(a, b)| *a -= dot * b);
        }
        let norm = v.iter().map(|a| a * a).sum::<f64>().sqrt();
        // Linearly dependent draws are discarded.
        if norm > 1e-10 {
            basis.push(v.into_iter().map(|a| a / norm).collect());
        }
    }

    let mut w = vec![0f32; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            let x = if rows >= cols { basis[c][r] } else { basis[r][c] };
            w[r * cols + c] = (gain * x) as f32;
        }
    }
    w
}

/// Overwrites the weight `[out_dim, in_dim]` of a linear layer with an
/// orthogonal matrix scaled by `gain`.
pub fn ortho_init(weight: &Var, gain: f64, rng: &mut impl Rng) -> Result<()> {
    let (rows, cols) = match weight.dims() {
        &[rows, cols] => (rows, cols),
        dims => bail!("Orthogonal initialization needs a matrix, got shape {:?}", dims),
    };
    let w = Tensor::from_vec(orthogonal(rows, cols, gain, rng), (rows, cols), weight.device())?
        .to_dtype(weight.dtype())?;
    weight.set(&w)?;
    Ok(())
}

/// Sets all elements of `var` to `value`.
pub fn constant_init(var: &Var, value: f64) -> Result<()> {
    let t = (var.zeros_like()? + value)?;
    var.set(&t)?;
    Ok(())
}
