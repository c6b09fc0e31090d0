//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, DType, Tensor, Var};
use impala_core::record::{Record, RecordValue};
use log::trace;

/// Rescales gradients in place so that their global L2 norm is at most `max_norm`.
///
/// Returns the global norm before rescaling. Variables without a gradient are
/// skipped.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> Result<f32> {
    let mut sq_norm = 0f64;
    for var in vars.iter() {
        if let Some(g) = grads.get(var.as_tensor()) {
            sq_norm += g
                .sqr()?
                .sum_all()?
                .to_dtype(DType::F64)?
                .to_scalar::<f64>()?;
        }
    }
    let norm = sq_norm.sqrt();
    trace!("Gradient norm: {}", norm);

    if norm > max_norm {
        let scale = max_norm / (norm + 1e-6);
        for var in vars.iter() {
            if let Some(g) = grads.remove(var.as_tensor()) {
                grads.insert(var.as_tensor(), (g * scale)?);
            }
        }
    }

    Ok(norm as f32)
}

/// Returns the standard deviation of a tensor.
pub fn std(t: &Tensor) -> Result<f32> {
    Ok(t.broadcast_sub(&t.mean_all()?)?
        .powf(2f64)?
        .mean_all()?
        .sqrt()?
        .to_dtype(DType::F32)?
        .to_scalar::<f32>()?)
}

/// Returns the mean and standard deviation of the parameters.
pub fn param_stats(named_vars: &[(String, Var)]) -> Result<Record> {
    let mut record = Record::empty();

    for (k, v) in named_vars.iter() {
        let m: f32 = v.mean_all()?.to_dtype(DType::F32)?.to_scalar()?;
        record.insert(format!("{}_mean", &k), RecordValue::Scalar(m));

        let s: f32 = std(v.as_tensor())?;
        record.insert(format!("{}_std", &k), RecordValue::Scalar(s));
    }

    Ok(record)
}

/// Stacks rows of equal width into a `[rows.len(), width]` tensor.
pub fn rows_to_tensor(rows: &[&Vec<f32>], width: usize, device: &candle_core::Device) -> Result<Tensor> {
    let mut data = Vec::with_capacity(rows.len() * width);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(anyhow!(
                "Row {} has width {}, expected {}",
                i,
                row.len(),
                width
            ));
        }
        data.extend_from_slice(row);
    }
    Ok(Tensor::from_vec(data, (rows.len(), width), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_clip_grad_norm() -> Result<()> {
        let w = Var::new(&[1f32, 2.0], &Device::Cpu)?;
        let b = Var::new(&[0f32], &Device::Cpu)?;
        let vars = vec![w.clone(), b.clone()];

        // d/dw sum(3w) = 3, d/db sum(4b) = 4, norm = sqrt(9 + 9 + 16) = sqrt(34)
        let loss = ((w.as_tensor() * 3.0)?.sum_all()? + (b.as_tensor() * 4.0)?.sum_all()?)?;
        let mut grads = loss.backward()?;
        let norm = clip_grad_norm(&mut grads, &vars, 1.0)?;
        assert!((norm - 34f32.sqrt()).abs() < 1e-5);

        let mut sq = 0f32;
        for var in vars.iter() {
            let g = grads.get(var.as_tensor()).unwrap();
            sq += g.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
        assert!((sq.sqrt() - 1.0).abs() < 1e-4);

        // Small gradients are left untouched.
        let loss = (w.as_tensor() * 0.1)?.sum_all()?;
        let mut grads = loss.backward()?;
        let norm = clip_grad_norm(&mut grads, &vars, 1.0)?;
        assert!(norm < 1.0);
        let g: Vec<f32> = grads.get(w.as_tensor()).unwrap().to_vec1()?;
        assert!((g[0] - 0.1).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_rows_to_tensor() -> Result<()> {
        let a = vec![1f32, 2.0];
        let b = vec![3f32, 4.0];
        let t = rows_to_tensor(&[&a, &b], 2, &Device::Cpu)?;
        assert_eq!(t.dims(), &[2, 2]);
        assert_eq!(t.to_vec2::<f32>()?, vec![a.clone(), b]);

        let c = vec![1f32];
        assert!(rows_to_tensor(&[&a, &c], 2, &Device::Cpu).is_err());
        Ok(())
    }
}
