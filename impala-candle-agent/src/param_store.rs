//! Named parameters and buffers of the agent.
use anyhow::{anyhow, bail, Result};
use candle_core::{safetensors, DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use log::{info, trace};
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

/// Owns all trainable variables of a model and its non-trainable buffers.
///
/// Submodels create their variables through [`ParamStore::vb`]. Variables
/// are listed in the order of their names, so the optimizer and gradient
/// clipping see the same order on every run.
///
/// Buffers hold state which is saved with the parameters but is not
/// optimized, such as the count of environment steps.
pub struct ParamStore {
    varmap: VarMap,
    buffers: BTreeMap<String, Tensor>,
    device: Device,
}

impl ParamStore {
    /// Creates an empty store on `device`.
    pub fn new(device: Device) -> Self {
        Self {
            varmap: VarMap::new(),
            buffers: BTreeMap::new(),
            device,
        }
    }

    /// Returns a [`VarBuilder`] creating `f32` variables in this store.
    pub fn vb(&self) -> VarBuilder<'_> {
        VarBuilder::from_varmap(&self.varmap, DType::F32, &self.device)
    }

    /// Device of the variables.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Variables with their names, sorted by name.
    pub fn named_vars(&self) -> Result<Vec<(String, Var)>> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| anyhow!("Variable map is poisoned"))?;
        let mut vars: Vec<(String, Var)> = data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(vars)
    }

    /// Variables sorted by name.
    pub fn all_vars(&self) -> Result<Vec<Var>> {
        Ok(self.named_vars()?.into_iter().map(|(_, v)| v).collect())
    }

    /// Total number of scalar parameters.
    pub fn num_params(&self) -> Result<usize> {
        Ok(self.named_vars()?.iter().map(|(_, v)| v.elem_count()).sum())
    }

    /// Sets a buffer, replacing any previous value.
    ///
    /// Fails if `name` is taken by a variable.
    pub fn set_buffer(&mut self, name: &str, value: Tensor) -> Result<()> {
        if self.named_vars()?.iter().any(|(k, _)| k == name) {
            bail!("{} is the name of a variable", name);
        }
        self.buffers.insert(name.to_string(), value.to_device(&self.device)?);
        Ok(())
    }

    /// Returns a buffer.
    pub fn buffer(&self, name: &str) -> Option<&Tensor> {
        self.buffers.get(name)
    }

    /// Saves all variables and buffers in a safetensors file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut tensors: HashMap<String, Tensor> = HashMap::new();
        for (k, v) in self.named_vars()?.into_iter() {
            tensors.insert(k, v.as_tensor().clone());
        }
        for (k, v) in self.buffers.iter() {
            tensors.insert(k.clone(), v.clone());
        }
        safetensors::save(&tensors, path)?;
        info!("Save parameters to {:?}", path);
        Ok(())
    }

    /// Loads variables and buffers by name from a safetensors file.
    ///
    /// Every variable and buffer of the store must be present in the file
    /// with the same shape. Entries of the file unknown to the store are
    /// ignored.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tensors = safetensors::load(path, &self.device)?;

        // Check everything before modifying anything.
        let vars = self.named_vars()?;
        for (k, v) in vars.iter() {
            check_entry(&tensors, k, v.dims())?;
        }
        for (k, v) in self.buffers.iter() {
            check_entry(&tensors, k, v.dims())?;
        }

        for (k, v) in vars.iter() {
            let t = tensors[k].to_dtype(v.dtype())?;
            trace!("Load {} {:?}", k, t.dims());
            v.set(&t)?;
        }
        let names: Vec<String> = self.buffers.keys().cloned().collect();
        for k in names {
            let dtype = self.buffers[&k].dtype();
            self.buffers.insert(k.clone(), tensors[&k].to_dtype(dtype)?);
        }

        info!("Load parameters from {:?}", path);
        Ok(())
    }
}

fn check_entry(tensors: &HashMap<String, Tensor>, name: &str, dims: &[usize]) -> Result<()> {
    match tensors.get(name) {
        None => bail!("{} is missing in the checkpoint", name),
        Some(t) if t.dims() != dims => bail!(
            "Shape mismatch of {}: expected {:?}, got {:?}",
            name,
            dims,
            t.dims()
        ),
        Some(_) => Ok(()),
    }
}
