//! Actions and action spaces.
use anyhow::{bail, Result};
use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

/// Action space of an environment.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub enum ActionSpace {
    /// `n` discrete actions.
    Discrete(usize),

    /// Real vectors of the given dimension.
    Continuous(usize),
}

impl Default for ActionSpace {
    fn default() -> Self {
        Self::Discrete(2)
    }
}

/// An action of the agent.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub enum Action {
    /// Index of a discrete action.
    Discrete(u32),

    /// Continuous action vector.
    Continuous(Vec<f32>),
}

impl ActionSpace {
    /// Converts actions to a tensor, `[N]` of `u32` or `[N, dim]` of `f32`.
    ///
    /// Fails on actions outside the space.
    pub fn actions_to_tensor(&self, actions: &[&Action], device: &Device) -> Result<Tensor> {
        let n = actions.len();
        match self {
            Self::Discrete(n_actions) => {
                let mut data = Vec::with_capacity(n);
                for a in actions.iter() {
                    match a {
                        Action::Discrete(ix) if (*ix as usize) < *n_actions => data.push(*ix),
                        _ => bail!("Action {:?} is not in {:?}", a, self),
                    }
                }
                Ok(Tensor::from_vec(data, (n,), device)?)
            }
            Self::Continuous(dim) => {
                let mut data = Vec::with_capacity(n * dim);
                for a in actions.iter() {
                    match a {
                        Action::Continuous(v) if v.len() == *dim => data.extend_from_slice(v),
                        _ => bail!("Action {:?} is not in {:?}", a, self),
                    }
                }
                Ok(Tensor::from_vec(data, (n, *dim), device)?)
            }
        }
    }

    /// Converts a tensor of actions back to [`Action`]s.
    pub fn tensor_to_actions(&self, t: &Tensor) -> Result<Vec<Action>> {
        Ok(match self {
            Self::Discrete(_) => t
                .to_vec1::<u32>()?
                .into_iter()
                .map(Action::Discrete)
                .collect(),
            Self::Continuous(_) => t
                .to_vec2::<f32>()?
                .into_iter()
                .map(Action::Continuous)
                .collect(),
        })
    }
}
