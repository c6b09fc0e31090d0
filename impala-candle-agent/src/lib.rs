//! IMPALA agent implemented with [candle](https://crates.io/crates/candle-core).
//!
//! The agent learns from batches of [`Trajectory`](impala_core::Trajectory)
//! collected by possibly stale copies of its policy, correcting for the lag
//! with V-trace. See [`Impala`].
mod action;
pub mod heads;
pub mod impala;
pub mod init;
pub mod mlp;
pub mod model;
pub mod opt;
mod param_store;
pub mod util;
pub use action::{Action, ActionSpace};
pub use impala::{ActionOutput, Impala, ImpalaConfig, LearnReport};
pub use param_store::ParamStore;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The GPU device with the given ordinal.
    Cuda(usize),
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
        }
    }
}
