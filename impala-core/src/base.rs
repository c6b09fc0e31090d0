//! Interfaces between environments, policies and trajectories.
mod env;
mod policy;
mod step;
pub use env::Env;
pub use policy::Policy;
pub use step::Step;
