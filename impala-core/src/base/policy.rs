//! Policy.
use anyhow::Result;

/// A stochastic policy that collects trajectories.
///
/// The returned log-probability of the sampled action is stored in the
/// trajectory as the behavior log-probability, which the learner compares
/// against its own, possibly newer, policy.
pub trait Policy<O, A> {
    /// Samples an action given an observation, with its log-probability.
    fn act(&mut self, obs: &O) -> Result<(A, f32)>;
}
