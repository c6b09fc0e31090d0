//! Trajectory store.
use crate::error::ImpalaError;

/// One rollout of an agent in an environment.
///
/// A trajectory of length `T` holds `T + 1` observations and `T` of each of
/// actions, rewards, behavior log-probabilities and termination flags.
/// The extra observation is the last observation, used only for bootstrapping
/// the value of the state following the last action.
///
/// A terminal step can only be the last step of a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory<O, A> {
    observations: Vec<O>,
    actions: Vec<A>,
    rewards: Vec<f32>,
    behavior_logprobs: Vec<f32>,
    dones: Vec<bool>,
}

impl<O, A> Trajectory<O, A> {
    /// Starts a trajectory from the initial observation.
    pub fn new(initial_obs: O) -> Self {
        Self {
            observations: vec![initial_obs],
            actions: vec![],
            rewards: vec![],
            behavior_logprobs: vec![],
            dones: vec![],
        }
    }

    /// Builds a trajectory from complete sequences.
    ///
    /// Fails if `observations.len() != actions.len() + 1`, if the per-step
    /// sequences differ in length, or if a terminal flag is set before the
    /// last step.
    pub fn from_parts(
        observations: Vec<O>,
        actions: Vec<A>,
        rewards: Vec<f32>,
        behavior_logprobs: Vec<f32>,
        dones: Vec<bool>,
    ) -> Result<Self, ImpalaError> {
        let t = actions.len();
        ImpalaError::check_len("observations", t + 1, observations.len())?;
        ImpalaError::check_len("rewards", t, rewards.len())?;
        ImpalaError::check_len("behavior_logprobs", t, behavior_logprobs.len())?;
        ImpalaError::check_len("dones", t, dones.len())?;
        if t > 1 && dones[..t - 1].iter().any(|d| *d) {
            return Err(ImpalaError::TrajectoryClosed);
        }

        Ok(Self {
            observations,
            actions,
            rewards,
            behavior_logprobs,
            dones,
        })
    }

    /// Appends one environment step.
    ///
    /// `next_obs` becomes the new last observation.
    pub fn push(
        &mut self,
        action: A,
        behavior_logprob: f32,
        reward: f32,
        next_obs: O,
        is_terminated: bool,
    ) -> Result<(), ImpalaError> {
        if self.reach_terminal() {
            return Err(ImpalaError::TrajectoryClosed);
        }
        self.actions.push(action);
        self.behavior_logprobs.push(behavior_logprob);
        self.rewards.push(reward);
        self.dones.push(is_terminated);
        self.observations.push(next_obs);
        Ok(())
    }

    /// The number of action steps `T`.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if no step has been pushed.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// All `T + 1` observations.
    pub fn observations(&self) -> &[O] {
        &self.observations
    }

    /// The first `T` observations, those at which actions were taken.
    pub fn non_final_observations(&self) -> &[O] {
        &self.observations[..self.len()]
    }

    /// The observation following the last action.
    pub fn last_observation(&self) -> &O {
        // `observations` is never empty by construction.
        &self.observations[self.len()]
    }

    /// Actions taken at each step.
    pub fn actions(&self) -> &[A] {
        &self.actions
    }

    /// Rewards received at each step.
    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    /// Log-probabilities of the actions under the policy that collected them.
    pub fn behavior_logprobs(&self) -> &[f32] {
        &self.behavior_logprobs
    }

    /// Termination flags, `true` only at a terminal last step.
    pub fn dones(&self) -> &[bool] {
        &self.dones
    }

    /// Returns `true` if the last step terminated the episode.
    pub fn reach_terminal(&self) -> bool {
        self.dones.last().copied().unwrap_or(false)
    }

    /// Undiscounted sum of rewards.
    pub fn total_reward(&self) -> f32 {
        self.rewards.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step() -> Trajectory<u8, u8> {
        let mut traj = Trajectory::new(0u8);
        traj.push(10, -0.5, 1.0, 1, false).unwrap();
        traj.push(11, -0.7, 2.0, 2, true).unwrap();
        traj
    }

    #[test]
    fn test_push_keeps_extra_observation() {
        let traj = two_step();
        assert_eq!(traj.len(), 2);
        assert_eq!(traj.observations().len(), traj.actions().len() + 1);
        assert_eq!(traj.non_final_observations(), &[0u8, 1][..]);
        assert_eq!(*traj.last_observation(), 2);
        assert!(traj.reach_terminal());
        assert_eq!(traj.total_reward(), 3.0);
    }

    #[test]
    fn test_push_after_terminal_fails() {
        let mut traj = two_step();
        assert_eq!(
            traj.push(12, 0.0, 0.0, 3, false),
            Err(ImpalaError::TrajectoryClosed)
        );
        assert_eq!(traj.len(), 2);
    }

    #[test]
    fn test_from_parts_rejects_mismatched_lengths() {
        let res = Trajectory::<u8, u8>::from_parts(
            vec![0, 1, 2],
            vec![0, 1],
            vec![1.0],
            vec![0.0, 0.0],
            vec![false, false],
        );
        assert_eq!(
            res,
            Err(ImpalaError::ShapeMismatch {
                what: "rewards".to_string(),
                expected: 2,
                actual: 1
            })
        );

        let res = Trajectory::<u8, u8>::from_parts(
            vec![0, 1],
            vec![0, 1],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![false, false],
        );
        assert!(matches!(res, Err(ImpalaError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_from_parts_rejects_inner_terminal() {
        let res = Trajectory::<u8, u8>::from_parts(
            vec![0, 1, 2],
            vec![0, 1],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![true, false],
        );
        assert_eq!(res, Err(ImpalaError::TrajectoryClosed));
    }
}
