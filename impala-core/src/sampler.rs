//! Collection of trajectories from an environment.
use crate::{error::ImpalaError, Env, Policy, Trajectory, TrajectoryBatch};
use anyhow::Result;
use log::trace;

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Collects fixed-horizon trajectories from an environment.
///
/// The sampler keeps the current observation between calls, so consecutive
/// trajectories continue the same episode until it ends:
///
/// ```mermaid
/// graph LR
///     Env --> Obs
///     Obs --> Policy
///     Policy --> Act
///     Act --> Env
///     Obs --> Trajectory
///     Act --> Trajectory
/// ```
///
/// A trajectory stops after `horizon` steps or at the end of an episode.
/// Termination sets the last `done` flag. Truncation does not, so the
/// learner bootstraps from the last observation. In both cases the
/// environment is reset before the next trajectory.
pub struct RolloutSampler<E: Env> {
    env: E,
    horizon: usize,
    prev_obs: Option<E::Obs>,
    episode_return: f32,
    episode_returns: Vec<f32>,
    total_steps: usize,
}

impl<E: Env> RolloutSampler<E> {
    /// Creates a sampler collecting at most `horizon` steps per trajectory.
    pub fn new(env: E, horizon: usize) -> Result<Self> {
        if horizon == 0 {
            return Err(ImpalaError::InvalidConfig("horizon must be positive".to_string()).into());
        }
        Ok(Self {
            env,
            horizon,
            prev_obs: None,
            episode_return: 0.0,
            episode_returns: vec![],
            total_steps: 0,
        })
    }

    /// Collects one trajectory with `policy`.
    pub fn sample<P>(&mut self, policy: &mut P) -> Result<Trajectory<E::Obs, E::Act>>
    where
        P: Policy<E::Obs, E::Act>,
    {
        let obs = match self.prev_obs.take() {
            Some(obs) => obs,
            None => {
                self.episode_return = 0.0;
                self.env.reset()?
            }
        };

        let mut traj = Trajectory::new(obs.clone());
        let mut obs = obs;
        for _ in 0..self.horizon {
            let (act, logp) = policy.act(&obs)?;
            let step = self.env.step(&act)?;
            let is_done = step.is_done();
            self.episode_return += step.reward;
            self.total_steps += 1;
            traj.push(act, logp, step.reward, step.obs.clone(), step.is_terminated)?;
            obs = step.obs;

            if is_done {
                trace!("Episode ends with return {}", self.episode_return);
                self.episode_returns.push(self.episode_return);
                return Ok(traj);
            }
        }

        self.prev_obs = Some(obs);
        Ok(traj)
    }

    /// Collects `n` trajectories into a batch.
    pub fn sample_batch<P>(&mut self, policy: &mut P, n: usize) -> Result<TrajectoryBatch<E::Obs, E::Act>>
    where
        P: Policy<E::Obs, E::Act>,
    {
        let trajs = (0..n)
            .map(|_| self.sample(policy))
            .collect::<Result<Vec<_>>>()?;
        Ok(TrajectoryBatch::new(trajs)?)
    }

    /// Returns and clears the returns of episodes completed so far.
    pub fn take_episode_returns(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.episode_returns)
    }

    /// Number of environment steps taken.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Returns a reference to the environment.
    pub fn env(&self) -> &E {
        &self.env
    }
}
