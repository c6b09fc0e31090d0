//! V-trace off-policy correction.
//!
//! Given a trajectory collected by a behavior policy μ and evaluated by the
//! current target policy π, V-trace computes value targets `vs` and
//! policy-gradient advantages with truncated importance weights:
//!
//! * `ratio_t = π(a_t|s_t) / μ(a_t|s_t)`
//! * `ρ_t = min(ratio_t, clip_rho)` weights the temporal difference.
//! * `c_t = min(ratio_t, clip_pg_rho)` weights the trace and the advantage.
//!
//! The targets follow the backward recursion
//!
//! ```text
//! δ_t  = ρ_t (r_t + γ (1 - d_t) V(s_t+1) - V(s_t))
//! vs_t = V(s_t) + δ_t + γ c_t (1 - d_t) (vs_t+1 - V(s_t+1))
//! A_t  = c_t (r_t + γ (1 - d_t) vs_t+1 - V(s_t))
//! ```
//!
//! with `V(s_T) = vs_T = V_last`, the bootstrap value.
//!
//! See Espeholt et al., "IMPALA: Scalable Distributed Deep-RL with Importance
//! Weighted Actor-Learner Architectures" (2018).
use crate::error::ImpalaError;
use serde::{Deserialize, Serialize};

/// Parameters of V-trace.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct VtraceConfig {
    /// Discount factor.
    pub gamma: f32,

    /// Truncation threshold of importance weights on the temporal difference.
    pub clip_rho: f32,

    /// Truncation threshold of importance weights on the trace and the advantage.
    pub clip_pg_rho: f32,
}

impl Default for VtraceConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            clip_rho: 1.0,
            clip_pg_rho: 1.0,
        }
    }
}

impl VtraceConfig {
    /// Sets the discount factor.
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the clipping threshold on the temporal difference.
    pub fn clip_rho(mut self, v: f32) -> Self {
        self.clip_rho = v;
        self
    }

    /// Sets the clipping threshold on the trace and the advantage.
    pub fn clip_pg_rho(mut self, v: f32) -> Self {
        self.clip_pg_rho = v;
        self
    }

    /// Checks `0 <= gamma <= 1` and positive clipping thresholds.
    pub fn validate(&self) -> Result<(), ImpalaError> {
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(ImpalaError::InvalidConfig(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        if !(self.clip_rho > 0.0) {
            return Err(ImpalaError::InvalidConfig(format!(
                "clip_rho must be positive, got {}",
                self.clip_rho
            )));
        }
        if !(self.clip_pg_rho > 0.0) {
            return Err(ImpalaError::InvalidConfig(format!(
                "clip_pg_rho must be positive, got {}",
                self.clip_pg_rho
            )));
        }
        Ok(())
    }
}

/// Per-step quantities of one trajectory, all of length `T`.
#[derive(Debug, Clone, Copy)]
pub struct VtraceInput<'a> {
    /// Log-probabilities of the actions under the behavior policy.
    pub behavior_logprobs: &'a [f32],

    /// Log-probabilities of the actions under the target policy.
    pub target_logprobs: &'a [f32],

    /// Rewards.
    pub rewards: &'a [f32],

    /// Value estimates of the observations at which actions were taken.
    pub values: &'a [f32],

    /// Value estimate of the last observation.
    pub last_value: f32,

    /// Termination flags.
    pub dones: &'a [bool],
}

impl<'a> VtraceInput<'a> {
    /// Returns `T` if all sequences have the same non-zero length.
    pub fn check_shapes(&self) -> Result<usize, ImpalaError> {
        let t = self.rewards.len();
        if t == 0 {
            return Err(ImpalaError::EmptyTrajectory);
        }
        ImpalaError::check_len("behavior_logprobs", t, self.behavior_logprobs.len())?;
        ImpalaError::check_len("target_logprobs", t, self.target_logprobs.len())?;
        ImpalaError::check_len("values", t, self.values.len())?;
        ImpalaError::check_len("dones", t, self.dones.len())?;
        Ok(t)
    }
}

/// Output of V-trace, aligned with the actions of the trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct VtraceOutput {
    /// Value targets.
    pub vs: Vec<f32>,

    /// Advantages weighting the policy gradient.
    pub advantages: Vec<f32>,

    /// Importance weights clipped at `clip_rho`.
    pub rhos: Vec<f32>,

    /// Importance weights clipped at `clip_pg_rho`.
    pub cs: Vec<f32>,
}

/// Computes V-trace targets and advantages of one trajectory.
///
/// Fails fast on sequences of different lengths; nothing is truncated or padded.
pub fn vtrace(config: &VtraceConfig, input: &VtraceInput) -> Result<VtraceOutput, ImpalaError> {
    let t_max = input.check_shapes()?;
    let gamma = config.gamma;

    let ratios: Vec<f32> = input
        .target_logprobs
        .iter()
        .zip(input.behavior_logprobs)
        .map(|(pi, mu)| (pi - mu).exp())
        .collect();
    let rhos: Vec<f32> = ratios.iter().map(|r| r.min(config.clip_rho)).collect();
    let cs: Vec<f32> = ratios.iter().map(|r| r.min(config.clip_pg_rho)).collect();

    let mut vs = vec![0f32; t_max];
    let mut advantages = vec![0f32; t_max];

    // vs and V of the step following t
    let mut vs_next = input.last_value;
    let mut value_next = input.last_value;

    for t in (0..t_max).rev() {
        let not_done = if input.dones[t] { 0f32 } else { 1f32 };
        let r = input.rewards[t];
        let v = input.values[t];

        let delta = rhos[t] * (r + gamma * value_next * not_done - v);
        vs[t] = v + delta + gamma * cs[t] * not_done * (vs_next - value_next);
        advantages[t] = cs[t] * (r + gamma * not_done * vs_next - v);

        vs_next = vs[t];
        value_next = v;
    }

    Ok(VtraceOutput {
        vs,
        advantages,
        rhos,
        cs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f32 = 1e-5;

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < TOL, "{:?} != {:?}", a, b);
        }
    }

    /// Discounted returns bootstrapped from `last_value`, cut at terminal steps.
    fn bootstrapped_returns(gamma: f32, rewards: &[f32], dones: &[bool], last_value: f32) -> Vec<f32> {
        let mut out = vec![0f32; rewards.len()];
        let mut g = last_value;
        for t in (0..rewards.len()).rev() {
            let not_done = if dones[t] { 0f32 } else { 1f32 };
            g = rewards[t] + gamma * not_done * g;
            out[t] = g;
        }
        out
    }

    #[test]
    fn test_two_step_scenario() {
        let config = VtraceConfig::default().gamma(0.99);
        let input = VtraceInput {
            behavior_logprobs: &[0.0, 0.0],
            target_logprobs: &[0.0, 0.0],
            rewards: &[1.0, 1.0],
            values: &[0.5, 0.5],
            last_value: 0.0,
            dones: &[false, true],
        };
        let out = vtrace(&config, &input).unwrap();
        assert_close(&out.vs, &[1.99, 1.0]);
        assert_close(&out.advantages, &[1.49, 0.5]);
        assert_close(&out.rhos, &[1.0, 1.0]);
    }

    #[test]
    fn test_on_policy_reduces_to_bootstrapped_return() {
        let config = VtraceConfig::default().gamma(0.9).clip_rho(2.0).clip_pg_rho(1.5);
        let logp = [-0.3f32, -1.2, -0.7, -2.0, -0.1];
        let rewards = [0.5f32, -1.0, 2.0, 0.0, 1.0];
        let values = [0.1f32, 0.4, -0.3, 0.8, 0.2];
        let dones = [false; 5];
        let last_value = 0.7;
        let input = VtraceInput {
            behavior_logprobs: &logp,
            target_logprobs: &logp,
            rewards: &rewards,
            values: &values,
            last_value,
            dones: &dones,
        };
        let out = vtrace(&config, &input).unwrap();
        let returns = bootstrapped_returns(0.9, &rewards, &dones, last_value);
        assert_close(&out.vs, &returns);
        assert_close(&out.rhos, &[1.0; 5]);
        assert_close(&out.cs, &[1.0; 5]);

        // Advantage is the one-step residual against the next target.
        let expected_adv: Vec<f32> = (0..5)
            .map(|t| {
                let next = if t + 1 < 5 { returns[t + 1] } else { last_value };
                rewards[t] + 0.9 * next - values[t]
            })
            .collect();
        assert_close(&out.advantages, &expected_adv);
    }

    #[test]
    fn test_terminal_step_ignores_everything_after() {
        let config = VtraceConfig::default().gamma(0.95).clip_rho(1.5);
        let mu = [-0.5f32, -0.2, -1.0, -0.3, -0.9];
        let pi = [-0.4f32, -0.6, -0.8, -0.1, -1.5];
        let rewards = [1.0f32, 0.5, -0.5, 3.0, 2.0];
        let values = [0.2f32, 0.1, 0.3, -0.4, 0.9];
        let dones = [false, false, true, false, false];
        let base = VtraceInput {
            behavior_logprobs: &mu,
            target_logprobs: &pi,
            rewards: &rewards,
            values: &values,
            last_value: 1.3,
            dones: &dones,
        };
        let out = vtrace(&config, &base).unwrap();

        // Zero out everything following the terminal index 2.
        let rewards_z = [1.0f32, 0.5, -0.5, 0.0, 0.0];
        let values_z = [0.2f32, 0.1, 0.3, 0.0, 0.0];
        let pi_z = [-0.4f32, -0.6, -0.8, 0.0, 0.0];
        let zeroed = VtraceInput {
            target_logprobs: &pi_z,
            rewards: &rewards_z,
            values: &values_z,
            last_value: 0.0,
            ..base
        };
        let out_z = vtrace(&config, &zeroed).unwrap();

        assert_close(&out.vs[..3], &out_z.vs[..3]);
        assert_close(&out.advantages[..3], &out_z.advantages[..3]);

        // At the terminal step only the immediate reward remains.
        let rho2 = (pi[2] - mu[2]).exp().min(1.5);
        assert!((out.vs[2] - (values[2] + rho2 * (rewards[2] - values[2]))).abs() < TOL);
    }

    #[test]
    fn test_clipping_is_monotone_in_thresholds() {
        let mu = [-1.0f32, -2.0, -0.5, -0.1];
        let pi = [-0.2f32, -0.5, -0.6, -0.05];
        let input = VtraceInput {
            behavior_logprobs: &mu,
            target_logprobs: &pi,
            rewards: &[1.0, 0.0, 1.0, 0.0],
            values: &[0.0, 0.5, 0.2, 0.1],
            last_value: 0.3,
            dones: &[false; 4],
        };
        let mut prev: Option<VtraceOutput> = None;
        for clip in [0.5f32, 1.0, 2.0, 4.0, 100.0].iter() {
            let config = VtraceConfig::default().clip_rho(*clip).clip_pg_rho(*clip);
            let out = vtrace(&config, &input).unwrap();
            if let Some(prev) = prev {
                for t in 0..4 {
                    assert!(out.rhos[t] >= prev.rhos[t]);
                    assert!(out.cs[t] >= prev.cs[t]);
                }
            }
            for t in 0..4 {
                let ratio = (pi[t] - mu[t]).exp();
                assert!(out.rhos[t] <= ratio + TOL);
                assert!(out.rhos[t] <= *clip);
            }
            prev = Some(out);
        }
    }

    #[test]
    fn test_value_and_pg_clips_are_independent() {
        // ratio = e > 1 on both steps.
        let input = VtraceInput {
            behavior_logprobs: &[-1.0, -1.0],
            target_logprobs: &[0.0, 0.0],
            rewards: &[1.0, 1.0],
            values: &[0.0, 0.0],
            last_value: 0.0,
            dones: &[false, true],
        };
        let config = VtraceConfig::default().gamma(1.0).clip_rho(1.0).clip_pg_rho(0.5);
        let out = vtrace(&config, &input).unwrap();
        assert_close(&out.rhos, &[1.0, 1.0]);
        assert_close(&out.cs, &[0.5, 0.5]);
        // vs[1] = 0 + 1 * 1 = 1; vs[0] = 0 + 1 * (1 + 0) + 0.5 * (1 - 0) = 1.5
        assert_close(&out.vs, &[1.5, 1.0]);
        // A[1] = 0.5 * 1; A[0] = 0.5 * (1 + 1) = 1
        assert_close(&out.advantages, &[1.0, 0.5]);
    }

    #[test]
    fn test_shapes() {
        let config = VtraceConfig::default();
        let input = VtraceInput {
            behavior_logprobs: &[0.0; 7],
            target_logprobs: &[0.1; 7],
            rewards: &[1.0; 7],
            values: &[0.0; 7],
            last_value: 0.0,
            dones: &[false; 7],
        };
        let out = vtrace(&config, &input).unwrap();
        assert_eq!(out.vs.len(), 7);
        assert_eq!(out.advantages.len(), 7);

        let bad = VtraceInput {
            values: &[0.0; 6],
            ..input
        };
        assert_eq!(
            vtrace(&config, &bad),
            Err(ImpalaError::ShapeMismatch {
                what: "values".to_string(),
                expected: 7,
                actual: 6
            })
        );

        let empty = VtraceInput {
            behavior_logprobs: &[],
            target_logprobs: &[],
            rewards: &[],
            values: &[],
            last_value: 0.0,
            dones: &[],
        };
        assert_eq!(vtrace(&config, &empty), Err(ImpalaError::EmptyTrajectory));
    }

    #[test]
    fn test_validate() {
        assert!(VtraceConfig::default().validate().is_ok());
        assert!(VtraceConfig::default().gamma(1.2).validate().is_err());
        assert!(VtraceConfig::default().clip_rho(0.0).validate().is_err());
        assert!(VtraceConfig::default().clip_pg_rho(-1.0).validate().is_err());
    }
}
