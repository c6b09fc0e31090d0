//! IMPALA agent implemented with candle.
use super::{ImpalaConfig, LearnReport};
use crate::{
    heads::{ActionDist, ActionHead, ValueHead},
    init::{constant_init, ortho_init, RELU_GAIN},
    mlp::FeatureMlp,
    model::SubModel1,
    opt::Optimizer,
    param_store::ParamStore,
    util::{clip_grad_norm, param_stats, rows_to_tensor},
    Action, ActionSpace,
};
use anyhow::{anyhow, bail, Result};
use candle_core::{Device, Tensor};
use chrono::Local;
use impala_core::{
    concat, record::Record, split_by_lengths, stats, vtrace, LinearLrScheduler, Policy,
    RunningMeanVar, TrajectoryBatch, VtraceConfig, VtraceInput, VtraceOutput,
};
use log::{debug, info, trace};
use rand::{rngs::SmallRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    convert::{TryFrom, TryInto},
    fs::{self, File},
    io::{BufReader, Write},
    path::Path,
};

const TOTAL_TIMESTEP: &str = "total_timestep";

fn timestep_tensor(t: usize) -> Result<Tensor> {
    Ok(Tensor::new(&[i64::try_from(t)?], &Device::Cpu)?)
}

/// Orthogonal weights and zero biases for every linear layer.
///
/// Feature layers use the ReLU gain, the value head gain 1 and the action
/// head gain 0.01. Layer normalizations and `log_std` keep their constant
/// initial values. Variables are visited in the order of their names, so
/// the result only depends on `rng`.
fn init_params(params: &ParamStore, rng: &mut SmallRng) -> Result<()> {
    for (name, var) in params.named_vars()? {
        let gain = if name.starts_with("feature.ln") {
            RELU_GAIN
        } else if name.starts_with("value_head.") {
            1.0
        } else if name.starts_with("action_head.") && !name.ends_with("log_std") {
            0.01
        } else {
            continue;
        };
        if name.ends_with(".weight") {
            ortho_init(&var, gain, rng)?;
        } else if name.ends_with(".bias") {
            constant_init(&var, 0.0)?;
        }
        trace!("Initialize {} {:?}", name, var.dims());
    }
    Ok(())
}

/// Output of [`Impala::choose_action`], one entry per observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput {
    /// Sampled actions.
    pub actions: Vec<Action>,

    /// Log-probabilities of the sampled actions.
    pub logprobs: Vec<f32>,

    /// State values.
    pub values: Vec<f32>,

    /// Entropies of the action distributions.
    pub entropies: Vec<f32>,
}

/// Metadata written next to the parameters of a checkpoint.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CheckpointMeta {
    /// Iteration of the checkpoint.
    pub num_iter: usize,

    /// Environment steps consumed by the agent.
    pub total_timestep: usize,

    /// Local time when the checkpoint was written, RFC 3339.
    pub timestamp: String,
}

/// IMPALA agent.
///
/// A feature network feeds an action head and a state-value head. All
/// parameters are optimized with a single loss
/// `mean(-logp * A + value_coef * (V - vs)^2 - entropy_coef * H)`,
/// where the value targets `vs` and advantages `A` are computed by V-trace,
/// correcting for the lag between the policy that collected the trajectories
/// and the current one.
///
/// [`Impala::learn`] takes `&mut self`, so updates of one agent never
/// interleave. Wrap the agent in a `Mutex` to share it between threads.
pub struct Impala {
    feature: FeatureMlp,
    action_head: ActionHead,
    value_head: ValueHead,
    params: ParamStore,
    opt: Optimizer,
    lr_scheduler: Option<LinearLrScheduler>,
    action_space: ActionSpace,
    vtrace_config: VtraceConfig,
    standardize_adv: bool,
    value_coef: f64,
    entropy_coef: f64,
    max_grad_norm: f64,
    record_verbose_level: usize,
    obs_dim: usize,
    total_timestep: usize,
    device: Device,
    rng: SmallRng,
}

impl Impala {
    /// Constructs [`Impala`] agent.
    pub fn build(config: ImpalaConfig) -> Result<Self> {
        config.validate()?;
        let device: Device = config.device.try_into()?;
        let mut params = ParamStore::new(device.clone());

        let (feature, action_head, value_head) = {
            let vb = params.vb();
            let feature = FeatureMlp::build(vb.clone(), config.feature_config.clone())?;
            let feature_dim = feature.out_dim();
            let action_head = ActionHead::build(
                vb.pp("action_head"),
                feature_dim,
                &config.action_space,
                config.std0,
            )?;
            let value_head = ValueHead::build(vb.pp("value_head"), feature_dim)?;
            (feature, action_head, value_head)
        };
        params.set_buffer(TOTAL_TIMESTEP, timestep_tensor(0)?)?;
        let mut rng = SmallRng::seed_from_u64(config.seed);
        init_params(&params, &mut rng)?;

        let (opt_config, lr_scheduler) = match &config.lr_scheduler_config {
            Some(c) => (
                config.opt_config.clone().learning_rate(c.initial_lr),
                Some(LinearLrScheduler::build(c)?),
            ),
            None => (config.opt_config.clone(), None),
        };
        let opt = opt_config.build(params.all_vars()?)?;
        info!(
            "Build IMPALA agent with {} parameters on {:?}",
            params.num_params()?,
            config.device
        );

        Ok(Self {
            feature,
            action_head,
            value_head,
            params,
            opt,
            lr_scheduler,
            action_space: config.action_space,
            vtrace_config: config.vtrace_config,
            standardize_adv: config.standardize_adv,
            value_coef: config.value_coef,
            entropy_coef: config.entropy_coef,
            max_grad_norm: config.max_grad_norm,
            record_verbose_level: config.record_verbose_level,
            obs_dim: config.feature_config.in_dim,
            total_timestep: 0,
            device,
            rng,
        })
    }

    fn obs_to_tensor(&self, obs: &[&Vec<f32>]) -> Result<Tensor> {
        if obs.is_empty() {
            bail!("No observation is given");
        }
        rows_to_tensor(obs, self.obs_dim, &self.device)
    }

    /// Action distributions and state values given observations `[N, obs_dim]`.
    fn forward(&self, obs: &Tensor) -> Result<(ActionDist, Tensor)> {
        let features = self.feature.forward(obs)?;
        let dist = self.action_head.forward(&features)?;
        let values = self.value_head.forward(&features)?;
        Ok((dist, values))
    }

    /// Samples actions from the current policy.
    pub fn choose_action(&mut self, obs: &[Vec<f32>]) -> Result<ActionOutput> {
        let rows: Vec<&Vec<f32>> = obs.iter().collect();
        let obs = self.obs_to_tensor(&rows)?;
        let (dist, values) = self.forward(&obs)?;
        let act = dist.sample(&mut self.rng)?;

        Ok(ActionOutput {
            actions: self.action_space.tensor_to_actions(&act)?,
            logprobs: dist.log_prob(&act)?.detach().to_vec1()?,
            values: values.detach().to_vec1()?,
            entropies: dist.entropy()?.detach().to_vec1()?,
        })
    }

    /// Log-probabilities of given actions and state values under the current parameters.
    pub fn evaluate(&self, obs: &[Vec<f32>], actions: &[Action]) -> Result<(Vec<f32>, Vec<f32>)> {
        let rows: Vec<&Vec<f32>> = obs.iter().collect();
        let obs = self.obs_to_tensor(&rows)?;
        let actions: Vec<&Action> = actions.iter().collect();
        let actions = self.action_space.actions_to_tensor(&actions, &self.device)?;
        let (dist, values) = self.forward(&obs)?;

        Ok((
            dist.log_prob(&actions)?.detach().to_vec1()?,
            values.detach().to_vec1()?,
        ))
    }

    /// Values `[B]` of the last observations, one per trajectory, without gradients.
    fn bootstrap_values(&self, batch: &TrajectoryBatch<Vec<f32>, Action>) -> Result<Tensor> {
        let last_obs = self.obs_to_tensor(&batch.last_observations())?;
        let features = self.feature.forward(&last_obs)?;
        Ok(self.value_head.forward(&features)?.detach())
    }

    /// Runs V-trace on each trajectory and concatenates the outputs.
    fn vtrace_targets(
        &self,
        batch: &TrajectoryBatch<Vec<f32>, Action>,
        logprobs: &Tensor,
        values: &Tensor,
        last_values: &[f32],
    ) -> Result<(Vec<f32>, Vec<f32>, Vec<f32>)> {
        let lengths = batch.lengths();
        let target_logprobs: Vec<f32> = logprobs.detach().to_vec1()?;
        let values: Vec<f32> = values.detach().to_vec1()?;
        let target_logprobs = split_by_lengths(&target_logprobs, &lengths)?;
        let values = split_by_lengths(&values, &lengths)?;

        let outs = batch
            .trajectories()
            .iter()
            .zip(target_logprobs.into_iter().zip(values))
            .zip(last_values)
            .map(|((traj, (target_logprobs, values)), last_value)| {
                let input = VtraceInput {
                    behavior_logprobs: traj.behavior_logprobs(),
                    target_logprobs,
                    rewards: traj.rewards(),
                    values,
                    last_value: *last_value,
                    dones: traj.dones(),
                };
                vtrace(&self.vtrace_config, &input)
            })
            .collect::<Result<Vec<VtraceOutput>, _>>()?;

        Ok((
            concat(outs.iter().map(|o| o.vs.as_slice())),
            concat(outs.iter().map(|o| o.advantages.as_slice())),
            concat(outs.iter().map(|o| o.rhos.as_slice())),
        ))
    }

    /// Performs one optimization step on a batch of trajectories.
    pub fn learn(&mut self, batch: &TrajectoryBatch<Vec<f32>, Action>) -> Result<LearnReport> {
        let n = batch.total_steps();

        // Forward pass with gradients on the observations at which actions were taken
        let obs = self.obs_to_tensor(&batch.non_final_observations())?;
        let actions = self
            .action_space
            .actions_to_tensor(&batch.actions(), &self.device)?;
        trace!("obs: {:?}, actions: {:?}", obs.dims(), actions.dims());
        let (dist, values) = self.forward(&obs)?;
        let logprobs = dist.log_prob(&actions)?;
        let entropies = dist.entropy()?;

        let last_values: Vec<f32> = self.bootstrap_values(batch)?.to_vec1()?;

        let (vs, advantages, rhos) = self.vtrace_targets(batch, &logprobs, &values, &last_values)?;
        let advantages = match self.standardize_adv {
            true => stats::standardize(&advantages, 1e-8),
            false => advantages,
        };
        let vs_t = Tensor::from_slice(&vs, (n,), &self.device)?;
        let adv_t = Tensor::from_slice(&advantages, (n,), &self.device)?;

        // Losses
        let policy_loss = (logprobs.neg()? * &adv_t)?;
        let entropy_loss = entropies.neg()?;
        let value_loss = (&values - &vs_t)?.sqr()?;
        let loss = ((&policy_loss + (&value_loss * self.value_coef)?)?
            + (&entropy_loss * self.entropy_coef)?)?
            .mean_all()?;

        // Update parameters
        let vars = self.params.all_vars()?;
        let mut grads = loss.backward()?;
        let grad_norm = clip_grad_norm(&mut grads, &vars, self.max_grad_norm)?;
        self.opt.step(&grads)?;

        let current_lr = match &self.lr_scheduler {
            Some(scheduler) => {
                let lr = scheduler.lr(self.total_timestep);
                self.opt.set_learning_rate(lr);
                Some(lr)
            }
            None => None,
        };
        self.total_timestep += n;
        self.params
            .set_buffer(TOTAL_TIMESTEP, timestep_tensor(self.total_timestep)?)?;

        let values: Vec<f32> = values.detach().to_vec1()?;
        let entropy_loss: f32 = entropy_loss.mean_all()?.to_scalar()?;
        let report = LearnReport {
            loss: loss.to_scalar()?,
            policy_loss: policy_loss.mean_all()?.to_scalar()?,
            entropy_loss,
            policy_entropy: -entropy_loss,
            value_loss: value_loss.mean_all()?.to_scalar()?,
            grad_norm,
            explained_variance: stats::explained_variance(&vs, &values),
            value: stats::describe(&values),
            mean_rho: rhos.iter().sum::<f32>() / n as f32,
            current_lr,
            total_timestep: self.total_timestep,
        };
        debug!(
            "total_timestep: {}, loss: {}, grad_norm: {}",
            report.total_timestep, report.loss, report.grad_norm
        );

        Ok(report)
    }

    /// Performs one optimization step and returns the report as a [`Record`].
    ///
    /// If `record_verbose_level >= 2`, the mean and standard deviation of
    /// every parameter are added.
    pub fn learn_with_record(&mut self, batch: &TrajectoryBatch<Vec<f32>, Action>) -> Result<Record> {
        let record = self.learn(batch)?.to_record();
        match self.record_verbose_level >= 2 {
            true => Ok(record.merge(param_stats(&self.params.named_vars()?)?)),
            false => Ok(record),
        }
    }

    /// Saves parameters and optionally observation moments in `logdir`.
    ///
    /// Writes `agent_{num_iter}.safetensors`, `agent_{num_iter}.yaml` and,
    /// if `obs_moments` is given, `obs_moments_{num_iter}.yaml`.
    pub fn checkpoint(
        &self,
        logdir: impl AsRef<Path>,
        num_iter: usize,
        obs_moments: Option<&RunningMeanVar>,
    ) -> Result<()> {
        let logdir = logdir.as_ref();
        fs::create_dir_all(logdir)?;
        self.params
            .save(logdir.join(format!("agent_{}.safetensors", num_iter)))?;

        let meta = CheckpointMeta {
            num_iter,
            total_timestep: self.total_timestep,
            timestamp: Local::now().to_rfc3339(),
        };
        let mut file = File::create(logdir.join(format!("agent_{}.yaml", num_iter)))?;
        file.write_all(serde_yaml::to_string(&meta)?.as_bytes())?;

        if let Some(moments) = obs_moments {
            moments.save(logdir.join(format!("obs_moments_{}.yaml", num_iter)))?;
        }
        info!("Save checkpoint {} into {:?}", num_iter, logdir);
        Ok(())
    }

    /// Restores a checkpoint written by [`Impala::checkpoint`].
    ///
    /// Returns the observation moments if they were saved.
    pub fn load_checkpoint(
        &mut self,
        logdir: impl AsRef<Path>,
        num_iter: usize,
    ) -> Result<Option<RunningMeanVar>> {
        let logdir = logdir.as_ref();
        self.params
            .load(logdir.join(format!("agent_{}.safetensors", num_iter)))?;

        let t = self
            .params
            .buffer(TOTAL_TIMESTEP)
            .ok_or_else(|| anyhow!("{} is not registered", TOTAL_TIMESTEP))?
            .to_vec1::<i64>()?;
        let t = t
            .first()
            .copied()
            .ok_or_else(|| anyhow!("{} is empty", TOTAL_TIMESTEP))?;
        self.total_timestep = usize::try_from(t)?;
        if let Some(scheduler) = &self.lr_scheduler {
            self.opt.set_learning_rate(scheduler.lr(self.total_timestep));
        }

        let path = logdir.join(format!("obs_moments_{}.yaml", num_iter));
        let moments = match path.exists() {
            true => Some(RunningMeanVar::load(&path)?),
            false => None,
        };
        info!("Load checkpoint {} from {:?}", num_iter, logdir);
        Ok(moments)
    }

    /// Reads the metadata of a checkpoint.
    pub fn checkpoint_meta(logdir: impl AsRef<Path>, num_iter: usize) -> Result<CheckpointMeta> {
        let file = File::open(logdir.as_ref().join(format!("agent_{}.yaml", num_iter)))?;
        let rdr = BufReader::new(file);
        Ok(serde_yaml::from_reader(rdr)?)
    }

    /// Environment steps consumed in learning so far.
    pub fn total_timestep(&self) -> usize {
        self.total_timestep
    }

    /// Current learning rate of the optimizer.
    pub fn learning_rate(&self) -> f64 {
        self.opt.learning_rate()
    }

    /// Action space of the agent.
    pub fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    /// Parameters of the agent.
    pub fn params(&self) -> &ParamStore {
        &self.params
    }
}

impl Policy<Vec<f32>, Action> for Impala {
    fn act(&mut self, obs: &Vec<f32>) -> Result<(Action, f32)> {
        let out = self.choose_action(std::slice::from_ref(obs))?;
        match (out.actions.into_iter().next(), out.logprobs.first()) {
            (Some(act), Some(logp)) => Ok((act, *logp)),
            _ => Err(anyhow!("No action is sampled")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::FeatureMlpConfig;
    use impala_core::Trajectory;

    const TOL: f32 = 1e-5;

    fn agent(standardize_adv: bool) -> Result<Impala> {
        Impala::build(
            ImpalaConfig::default()
                .feature_config(FeatureMlpConfig::new(2, vec![8]))
                .action_space(ActionSpace::Discrete(3))
                .vtrace_config(VtraceConfig::default().gamma(0.9).clip_pg_rho(1.2))
                .standardize_adv(standardize_adv)
                .seed(11),
        )
    }

    /// A non-terminal trajectory of length 3 followed by a terminal one of length 2.
    fn batch() -> Result<TrajectoryBatch<Vec<f32>, Action>> {
        let t1 = Trajectory::from_parts(
            vec![vec![0.0, 1.0], vec![0.5, -0.5], vec![1.0, 0.0], vec![-1.0, 2.0]],
            vec![Action::Discrete(0), Action::Discrete(2), Action::Discrete(1)],
            vec![1.0, -0.5, 0.25],
            vec![-1.2, -0.9, -1.5],
            vec![false; 3],
        )?;
        let t2 = Trajectory::from_parts(
            vec![vec![2.0, 2.0], vec![-0.3, 0.7], vec![0.0, 0.0]],
            vec![Action::Discrete(1), Action::Discrete(1)],
            vec![0.0, 2.0],
            vec![-0.4, -2.0],
            vec![false, true],
        )?;
        Ok(TrajectoryBatch::new(vec![t1, t2])?)
    }

    fn flat_inputs(
        agent: &Impala,
        batch: &TrajectoryBatch<Vec<f32>, Action>,
    ) -> Result<(Vec<f32>, Tensor, Tensor)> {
        let obs: Vec<Vec<f32>> = batch.non_final_observations().into_iter().cloned().collect();
        let actions: Vec<Action> = batch.actions().into_iter().cloned().collect();
        let (logp, values) = agent.evaluate(&obs, &actions)?;
        let logp_t = Tensor::new(logp.as_slice(), &Device::Cpu)?;
        let values_t = Tensor::new(values.as_slice(), &Device::Cpu)?;
        Ok((logp, logp_t, values_t))
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < TOL, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_targets_align_with_trajectories() -> Result<()> {
        let agent = agent(true)?;
        let batch = batch()?;

        let last_values: Vec<f32> = agent.bootstrap_values(&batch)?.to_vec1()?;
        let (_, logp, values) = flat_inputs(&agent, &batch)?;
        let (vs, advantages, rhos) = agent.vtrace_targets(&batch, &logp, &values, &last_values)?;
        assert_eq!(vs.len(), 5);

        // The same targets computed one trajectory at a time.
        let mut expected = vec![];
        let mut expected_last_values = vec![];
        for traj in batch.trajectories() {
            let (target_logprobs, values) =
                agent.evaluate(traj.non_final_observations(), traj.actions())?;
            let (_, last_value) = agent.evaluate(
                std::slice::from_ref(traj.last_observation()),
                &[Action::Discrete(0)],
            )?;
            let input = VtraceInput {
                behavior_logprobs: traj.behavior_logprobs(),
                target_logprobs: &target_logprobs,
                rewards: traj.rewards(),
                values: &values,
                last_value: last_value[0],
                dones: traj.dones(),
            };
            expected.push(vtrace(&agent.vtrace_config, &input)?);
            expected_last_values.push(last_value[0]);
        }
        assert_close(&last_values, &expected_last_values);
        assert_close(&vs, &concat(expected.iter().map(|o| o.vs.as_slice())));
        assert_close(&advantages, &concat(expected.iter().map(|o| o.advantages.as_slice())));
        assert_close(&rhos, &concat(expected.iter().map(|o| o.rhos.as_slice())));

        // Terminal step of the second trajectory: vs = V + rho * (r - V).
        let v = values.to_vec1::<f32>()?[4];
        assert!((vs[4] - (v + rhos[4] * (2.0 - v))).abs() < TOL);
        Ok(())
    }

    #[test]
    fn test_bootstrap_values_have_no_gradient() -> Result<()> {
        let agent = agent(true)?;
        let batch = batch()?;

        let grads = agent.bootstrap_values(&batch)?.sum_all()?.backward()?;
        for (name, var) in agent.params.named_vars()? {
            assert!(grads.get(var.as_tensor()).is_none(), "{} has a gradient", name);
        }

        // The value prediction on the same observations does carry gradients.
        let obs = agent.obs_to_tensor(&batch.last_observations())?;
        let (_, values) = agent.forward(&obs)?;
        let grads = values.sum_all()?.backward()?;
        let vars = agent.params.named_vars()?;
        let (_, w) = vars
            .iter()
            .find(|(k, _)| k == "value_head.v.weight")
            .ok_or_else(|| anyhow!("value head is missing"))?;
        assert!(grads.get(w.as_tensor()).is_some());
        Ok(())
    }

    #[test]
    fn test_policy_loss_with_and_without_standardization() -> Result<()> {
        for &standardize_adv in [false, true].iter() {
            let mut agent = agent(standardize_adv)?;
            let batch = batch()?;

            let last_values: Vec<f32> = agent.bootstrap_values(&batch)?.to_vec1()?;
            let (logp, logp_t, values_t) = flat_inputs(&agent, &batch)?;
            let (_, advantages, _) = agent.vtrace_targets(&batch, &logp_t, &values_t, &last_values)?;
            let advantages = match standardize_adv {
                true => stats::standardize(&advantages, 1e-8),
                false => advantages,
            };
            let expected = -logp
                .iter()
                .zip(&advantages)
                .map(|(lp, a)| lp * a)
                .sum::<f32>()
                / logp.len() as f32;

            let report = agent.learn(&batch)?;
            assert!(
                (report.policy_loss - expected).abs() < 1e-4,
                "standardize_adv: {}, {} != {}",
                standardize_adv,
                report.policy_loss,
                expected
            );
        }
        Ok(())
    }
}
