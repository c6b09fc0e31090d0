//! Batches of trajectories with individually tracked lengths.
use crate::{error::ImpalaError, trajectory::Trajectory};

/// A set of trajectories consumed by one learning step.
///
/// Trajectories may differ in length. Per-step data are flattened in
/// trajectory order, so that a network can process the whole batch in one
/// call. Flat outputs are split back with [`split_by_lengths`] using
/// [`TrajectoryBatch::lengths`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryBatch<O, A> {
    trajectories: Vec<Trajectory<O, A>>,
}

impl<O, A> TrajectoryBatch<O, A> {
    /// Constructs a batch.
    ///
    /// Fails if there is no trajectory or any trajectory has no step.
    pub fn new(trajectories: Vec<Trajectory<O, A>>) -> Result<Self, ImpalaError> {
        if trajectories.is_empty() {
            return Err(ImpalaError::EmptyBatch);
        }
        if trajectories.iter().any(|traj| traj.is_empty()) {
            return Err(ImpalaError::EmptyTrajectory);
        }
        Ok(Self { trajectories })
    }

    /// Returns the trajectories.
    pub fn trajectories(&self) -> &[Trajectory<O, A>] {
        &self.trajectories
    }

    /// Returns the number of trajectories.
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    /// Always `false`, an empty batch cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Lengths `T` of the trajectories.
    pub fn lengths(&self) -> Vec<usize> {
        self.trajectories.iter().map(|traj| traj.len()).collect()
    }

    /// Total number of action steps in the batch.
    pub fn total_steps(&self) -> usize {
        self.trajectories.iter().map(|traj| traj.len()).sum()
    }

    /// Observations at which actions were taken, concatenated over trajectories.
    pub fn non_final_observations(&self) -> Vec<&O> {
        self.trajectories
            .iter()
            .flat_map(|traj| traj.non_final_observations().iter())
            .collect()
    }

    /// One bootstrap observation per trajectory.
    pub fn last_observations(&self) -> Vec<&O> {
        self.trajectories
            .iter()
            .map(|traj| traj.last_observation())
            .collect()
    }

    /// Actions, concatenated over trajectories.
    pub fn actions(&self) -> Vec<&A> {
        self.trajectories
            .iter()
            .flat_map(|traj| traj.actions().iter())
            .collect()
    }

    /// Behavior log-probabilities, concatenated over trajectories.
    pub fn behavior_logprobs(&self) -> Vec<f32> {
        concat(self.trajectories.iter().map(|traj| traj.behavior_logprobs()))
    }

    /// Rewards, concatenated over trajectories.
    pub fn rewards(&self) -> Vec<f32> {
        concat(self.trajectories.iter().map(|traj| traj.rewards()))
    }

    /// Consumes the batch.
    pub fn into_trajectories(self) -> Vec<Trajectory<O, A>> {
        self.trajectories
    }
}

/// Splits a flat sequence into consecutive slices of the given lengths.
///
/// Fails if `flat.len()` differs from the sum of `lengths`.
pub fn split_by_lengths<'a, T>(
    flat: &'a [T],
    lengths: &[usize],
) -> Result<Vec<&'a [T]>, ImpalaError> {
    let total: usize = lengths.iter().sum();
    ImpalaError::check_len("flat sequence", total, flat.len())?;

    let mut rest = flat;
    let mut out = Vec::with_capacity(lengths.len());
    for &len in lengths {
        let (head, tail) = rest.split_at(len);
        out.push(head);
        rest = tail;
    }
    Ok(out)
}

/// Concatenates slices in order, the inverse of [`split_by_lengths`].
pub fn concat<'a, T, I>(parts: I) -> Vec<T>
where
    T: Clone + 'a,
    I: IntoIterator<Item = &'a [T]>,
{
    parts
        .into_iter()
        .flat_map(|part| part.iter().cloned())
        .collect()
}
