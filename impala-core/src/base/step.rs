//! Environment step.

/// Outcome of applying an action, `(o_t+1, r_t)` with episode-end flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Step<O> {
    /// Observation following the action.
    pub obs: O,

    /// Reward.
    pub reward: f32,

    /// The episode reached a terminal state.
    pub is_terminated: bool,

    /// The episode was cut, for example by a time limit.
    ///
    /// A truncated episode is not terminal: the value of `obs` is still
    /// bootstrapped.
    pub is_truncated: bool,
}

impl<O> Step<O> {
    /// Constructs a [`Step`] object.
    pub fn new(obs: O, reward: f32, is_terminated: bool, is_truncated: bool) -> Self {
        Self {
            obs,
            reward,
            is_terminated,
            is_truncated,
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }
}
