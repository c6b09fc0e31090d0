//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum ImpalaError {
    /// Lengths of sequences belonging to the same trajectory or batch disagree.
    #[error("Shape mismatch in {what}: expected length {expected}, got {actual}")]
    ShapeMismatch {
        /// Name of the offending sequence.
        what: String,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A trajectory without any action step.
    #[error("Trajectory has no steps")]
    EmptyTrajectory,

    /// A batch without any trajectory.
    #[error("Batch has no trajectories")]
    EmptyBatch,

    /// A step was pushed after the terminal step of a trajectory.
    #[error("Trajectory already reached a terminal state")]
    TrajectoryClosed,

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}

impl ImpalaError {
    /// Returns [`ImpalaError::ShapeMismatch`] if `actual != expected`.
    pub fn check_len(what: &str, expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::ShapeMismatch {
                what: what.to_string(),
                expected,
                actual,
            })
        }
    }
}
