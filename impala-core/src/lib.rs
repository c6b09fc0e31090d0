#![warn(missing_docs)]
//! Core of an IMPALA-style actor-critic learner.
//!
//! This crate is independent of any tensor backend. It provides
//!
//! * [`Trajectory`] and [`TrajectoryBatch`], the data handed from
//!   collectors to the learner,
//! * [`vtrace()`], the off-policy correction computing value targets and
//!   policy-gradient advantages,
//! * [`RolloutSampler`] driving a [`Policy`] in an [`Env`],
//! * helpers used in learning steps: [`stats`], [`LinearLrScheduler`] and
//!   [`RunningMeanVar`],
//! * [`record::Record`] for reporting and [`error::ImpalaError`].
//!
//! Backend crates build the networks and the learning step on top of these.
pub mod error;
pub mod record;
pub mod stats;
pub mod vtrace;

mod base;
pub use base::{Env, Policy, Step};

mod batch;
pub use batch::{concat, split_by_lengths, TrajectoryBatch};

mod lr_scheduler;
pub use lr_scheduler::{LinearLrScheduler, LinearLrSchedulerConfig};

mod running_stats;
pub use running_stats::RunningMeanVar;

mod sampler;
pub use sampler::RolloutSampler;

mod trajectory;
pub use trajectory::Trajectory;

pub use vtrace::{vtrace, VtraceConfig, VtraceInput, VtraceOutput};
