//! IMPALA agent.
mod base;
mod config;
mod report;
pub use base::{ActionOutput, CheckpointMeta, Impala};
pub use config::ImpalaConfig;
pub use report::LearnReport;
