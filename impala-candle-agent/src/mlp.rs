//! Multilayer perceptron extracting features from observations.
mod base;
mod config;
pub use base::FeatureMlp;
pub use config::FeatureMlpConfig;
