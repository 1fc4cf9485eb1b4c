//! Classifier collaborator for the LFB sweep.

mod config;
mod logistic;
pub mod metrics;

pub use config::ModelConfig;
pub use logistic::{LogisticModel, LogisticRegression, LOGISTIC_FAMILY};
pub use metrics::{accuracy, ConfusionCounts};
