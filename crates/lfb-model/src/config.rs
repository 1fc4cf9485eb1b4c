use lfb_core::errors::{ErrorInfo, LfbError};
use serde::{Deserialize, Serialize};

/// Optimiser settings for the logistic regression classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Maximum gradient descent iterations.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Gradient descent step size on standardised features.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Early stop once the gradient max-norm falls below this value.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_max_iter() -> usize {
    200
}

fn default_learning_rate() -> f64 {
    0.5
}

fn default_tolerance() -> f64 {
    1e-6
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_iter: default_max_iter(),
            learning_rate: default_learning_rate(),
            tolerance: default_tolerance(),
        }
    }
}

impl ModelConfig {
    /// Rejects settings the optimiser cannot run with.
    pub fn validate(&self) -> Result<(), LfbError> {
        if self.max_iter == 0 {
            return Err(LfbError::Config(ErrorInfo::new(
                "model-max-iter",
                "max_iter must be at least 1",
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(LfbError::Config(
                ErrorInfo::new("model-learning-rate", "learning rate must be positive")
                    .with_context("learning_rate", self.learning_rate.to_string()),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(LfbError::Config(
                ErrorInfo::new("model-tolerance", "tolerance must be non-negative")
                    .with_context("tolerance", self.tolerance.to_string()),
            ));
        }
        Ok(())
    }
}
