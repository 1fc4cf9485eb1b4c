use std::fs;
use std::path::Path;

use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_data::DatasetConfig;
use lfb_model::ModelConfig;
use serde::{Deserialize, Serialize};

use crate::serde::from_yaml_slice;
use crate::sweep::SweepPlan;
use crate::tracker::TrackerConfig;

/// Top-level experiment configuration read from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Master seed for poisoning.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub sweep: SweepPlan,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

fn default_seed() -> u64 {
    42
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            dataset: DatasetConfig::default(),
            sweep: SweepPlan::default(),
            model: ModelConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml(data: &[u8]) -> Result<Self, LfbError> {
        let config: ExperimentConfig = from_yaml_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section that can be checked before touching data.
    pub fn validate(&self) -> Result<(), LfbError> {
        self.sweep.validate()?;
        self.model.validate()?;
        if !(self.dataset.test_fraction > 0.0 && self.dataset.test_fraction < 1.0) {
            return Err(LfbError::Config(
                ErrorInfo::new("config-test-fraction", "test fraction must lie in (0, 1)")
                    .with_context("test_fraction", self.dataset.test_fraction.to_string()),
            ));
        }
        if self.dataset.features.is_empty() {
            return Err(LfbError::Config(ErrorInfo::new(
                "config-features-empty",
                "at least one feature column is required",
            )));
        }
        Ok(())
    }
}

/// Reads the experiment configuration at `path`.
pub fn load_config(path: &Path) -> Result<ExperimentConfig, LfbError> {
    let bytes = fs::read(path).map_err(|err| {
        LfbError::Config(
            ErrorInfo::new("config-read", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    ExperimentConfig::from_yaml(&bytes).map_err(|err| match err {
        LfbError::Serde(info) => LfbError::Config(info.with_context("path", path.display().to_string())),
        other => other,
    })
}
