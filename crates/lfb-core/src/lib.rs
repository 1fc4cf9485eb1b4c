#![deny(missing_docs)]
#![doc = "Core traits and data types for the LFB label-poisoning benchmark."]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod errors;
pub mod provenance;
pub mod rng;
mod types;

pub use errors::{ErrorInfo, LfbError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{FeatureMatrix, Label, LabelSeries};

/// Self-describing serialized form of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Classifier family that produced (and can restore) the payload.
    pub family: String,
    /// Schema version of the payload.
    #[serde(default)]
    pub schema_version: SchemaVersion,
    /// Number of input features the model expects.
    pub feature_count: usize,
    /// Classes the model can emit, in model order.
    pub classes: Vec<Label>,
    /// Family specific parameters.
    pub payload: Value,
}

/// Versioned handle to a model stored in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReference {
    /// Registered model name.
    pub name: String,
    /// Registry version, starting at 1 for every name.
    pub version: u32,
}

impl ModelReference {
    /// Registry URI in the `models:/<name>/<version>` form.
    pub fn uri(&self) -> String {
        format!("models:/{}/{}", self.name, self.version)
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Version selector used when resolving a registered model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelVersion {
    /// Highest registered version.
    #[default]
    Latest,
    /// A specific registered version.
    Exact(u32),
}

impl FromStr for ModelVersion {
    type Err = LfbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("latest") {
            return Ok(ModelVersion::Latest);
        }
        match trimmed.parse::<u32>() {
            Ok(version) if version > 0 => Ok(ModelVersion::Exact(version)),
            _ => Err(LfbError::Registry(
                ErrorInfo::new("model-version-invalid", "model version must be `latest` or >= 1")
                    .with_context("value", value),
            )),
        }
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVersion::Latest => f.write_str("latest"),
            ModelVersion::Exact(version) => write!(f, "{version}"),
        }
    }
}

/// Model resolved from a registry together with its artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredModel {
    /// Resolved reference (always an exact version).
    pub reference: ModelReference,
    /// Run that registered the model, when known.
    pub run_id: Option<String>,
    /// Serialized model.
    pub artifact: ModelArtifact,
}

/// Handle identifying an open tracker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    /// Backend assigned run identifier.
    pub run_id: String,
    /// Experiment the run belongs to.
    pub experiment: String,
}

/// Terminal status recorded when a run is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// All stages of the run completed.
    Finished,
    /// The run was abandoned after a failure.
    Failed,
}

impl RunStatus {
    /// Lowercase status name as persisted by tracker backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
        }
    }
}

/// A fitted classifier able to label feature rows.
pub trait TrainedModel: fmt::Debug + Send + Sync {
    /// Predicts one label per feature row.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<Label>, LfbError>;

    /// Serializes the model for registration.
    fn artifact(&self) -> Result<ModelArtifact, LfbError>;
}

/// Training capability consumed by the sweep orchestrator.
pub trait Classifier: Send + Sync {
    /// Stable family name written into every artifact.
    fn family(&self) -> &str;

    /// Fits a model with the given scalar hyperparameter.
    fn train(
        &self,
        features: &FeatureMatrix,
        labels: &LabelSeries,
        hyperparameter: f64,
    ) -> Result<Box<dyn TrainedModel>, LfbError>;

    /// Rebuilds a model from a registered artifact.
    fn restore(&self, artifact: &ModelArtifact) -> Result<Box<dyn TrainedModel>, LfbError>;
}

/// Append-only experiment tracking backend.
pub trait ExperimentTracker {
    /// Opens a new run within `experiment`.
    fn start_run(&mut self, experiment: &str) -> Result<RunHandle, LfbError>;

    /// Records a string parameter on an open run.
    fn log_param(&mut self, run: &RunHandle, name: &str, value: &str) -> Result<(), LfbError>;

    /// Records a numeric metric on an open run.
    fn log_metric(&mut self, run: &RunHandle, name: &str, value: f64) -> Result<(), LfbError>;

    /// Stores `artifact` under `name`, assigning the next version.
    fn register_model(
        &mut self,
        run: &RunHandle,
        artifact: &ModelArtifact,
        name: &str,
    ) -> Result<ModelReference, LfbError>;

    /// Closes an open run with a terminal status.
    fn finish_run(&mut self, run: &RunHandle, status: RunStatus) -> Result<(), LfbError>;
}

/// Read side of the model registry.
pub trait ModelRegistry {
    /// Resolves `name` at `version` to a stored model.
    fn resolve(&self, name: &str, version: ModelVersion) -> Result<RegisteredModel, LfbError>;
}

/// Backend providing both the tracker and the registry.
pub trait TrackingStore: ExperimentTracker + ModelRegistry {}

impl<T> TrackingStore for T where T: ExperimentTracker + ModelRegistry {}
