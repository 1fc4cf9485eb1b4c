use std::collections::BTreeMap;
use std::path::PathBuf;

use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::{
    ExperimentTracker, ModelArtifact, ModelReference, ModelRegistry, ModelVersion,
    RegisteredModel, RunHandle, RunStatus, TrackingStore,
};
use serde::{Deserialize, Serialize};

use crate::registry::{CsvTracker, SqliteTracker};
use crate::serde::to_canonical_json_bytes;

/// Tracker backend selection, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum TrackerConfig {
    /// In-process store; contents are lost when the process exits.
    Memory,
    /// Directory holding `runs.csv` and `models/<name>/<version>.json`.
    Csv { dir: PathBuf },
    /// SQLite database file.
    Sqlite { path: PathBuf },
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig::Sqlite {
            path: PathBuf::from("tracking/lfb.sqlite"),
        }
    }
}

/// Opens the backend described by `config`.
pub fn open_tracker(config: &TrackerConfig) -> Result<Box<dyn TrackingStore>, LfbError> {
    let store: Box<dyn TrackingStore> = match config {
        TrackerConfig::Memory => Box::new(MemoryTracker::new()),
        TrackerConfig::Csv { dir } => Box::new(CsvTracker::open(dir)?),
        TrackerConfig::Sqlite { path } => Box::new(SqliteTracker::open(path)?),
    };
    tracing::debug!(?config, "opened experiment tracker");
    Ok(store)
}

/// Everything logged against one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment: String,
    /// `None` while the run is still open.
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub models: Vec<ModelReference>,
}

impl RunRecord {
    pub(crate) fn open(run_id: String, experiment: &str) -> Self {
        Self {
            run_id,
            experiment: experiment.to_string(),
            status: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            models: Vec::new(),
        }
    }

    pub(crate) fn status_name(&self) -> &'static str {
        self.status.map(|status| status.as_str()).unwrap_or("running")
    }
}

/// Filter for run listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Query {
    #[serde(default)]
    pub experiment: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Query {
    pub(crate) fn matches(&self, experiment: &str) -> bool {
        self.experiment
            .as_deref()
            .map_or(true, |wanted| wanted == experiment)
    }
}

/// Tabular run listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub(crate) fn table_columns() -> Vec<String> {
    vec![
        "run_id".into(),
        "experiment".into(),
        "status".into(),
        "params".into(),
        "metrics".into(),
        "models".into(),
    ]
}

pub(crate) fn run_row(record: &RunRecord) -> Result<Vec<String>, LfbError> {
    let models = record
        .models
        .iter()
        .map(ModelReference::uri)
        .collect::<Vec<_>>()
        .join(";");
    Ok(vec![
        record.run_id.clone(),
        record.experiment.clone(),
        record.status_name().to_string(),
        canonical_string(&record.params)?,
        canonical_string(&record.metrics)?,
        models,
    ])
}

pub(crate) fn canonical_string<T: Serialize>(value: &T) -> Result<String, LfbError> {
    let bytes = to_canonical_json_bytes(value)?;
    String::from_utf8(bytes).map_err(|err| {
        LfbError::Serde(
            ErrorInfo::new("tracker-canonical", "failed to encode canonical json")
                .with_hint(err.to_string()),
        )
    })
}

pub(crate) fn unknown_run(run: &RunHandle) -> LfbError {
    LfbError::Tracker(
        ErrorInfo::new("tracker-run-unknown", "run is not open in this tracker")
            .with_context("run_id", run.run_id.as_str()),
    )
}

pub(crate) fn missing_model(name: &str, version: ModelVersion) -> LfbError {
    LfbError::Registry(
        ErrorInfo::new("registry-model-missing", "no registered model matches the request")
            .with_context("name", name)
            .with_context("version", version.to_string())
            .with_hint("run a sweep that registers this model first"),
    )
}

/// Lists the runs recorded by the backend described by `config`.
pub fn query_runs(config: &TrackerConfig, query: &Query) -> Result<Table, LfbError> {
    match config {
        TrackerConfig::Memory => Ok(Table {
            columns: table_columns(),
            rows: Vec::new(),
        }),
        TrackerConfig::Csv { dir } => CsvTracker::query(dir, query),
        TrackerConfig::Sqlite { path } => SqliteTracker::query(path, query),
    }
}

/// In-process tracker used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    runs: Vec<RunRecord>,
    models: BTreeMap<String, Vec<RegisteredModel>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs in start order.
    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// Number of versions registered under `name`.
    pub fn model_versions(&self, name: &str) -> usize {
        self.models.get(name).map_or(0, Vec::len)
    }

    /// Run listing filtered by `query`.
    pub fn table(&self, query: &Query) -> Result<Table, LfbError> {
        let mut rows = Vec::new();
        for record in self.runs.iter().filter(|run| query.matches(&run.experiment)) {
            rows.push(run_row(record)?);
            if query.limit.is_some_and(|limit| rows.len() >= limit) {
                break;
            }
        }
        Ok(Table {
            columns: table_columns(),
            rows,
        })
    }

    fn open_run(&mut self, run: &RunHandle) -> Result<&mut RunRecord, LfbError> {
        self.runs
            .iter_mut()
            .find(|record| record.run_id == run.run_id && record.status.is_none())
            .ok_or_else(|| unknown_run(run))
    }
}

impl ExperimentTracker for MemoryTracker {
    fn start_run(&mut self, experiment: &str) -> Result<RunHandle, LfbError> {
        let run_id = format!("run-{:06}", self.runs.len() + 1);
        self.runs.push(RunRecord::open(run_id.clone(), experiment));
        Ok(RunHandle {
            run_id,
            experiment: experiment.to_string(),
        })
    }

    fn log_param(&mut self, run: &RunHandle, name: &str, value: &str) -> Result<(), LfbError> {
        self.open_run(run)?
            .params
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn log_metric(&mut self, run: &RunHandle, name: &str, value: f64) -> Result<(), LfbError> {
        self.open_run(run)?.metrics.insert(name.to_string(), value);
        Ok(())
    }

    fn register_model(
        &mut self,
        run: &RunHandle,
        artifact: &ModelArtifact,
        name: &str,
    ) -> Result<ModelReference, LfbError> {
        self.open_run(run)?;
        let versions = self.models.entry(name.to_string()).or_default();
        let reference = ModelReference {
            name: name.to_string(),
            version: versions.len() as u32 + 1,
        };
        versions.push(RegisteredModel {
            reference: reference.clone(),
            run_id: Some(run.run_id.clone()),
            artifact: artifact.clone(),
        });
        self.open_run(run)?.models.push(reference.clone());
        Ok(reference)
    }

    fn finish_run(&mut self, run: &RunHandle, status: RunStatus) -> Result<(), LfbError> {
        self.open_run(run)?.status = Some(status);
        Ok(())
    }
}

impl ModelRegistry for MemoryTracker {
    fn resolve(&self, name: &str, version: ModelVersion) -> Result<RegisteredModel, LfbError> {
        let versions = self
            .models
            .get(name)
            .ok_or_else(|| missing_model(name, version))?;
        let found = match version {
            ModelVersion::Latest => versions.last(),
            ModelVersion::Exact(wanted) => versions
                .iter()
                .find(|model| model.reference.version == wanted),
        };
        found.cloned().ok_or_else(|| missing_model(name, version))
    }
}
