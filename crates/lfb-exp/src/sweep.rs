use std::collections::BTreeMap;

use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::{
    Classifier, ExperimentTracker, ModelReference, RngHandle, RunHandle, RunProvenance, RunStatus,
    TrainedModel,
};
use lfb_data::SplitDataset;
use lfb_model::accuracy;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::hash::stable_hash_string;
use crate::poison::{poison, PoisonLevel, PoisonOutcome, PoisonStatus};

/// Scheduler configuration controlling sweep execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduler {
    /// Worker threads used to train the cells of one poison level.
    #[serde(default = "Scheduler::default_parallelism")]
    pub parallelism: usize,
}

impl Scheduler {
    const fn default_parallelism() -> usize {
        1
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            parallelism: Self::default_parallelism(),
        }
    }
}

/// Named hyperparameter and the values swept over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterGrid {
    #[serde(default = "HyperparameterGrid::default_name")]
    pub name: String,
    #[serde(default = "HyperparameterGrid::default_values")]
    pub values: Vec<f64>,
}

impl HyperparameterGrid {
    fn default_name() -> String {
        "C".to_string()
    }

    fn default_values() -> Vec<f64> {
        vec![0.1, 0.5, 1.0, 1.5]
    }
}

impl Default for HyperparameterGrid {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            values: Self::default_values(),
        }
    }
}

/// Plan describing the poison-level by hyperparameter sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    /// Tracker experiment every run is recorded under.
    #[serde(default = "SweepPlan::default_experiment")]
    pub experiment: String,
    /// Registry name every trained model is registered under.
    #[serde(default = "SweepPlan::default_model_name")]
    pub model_name: String,
    /// Outer loop, in execution order.
    #[serde(default = "SweepPlan::default_poison_levels")]
    pub poison_levels: Vec<f64>,
    /// Inner loop, in execution order.
    #[serde(default)]
    pub hyperparameter: HyperparameterGrid,
    #[serde(default)]
    pub scheduler: Scheduler,
}

impl SweepPlan {
    fn default_experiment() -> String {
        "iris-lr".to_string()
    }

    fn default_model_name() -> String {
        "iris-lr-model".to_string()
    }

    fn default_poison_levels() -> Vec<f64> {
        vec![0.0, 0.05, 0.10, 0.50]
    }

    /// Checks the plan and returns its validated poison levels.
    pub fn validate(&self) -> Result<Vec<PoisonLevel>, LfbError> {
        if self.poison_levels.is_empty() {
            return Err(LfbError::Config(
                ErrorInfo::new("sweep-levels-empty", "sweep needs at least one poison level")
                    .with_context("field", "poison_levels"),
            ));
        }
        if self.hyperparameter.values.is_empty() {
            return Err(LfbError::Config(
                ErrorInfo::new("sweep-hyperparameters-empty", "sweep needs at least one hyperparameter value")
                    .with_context("field", "hyperparameter.values"),
            ));
        }
        for (field, value) in [
            ("experiment", &self.experiment),
            ("model_name", &self.model_name),
            ("hyperparameter.name", &self.hyperparameter.name),
        ] {
            if value.trim().is_empty() {
                return Err(LfbError::Config(
                    ErrorInfo::new("sweep-name-empty", "sweep names must not be empty")
                        .with_context("field", field),
                ));
            }
        }
        self.poison_levels
            .iter()
            .map(|&level| PoisonLevel::new(level))
            .collect()
    }

    /// Number of cells the sweep will run.
    pub fn cell_count(&self) -> usize {
        self.poison_levels.len() * self.hyperparameter.values.len()
    }
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self {
            experiment: Self::default_experiment(),
            model_name: Self::default_model_name(),
            poison_levels: Self::default_poison_levels(),
            hyperparameter: HyperparameterGrid::default(),
            scheduler: Scheduler::default(),
        }
    }
}

/// Immutable record of one successful sweep cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRun {
    run_id: String,
    poison_level: f64,
    hyperparameter: f64,
    accuracy: f64,
    model_reference: ModelReference,
}

impl ExperimentRun {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn poison_level(&self) -> f64 {
        self.poison_level
    }

    pub fn hyperparameter(&self) -> f64 {
        self.hyperparameter
    }

    /// Fraction of the clean holdout predicted correctly.
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn model_reference(&self) -> &ModelReference {
        &self.model_reference
    }
}

/// Stage of a cell at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStage {
    Train,
    Evaluate,
    Record,
}

/// Result of one sweep cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CellOutcome {
    Completed { run: ExperimentRun },
    Failed { stage: CellStage, error: LfbError },
}

/// Per-cell report entry, in sweep order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepCellReport {
    pub poison_level: f64,
    pub hyperparameter: f64,
    pub outcome: CellOutcome,
}

impl SweepCellReport {
    /// The recorded run when the cell completed.
    pub fn run(&self) -> Option<&ExperimentRun> {
        match &self.outcome {
            CellOutcome::Completed { run } => Some(run),
            CellOutcome::Failed { .. } => None,
        }
    }
}

/// What poisoning did at one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelReport {
    pub poison_level: f64,
    pub status: PoisonStatus,
    pub flipped: usize,
    pub train_size: usize,
}

/// Aggregate sweep report persisted for reproducibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub provenance: RunProvenance,
    pub hyperparameter_name: String,
    pub levels: Vec<LevelReport>,
    pub cells: Vec<SweepCellReport>,
}

impl SweepReport {
    /// Successfully recorded runs, in sweep order.
    pub fn runs(&self) -> impl Iterator<Item = &ExperimentRun> + '_ {
        self.cells.iter().filter_map(SweepCellReport::run)
    }

    pub fn completed(&self) -> usize {
        self.runs().count()
    }

    pub fn failed(&self) -> usize {
        self.cells.len() - self.completed()
    }
}

struct Evaluated {
    model: Box<dyn TrainedModel>,
    accuracy: f64,
}

type Evaluation = Result<Evaluated, (CellStage, LfbError)>;

/// Executes the sweep described by `plan`.
///
/// Levels run in plan order. Each level poisons the clean training labels
/// once, with an RNG derived from `(seed, level position)`, and every
/// hyperparameter of that level trains on that same series. Models are always
/// scored against the untouched evaluation partition. Cell failures are
/// reported in the returned [`SweepReport`]; only plan or dataset validation
/// errors abort the sweep. A cell that fails after its model was registered
/// leaves that version in the registry, attached to a failed run.
pub fn run_sweep<T: ExperimentTracker + ?Sized>(
    plan: &SweepPlan,
    data: &SplitDataset,
    classifier: &dyn Classifier,
    tracker: &mut T,
    seed: u64,
) -> Result<SweepReport, LfbError> {
    let levels = plan.validate()?;
    validate_data(data)?;
    let plan_hash = stable_hash_string(&(plan, seed))?;
    let dataset_hash = stable_hash_string(data)?;
    let pool = if plan.scheduler.parallelism > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(plan.scheduler.parallelism)
            .build()
            .map_err(|err| LfbError::Config(ErrorInfo::new("sweep-thread-pool", err.to_string())))?;
        Some(pool)
    } else {
        None
    };

    tracing::info!(
        experiment = %plan.experiment,
        levels = levels.len(),
        hyperparameters = plan.hyperparameter.values.len(),
        parallelism = plan.scheduler.parallelism.max(1),
        "starting sweep"
    );

    let mut level_reports = Vec::with_capacity(levels.len());
    let mut cells = Vec::with_capacity(plan.cell_count());
    for (level_idx, level) in levels.iter().copied().enumerate() {
        tracing::info!(level = level.value(), "starting runs for poison level");
        let mut rng = RngHandle::substream(seed, level_idx as u64);
        let poisoned = poison(&data.train.labels, level, &mut rng);
        level_reports.push(LevelReport {
            poison_level: level.value(),
            status: poisoned.status(),
            flipped: poisoned.flipped().len(),
            train_size: poisoned.series().len(),
        });

        let evaluations: Vec<Evaluation> = match &pool {
            Some(pool) => pool.install(|| {
                plan.hyperparameter
                    .values
                    .par_iter()
                    .map(|&value| evaluate_cell(classifier, data, &poisoned, value))
                    .collect()
            }),
            None => plan
                .hyperparameter
                .values
                .iter()
                .map(|&value| evaluate_cell(classifier, data, &poisoned, value))
                .collect(),
        };

        for (&value, evaluation) in plan.hyperparameter.values.iter().zip(evaluations) {
            let outcome = match evaluation {
                Ok(evaluated) => record_cell(tracker, plan, level, value, &evaluated),
                Err((stage, error)) => {
                    record_failed_cell(tracker, plan, level, value);
                    CellOutcome::Failed { stage, error }
                }
            };
            match &outcome {
                CellOutcome::Completed { run } => tracing::info!(
                    level = level.value(),
                    hyperparameter = value,
                    accuracy = run.accuracy(),
                    run_id = run.run_id(),
                    model = %run.model_reference(),
                    "recorded sweep cell"
                ),
                CellOutcome::Failed { stage, error } => tracing::error!(
                    level = level.value(),
                    hyperparameter = value,
                    ?stage,
                    %error,
                    "sweep cell failed; continuing"
                ),
            }
            cells.push(SweepCellReport {
                poison_level: level.value(),
                hyperparameter: value,
                outcome,
            });
        }
    }

    let report = SweepReport {
        provenance: RunProvenance {
            plan_hash,
            dataset_hash,
            seed,
            created_at: String::new(),
            tool_versions: BTreeMap::from([(
                "lfb-exp".to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            )]),
        },
        hyperparameter_name: plan.hyperparameter.name.clone(),
        levels: level_reports,
        cells,
    };
    tracing::info!(
        completed = report.completed(),
        failed = report.failed(),
        "sweep finished"
    );
    Ok(report)
}

fn validate_data(data: &SplitDataset) -> Result<(), LfbError> {
    if data.train.is_empty() || data.eval.is_empty() {
        return Err(LfbError::Dataset(
            ErrorInfo::new("sweep-partition-empty", "train and evaluation partitions must be non-empty")
                .with_context("train", data.train.len().to_string())
                .with_context("eval", data.eval.len().to_string()),
        ));
    }
    if data.train.features.width() != data.eval.features.width() {
        return Err(LfbError::Dataset(
            ErrorInfo::new("sweep-feature-width", "partitions disagree on feature width")
                .with_context("train", data.train.features.width().to_string())
                .with_context("eval", data.eval.features.width().to_string()),
        ));
    }
    Ok(())
}

fn evaluate_cell(
    classifier: &dyn Classifier,
    data: &SplitDataset,
    poisoned: &PoisonOutcome,
    hyperparameter: f64,
) -> Evaluation {
    let model = classifier
        .train(&data.train.features, poisoned.series(), hyperparameter)
        .map_err(|err| (CellStage::Train, err))?;
    let predicted = model
        .predict(&data.eval.features)
        .map_err(|err| (CellStage::Evaluate, err))?;
    let accuracy = accuracy(&predicted, data.eval.labels.labels())
        .map_err(|err| (CellStage::Evaluate, err))?;
    Ok(Evaluated { model, accuracy })
}

fn log_params<T: ExperimentTracker + ?Sized>(
    tracker: &mut T,
    run: &RunHandle,
    plan: &SweepPlan,
    level: PoisonLevel,
    hyperparameter: f64,
) -> Result<(), LfbError> {
    tracker.log_param(run, "poison_level", &level.value().to_string())?;
    tracker.log_param(run, &plan.hyperparameter.name, &hyperparameter.to_string())
}

/// Registration needs an open run, so it precedes `finish_run`. A cell whose
/// finish fails is reported as failed but its model version stays registered.
fn log_cell<T: ExperimentTracker + ?Sized>(
    tracker: &mut T,
    run: &RunHandle,
    plan: &SweepPlan,
    level: PoisonLevel,
    hyperparameter: f64,
    evaluated: &Evaluated,
) -> Result<ModelReference, LfbError> {
    log_params(tracker, run, plan, level, hyperparameter)?;
    tracker.log_metric(run, "accuracy", evaluated.accuracy)?;
    let artifact = evaluated.model.artifact()?;
    let reference = tracker.register_model(run, &artifact, &plan.model_name)?;
    tracker.finish_run(run, RunStatus::Finished)?;
    Ok(reference)
}

fn record_cell<T: ExperimentTracker + ?Sized>(
    tracker: &mut T,
    plan: &SweepPlan,
    level: PoisonLevel,
    hyperparameter: f64,
    evaluated: &Evaluated,
) -> CellOutcome {
    let run = match tracker.start_run(&plan.experiment) {
        Ok(run) => run,
        Err(error) => {
            return CellOutcome::Failed {
                stage: CellStage::Record,
                error,
            }
        }
    };
    match log_cell(tracker, &run, plan, level, hyperparameter, evaluated) {
        Ok(model_reference) => CellOutcome::Completed {
            run: ExperimentRun {
                run_id: run.run_id,
                poison_level: level.value(),
                hyperparameter,
                accuracy: evaluated.accuracy,
                model_reference,
            },
        },
        Err(error) => {
            close_failed(tracker, &run);
            CellOutcome::Failed {
                stage: CellStage::Record,
                error,
            }
        }
    }
}

/// Leaves a failed run in the tracker so the cell's parameters stay visible.
fn record_failed_cell<T: ExperimentTracker + ?Sized>(
    tracker: &mut T,
    plan: &SweepPlan,
    level: PoisonLevel,
    hyperparameter: f64,
) {
    let run = match tracker.start_run(&plan.experiment) {
        Ok(run) => run,
        Err(error) => {
            tracing::warn!(%error, "could not open tracker run for failed cell");
            return;
        }
    };
    if let Err(error) = log_params(tracker, &run, plan, level, hyperparameter) {
        tracing::warn!(%error, run_id = %run.run_id, "could not log failed cell params");
    }
    close_failed(tracker, &run);
}

fn close_failed<T: ExperimentTracker + ?Sized>(tracker: &mut T, run: &RunHandle) {
    if let Err(error) = tracker.finish_run(run, RunStatus::Failed) {
        tracing::warn!(%error, run_id = %run.run_id, "could not mark tracker run as failed");
    }
}
