//! Label poisoning, sweep orchestration, and experiment tracking for LFB.

mod config;
mod hash;
mod poison;
mod registry;
mod serde;
mod sweep;
mod tracker;

pub use config::{load_config, ExperimentConfig};
pub use hash::stable_hash_string;
pub use poison::{poison, PoisonLevel, PoisonOutcome, PoisonStatus};
pub use registry::{CsvTracker, SqliteTracker};
pub use sweep::{
    run_sweep, CellOutcome, CellStage, ExperimentRun, HyperparameterGrid, LevelReport, Scheduler,
    SweepCellReport, SweepPlan, SweepReport,
};
pub use tracker::{open_tracker, query_runs, MemoryTracker, Query, RunRecord, Table, TrackerConfig};

pub use crate::serde::{from_json_slice, from_yaml_slice, to_canonical_json_bytes};
