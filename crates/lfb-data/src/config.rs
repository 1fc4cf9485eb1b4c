use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the clean dataset lives and how it is partitioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// CSV file with a header row.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Numeric feature columns, in model input order.
    #[serde(default = "default_features")]
    pub features: Vec<String>,
    /// Categorical label column.
    #[serde(default = "default_label")]
    pub label: String,
    /// Fraction of rows held out for evaluation.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Seed of the one-off shuffle preceding the split.
    #[serde(default = "default_split_seed")]
    pub split_seed: u64,
}

fn default_path() -> PathBuf {
    PathBuf::from("data/iris.csv")
}

fn default_features() -> Vec<String> {
    ["sepal_length", "sepal_width", "petal_length", "petal_width"]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn default_label() -> String {
    "species".to_string()
}

fn default_test_fraction() -> f64 {
    0.3
}

fn default_split_seed() -> u64 {
    42
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            features: default_features(),
            label: default_label(),
            test_fraction: default_test_fraction(),
            split_seed: default_split_seed(),
        }
    }
}
