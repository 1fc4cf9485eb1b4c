//! Dataset collaborator: CSV loading and the single clean train/evaluation split.

mod config;
mod load;
mod split;

use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::{FeatureMatrix, LabelSeries};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use config::DatasetConfig;
pub use load::{load_csv, read_csv};
pub use split::{split, Partition, SplitDataset};

/// Clean dataset as loaded from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    header: Vec<String>,
    features: FeatureMatrix,
    labels: LabelSeries,
}

impl Dataset {
    /// Assembles a dataset, checking features and labels have equal length.
    pub fn new(
        header: Vec<String>,
        features: FeatureMatrix,
        labels: LabelSeries,
    ) -> Result<Self, LfbError> {
        if features.len() != labels.len() {
            return Err(LfbError::Dataset(
                ErrorInfo::new("dataset-length", "feature and label row counts differ")
                    .with_context("features", features.len().to_string())
                    .with_context("labels", labels.len().to_string()),
            ));
        }
        Ok(Self {
            header,
            features,
            labels,
        })
    }

    /// Every column present in the source header.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Number of columns present in the source header.
    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// Feature matrix.
    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    /// Clean label series.
    pub fn labels(&self) -> &LabelSeries {
        &self.labels
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true when the dataset holds no rows.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Stable SHA-256 fingerprint over header, features and labels.
    pub fn fingerprint(&self) -> Result<String, LfbError> {
        let bytes = serde_json::to_vec(self).map_err(|err| {
            LfbError::Serde(ErrorInfo::new("dataset-fingerprint", err.to_string()))
        })?;
        Ok(format!("{:x}", Sha256::digest(bytes)))
    }
}
