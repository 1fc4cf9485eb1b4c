use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::{FeatureMatrix, LabelSeries, RngHandle};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::Dataset;

/// Aligned features and labels for one side of the split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// Feature rows.
    pub features: FeatureMatrix,
    /// Labels aligned with `features`; the index keeps the source row.
    pub labels: LabelSeries,
}

impl Partition {
    /// Number of rows in the partition.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true when the partition holds no rows.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Training partition and the clean evaluation holdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDataset {
    /// Rows whose labels may be poisoned.
    pub train: Partition,
    /// Ground truth rows; never poisoned.
    pub eval: Partition,
}

/// Splits `dataset` once after a seeded shuffle.
///
/// The evaluation side receives `ceil(n * test_fraction)` rows.
pub fn split(dataset: &Dataset, test_fraction: f64, seed: u64) -> Result<SplitDataset, LfbError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(LfbError::Dataset(
            ErrorInfo::new("split-fraction", "test fraction must lie in (0, 1)")
                .with_context("test_fraction", test_fraction.to_string()),
        ));
    }
    let n = dataset.len();
    let n_eval = (n as f64 * test_fraction).ceil() as usize;
    if n_eval == 0 || n_eval >= n {
        return Err(LfbError::Dataset(
            ErrorInfo::new("split-size", "split leaves an empty partition")
                .with_context("rows", n.to_string())
                .with_context("test_fraction", test_fraction.to_string()),
        ));
    }

    let mut positions: Vec<usize> = (0..n).collect();
    let mut rng = RngHandle::from_seed(seed);
    positions.shuffle(&mut rng);
    let (eval_positions, train_positions) = positions.split_at(n_eval);

    let split = SplitDataset {
        train: take(dataset, train_positions)?,
        eval: take(dataset, eval_positions)?,
    };
    tracing::debug!(
        train = split.train.len(),
        eval = split.eval.len(),
        seed,
        "split dataset"
    );
    Ok(split)
}

fn take(dataset: &Dataset, positions: &[usize]) -> Result<Partition, LfbError> {
    let labels = dataset.labels();
    let index = positions.iter().map(|&pos| labels.index()[pos]).collect();
    let values = positions
        .iter()
        .map(|&pos| labels.labels()[pos].clone())
        .collect();
    Ok(Partition {
        features: dataset.features().select(positions),
        labels: LabelSeries::new(index, values)?,
    })
}
