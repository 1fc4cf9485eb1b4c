//! Evaluation metrics computed against the clean holdout.

use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::Label;
use serde::{Deserialize, Serialize};

/// Correct and total prediction counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfusionCounts {
    /// Predictions equal to the ground truth.
    pub correct: usize,
    /// Number of compared predictions.
    pub total: usize,
}

impl ConfusionCounts {
    /// Counts matches between `predicted` and `truth`.
    pub fn from_predictions(predicted: &[Label], truth: &[Label]) -> Result<Self, LfbError> {
        if predicted.len() != truth.len() {
            return Err(LfbError::Model(
                ErrorInfo::new("metric-length", "prediction and ground truth lengths differ")
                    .with_context("predicted", predicted.len().to_string())
                    .with_context("truth", truth.len().to_string()),
            ));
        }
        let correct = predicted
            .iter()
            .zip(truth)
            .filter(|(pred, actual)| pred == actual)
            .count();
        Ok(Self {
            correct,
            total: truth.len(),
        })
    }

    /// Fraction of correct predictions.
    pub fn accuracy(&self) -> Result<f64, LfbError> {
        if self.total == 0 {
            return Err(LfbError::Model(ErrorInfo::new(
                "metric-empty",
                "accuracy is undefined on an empty evaluation set",
            )));
        }
        Ok(self.correct as f64 / self.total as f64)
    }
}

/// Fraction of `predicted` labels equal to `truth`.
pub fn accuracy(predicted: &[Label], truth: &[Label]) -> Result<f64, LfbError> {
    ConfusionCounts::from_predictions(predicted, truth)?.accuracy()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<Label> {
        values.iter().map(|value| Label::from(*value)).collect()
    }

    #[test]
    fn test_accuracy_perfect_and_partial() {
        let truth = labels(&["a", "b", "a", "c"]);
        assert!((accuracy(&truth, &truth).unwrap() - 1.0).abs() < 1e-12);
        let predicted = labels(&["a", "a", "a", "a"]);
        assert!((accuracy(&predicted, &truth).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_accuracy_rejects_mismatch_and_empty() {
        let err = accuracy(&labels(&["a"]), &labels(&["a", "b"])).unwrap_err();
        assert_eq!(err.info().code, "metric-length");
        let err = accuracy(&[], &[]).unwrap_err();
        assert_eq!(err.info().code, "metric-empty");
    }
}
