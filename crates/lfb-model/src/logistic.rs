use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::{
    Classifier, FeatureMatrix, Label, LabelSeries, ModelArtifact, SchemaVersion, TrainedModel,
};
use serde::{Deserialize, Serialize};

use crate::ModelConfig;

/// Family name written into logistic regression artifacts.
pub const LOGISTIC_FAMILY: &str = "logistic-regression";

fn model_error(code: &str, message: &str) -> LfbError {
    LfbError::Model(ErrorInfo::new(code, message))
}

/// Maps each label to its position in `classes`.
fn class_targets(classes: &[Label], labels: &[Label]) -> Result<Vec<usize>, LfbError> {
    labels
        .iter()
        .map(|label| {
            classes.iter().position(|class| class == label).ok_or_else(|| {
                LfbError::Model(
                    ErrorInfo::new("model-classes", "label is not one of the model classes")
                        .with_context("label", label.as_str()),
                )
            })
        })
        .collect()
}

/// Multinomial logistic regression with an L2 penalty scaled by `1 / C`.
///
/// Features are standardised with training statistics, weights start at zero
/// and are fitted with full-batch gradient descent, so training is fully
/// deterministic for a given input.
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    config: ModelConfig,
}

impl LogisticRegression {
    /// Creates a classifier with the given optimiser settings.
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    /// Optimiser settings.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Fits a model, returning the concrete type.
    pub fn fit(
        &self,
        features: &FeatureMatrix,
        labels: &LabelSeries,
        c: f64,
    ) -> Result<LogisticModel, LfbError> {
        if !(c.is_finite() && c > 0.0) {
            return Err(LfbError::Model(
                ErrorInfo::new("model-c-invalid", "inverse regularisation C must be positive")
                    .with_context("C", c.to_string()),
            ));
        }
        if features.len() != labels.len() {
            return Err(LfbError::Model(
                ErrorInfo::new("model-length", "feature and label row counts differ")
                    .with_context("features", features.len().to_string())
                    .with_context("labels", labels.len().to_string()),
            ));
        }
        let mut classes = labels.classes();
        classes.sort();
        if classes.len() < 2 {
            return Err(LfbError::Model(
                ErrorInfo::new("model-classes", "training labels contain fewer than two classes")
                    .with_context("classes", classes.len().to_string()),
            ));
        }

        let (means, scales) = standardisation(features);
        let inputs: Vec<Vec<f64>> = features
            .rows()
            .iter()
            .map(|row| augment(row, &means, &scales))
            .collect();
        let targets = class_targets(&classes, labels.labels())?;

        let n = inputs.len() as f64;
        let width = features.width() + 1;
        let mut weights = vec![vec![0.0; width]; classes.len()];
        let mut iterations = 0;
        for _ in 0..self.config.max_iter {
            iterations += 1;
            let mut gradient = vec![vec![0.0; width]; classes.len()];
            for (input, &target) in inputs.iter().zip(&targets) {
                let probabilities = softmax(&scores(&weights, input));
                for (class, probability) in probabilities.iter().enumerate() {
                    let residual = probability - if class == target { 1.0 } else { 0.0 };
                    for (slot, value) in gradient[class].iter_mut().zip(input) {
                        *slot += residual * value;
                    }
                }
            }
            let mut max_step: f64 = 0.0;
            for (class_weights, class_gradient) in weights.iter_mut().zip(&gradient) {
                for (idx, (weight, grad)) in
                    class_weights.iter_mut().zip(class_gradient).enumerate()
                {
                    // The bias term sits in the last slot and is not penalised.
                    let penalty = if idx + 1 == width { 0.0 } else { *weight / c };
                    let step = (grad + penalty) / n;
                    max_step = max_step.max(step.abs());
                    *weight -= self.config.learning_rate * step;
                }
            }
            if max_step < self.config.tolerance {
                break;
            }
        }
        tracing::debug!(c, iterations, classes = classes.len(), "fitted logistic regression");

        Ok(LogisticModel {
            params: LogisticParams {
                means,
                scales,
                weights,
            },
            classes,
        })
    }
}

impl Classifier for LogisticRegression {
    fn family(&self) -> &str {
        LOGISTIC_FAMILY
    }

    fn train(
        &self,
        features: &FeatureMatrix,
        labels: &LabelSeries,
        hyperparameter: f64,
    ) -> Result<Box<dyn TrainedModel>, LfbError> {
        Ok(Box::new(self.fit(features, labels, hyperparameter)?))
    }

    fn restore(&self, artifact: &ModelArtifact) -> Result<Box<dyn TrainedModel>, LfbError> {
        Ok(Box::new(LogisticModel::from_artifact(artifact)?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LogisticParams {
    means: Vec<f64>,
    scales: Vec<f64>,
    /// One row per class: feature weights followed by the bias.
    weights: Vec<Vec<f64>>,
}

/// Fitted logistic regression.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    params: LogisticParams,
    classes: Vec<Label>,
}

impl LogisticModel {
    /// Number of input features.
    pub fn feature_count(&self) -> usize {
        self.params.means.len()
    }

    /// Classes in model order.
    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    /// Rebuilds a model from its registry artifact.
    pub fn from_artifact(artifact: &ModelArtifact) -> Result<Self, LfbError> {
        if artifact.family != LOGISTIC_FAMILY {
            return Err(LfbError::Model(
                ErrorInfo::new("model-family", "artifact belongs to another classifier family")
                    .with_context("expected", LOGISTIC_FAMILY)
                    .with_context("found", artifact.family.as_str()),
            ));
        }
        let params: LogisticParams = serde_json::from_value(artifact.payload.clone())
            .map_err(|err| LfbError::Serde(ErrorInfo::new("model-payload", err.to_string())))?;
        let width = artifact.feature_count;
        let consistent = params.means.len() == width
            && params.scales.len() == width
            && params.weights.len() == artifact.classes.len()
            && params.weights.iter().all(|row| row.len() == width + 1);
        if !consistent || artifact.classes.len() < 2 {
            return Err(model_error(
                "model-shape",
                "artifact payload does not match its feature count and classes",
            ));
        }
        Ok(Self {
            params,
            classes: artifact.classes.clone(),
        })
    }

    /// Predicts the label of a single feature row.
    pub fn predict_row(&self, row: &[f64]) -> Result<Label, LfbError> {
        if row.len() != self.feature_count() {
            return Err(LfbError::Model(
                ErrorInfo::new("model-feature-count", "feature row width does not match model")
                    .with_context("expected", self.feature_count().to_string())
                    .with_context("found", row.len().to_string()),
            ));
        }
        let input = augment(row, &self.params.means, &self.params.scales);
        let scores = scores(&self.params.weights, &input);
        let mut best = 0;
        for (idx, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = idx;
            }
        }
        Ok(self.classes[best].clone())
    }
}

impl TrainedModel for LogisticModel {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<Label>, LfbError> {
        features
            .rows()
            .iter()
            .map(|row| self.predict_row(row))
            .collect()
    }

    fn artifact(&self) -> Result<ModelArtifact, LfbError> {
        let payload = serde_json::to_value(&self.params)
            .map_err(|err| LfbError::Serde(ErrorInfo::new("model-serialize", err.to_string())))?;
        Ok(ModelArtifact {
            family: LOGISTIC_FAMILY.to_string(),
            schema_version: SchemaVersion::new(1, 0, 0),
            feature_count: self.feature_count(),
            classes: self.classes.clone(),
            payload,
        })
    }
}

fn standardisation(features: &FeatureMatrix) -> (Vec<f64>, Vec<f64>) {
    let width = features.width();
    let n = features.len().max(1) as f64;
    let mut means = vec![0.0; width];
    for row in features.rows() {
        for (mean, value) in means.iter_mut().zip(row) {
            *mean += value / n;
        }
    }
    let mut scales = vec![0.0; width];
    for row in features.rows() {
        for ((scale, mean), value) in scales.iter_mut().zip(&means).zip(row) {
            *scale += (value - mean).powi(2) / n;
        }
    }
    for scale in &mut scales {
        *scale = scale.sqrt();
        if *scale <= f64::EPSILON {
            *scale = 1.0;
        }
    }
    (means, scales)
}

fn augment(row: &[f64], means: &[f64], scales: &[f64]) -> Vec<f64> {
    let mut input: Vec<f64> = row
        .iter()
        .zip(means.iter().zip(scales))
        .map(|(value, (mean, scale))| (value - mean) / scale)
        .collect();
    input.push(1.0);
    input
}

fn scores(weights: &[Vec<f64>], input: &[f64]) -> Vec<f64> {
    weights
        .iter()
        .map(|row| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>())
        .collect()
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|score| (score - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|value| value / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_follow_class_positions() {
        let classes = vec![Label::from("a"), Label::from("b")];
        let labels = vec![Label::from("b"), Label::from("a"), Label::from("b")];
        assert_eq!(class_targets(&classes, &labels).unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn unknown_label_is_not_mapped_to_first_class() {
        let classes = vec![Label::from("a"), Label::from("b")];
        let labels = vec![Label::from("a"), Label::from("c")];
        let err = class_targets(&classes, &labels).unwrap_err();
        assert_eq!(err.info().code, "model-classes");
        assert_eq!(err.info().context.get("label").map(String::as_str), Some("c"));
    }
}
