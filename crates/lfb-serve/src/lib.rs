//! Prediction boundary: resolves a registered model once and answers requests.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::{
    Classifier, FeatureMatrix, Label, ModelReference, ModelRegistry, ModelVersion, TrainedModel,
};
use serde::{Deserialize, Serialize};

/// One JSON-lines request.
///
/// Features are given either positionally or by column name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PredictRequest {
    Positional { features: Vec<f64> },
    Named(BTreeMap<String, f64>),
}

/// One JSON-lines response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Prediction { prediction: Label },
    Error { error: LfbError },
}

/// A model resolved from the registry at startup.
#[derive(Debug)]
pub struct ModelServer {
    reference: ModelReference,
    columns: Vec<String>,
    model: Box<dyn TrainedModel>,
}

impl ModelServer {
    /// Resolves `name@version` and restores it with `classifier`.
    ///
    /// `columns` names the features in model input order; it is used for
    /// named requests and must match the artifact's feature count.
    pub fn start<R: ModelRegistry + ?Sized>(
        registry: &R,
        classifier: &dyn Classifier,
        name: &str,
        version: ModelVersion,
        columns: Vec<String>,
    ) -> Result<Self, LfbError> {
        tracing::info!(model = name, %version, "loading registered model");
        let registered = registry.resolve(name, version)?;
        if registered.artifact.feature_count != columns.len() {
            return Err(LfbError::Registry(
                ErrorInfo::new("serve-columns", "configured feature columns do not match the model")
                    .with_context("model", registered.reference.uri())
                    .with_context("expected", registered.artifact.feature_count.to_string())
                    .with_context("found", columns.len().to_string()),
            ));
        }
        let model = classifier.restore(&registered.artifact)?;
        tracing::info!(model = %registered.reference, "model ready");
        Ok(Self {
            reference: registered.reference,
            columns,
            model,
        })
    }

    /// Reference of the model being served.
    pub fn reference(&self) -> &ModelReference {
        &self.reference
    }

    /// Feature names in input order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Predicts the label of one feature row.
    pub fn predict(&self, features: &[f64]) -> Result<Label, LfbError> {
        if features.len() != self.columns.len() {
            return Err(LfbError::Model(
                ErrorInfo::new("serve-feature-count", "request has the wrong number of features")
                    .with_context("expected", self.columns.len().to_string())
                    .with_context("found", features.len().to_string()),
            ));
        }
        let matrix = FeatureMatrix::new(self.columns.clone(), vec![features.to_vec()])?;
        self.model
            .predict(&matrix)?
            .into_iter()
            .next()
            .ok_or_else(|| LfbError::Model(ErrorInfo::new("serve-empty", "model returned no prediction")))
    }

    /// Predicts every row of `features`.
    pub fn predict_batch(&self, features: &FeatureMatrix) -> Result<Vec<Label>, LfbError> {
        if features.width() != self.columns.len() {
            return Err(LfbError::Model(
                ErrorInfo::new("serve-feature-count", "batch has the wrong number of features")
                    .with_context("expected", self.columns.len().to_string())
                    .with_context("found", features.width().to_string()),
            ));
        }
        self.model.predict(features)
    }

    /// Answers a decoded request.
    pub fn respond(&self, request: &PredictRequest) -> Result<Label, LfbError> {
        match request {
            PredictRequest::Positional { features } => self.predict(features),
            PredictRequest::Named(values) => {
                let row = self.order_named(values)?;
                self.predict(&row)
            }
        }
    }

    /// Handles one JSON-lines request and renders the JSON response.
    pub fn handle_line(&self, line: &str) -> String {
        let response = match serde_json::from_str::<PredictRequest>(line) {
            Ok(request) => match self.respond(&request) {
                Ok(prediction) => PredictResponse::Prediction { prediction },
                Err(error) => PredictResponse::Error { error },
            },
            Err(err) => PredictResponse::Error {
                error: LfbError::Serde(ErrorInfo::new("serve-request", err.to_string())),
            },
        };
        if let PredictResponse::Error { error } = &response {
            tracing::warn!(%error, "rejected prediction request");
        }
        serde_json::to_string(&response)
            .unwrap_or_else(|_| r#"{"error":"response encoding failed"}"#.to_string())
    }

    /// Serves requests from `input` until EOF, one response line per
    /// non-blank request line. Returns the number of requests answered.
    pub fn serve<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<usize, LfbError> {
        let mut answered = 0;
        for (idx, line) in input.lines().enumerate() {
            let line = line.map_err(|err| io_error("serve-read", idx, err))?;
            if line.trim().is_empty() {
                continue;
            }
            let response = self.handle_line(&line);
            writeln!(output, "{response}").map_err(|err| io_error("serve-write", idx, err))?;
            output.flush().map_err(|err| io_error("serve-write", idx, err))?;
            answered += 1;
        }
        tracing::info!(answered, "input closed; stopping server");
        Ok(answered)
    }

    fn order_named(&self, values: &BTreeMap<String, f64>) -> Result<Vec<f64>, LfbError> {
        if let Some(unknown) = values.keys().find(|key| !self.columns.contains(*key)) {
            return Err(LfbError::Model(
                ErrorInfo::new("serve-feature-unknown", "request names an unknown feature")
                    .with_context("feature", unknown.as_str()),
            ));
        }
        self.columns
            .iter()
            .map(|column| {
                values.get(column).copied().ok_or_else(|| {
                    LfbError::Model(
                        ErrorInfo::new("serve-feature-missing", "request is missing a feature")
                            .with_context("feature", column.as_str()),
                    )
                })
            })
            .collect()
    }
}

fn io_error(code: &str, line: usize, err: std::io::Error) -> LfbError {
    LfbError::Config(
        ErrorInfo::new(code, "prediction stream failure")
            .with_context("line", line.to_string())
            .with_hint(err.to_string()),
    )
}
