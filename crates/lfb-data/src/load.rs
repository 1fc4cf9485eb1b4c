use std::fs::File;
use std::io::Read;

use csv::ReaderBuilder;
use lfb_core::errors::{ErrorInfo, LfbError};
use lfb_core::{FeatureMatrix, Label, LabelSeries};

use crate::{Dataset, DatasetConfig};

fn wrap_csv(code: &str, err: csv::Error) -> LfbError {
    LfbError::Dataset(ErrorInfo::new(code, "CSV dataset failure").with_hint(err.to_string()))
}

/// Loads the dataset described by `config` from disk.
pub fn load_csv(config: &DatasetConfig) -> Result<Dataset, LfbError> {
    let file = File::open(&config.path).map_err(|err| {
        LfbError::Dataset(
            ErrorInfo::new("dataset-open", "failed to open dataset")
                .with_context("path", config.path.display().to_string())
                .with_hint(err.to_string()),
        )
    })?;
    let dataset = read_csv(file, &config.features, &config.label)?;
    tracing::info!(
        path = %config.path.display(),
        rows = dataset.len(),
        columns = dataset.column_count(),
        "loaded dataset"
    );
    Ok(dataset)
}

/// Parses a headed CSV stream into a [`Dataset`].
pub fn read_csv<R: Read>(reader: R, features: &[String], label: &str) -> Result<Dataset, LfbError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let header: Vec<String> = reader
        .headers()
        .map_err(|err| wrap_csv("dataset-header", err))?
        .iter()
        .map(|name| name.to_string())
        .collect();
    let column = |name: &str| -> Result<usize, LfbError> {
        header.iter().position(|candidate| candidate == name).ok_or_else(|| {
            LfbError::Dataset(
                ErrorInfo::new("dataset-column", "configured column missing from header")
                    .with_context("column", name)
                    .with_context("header", header.join(",")),
            )
        })
    };
    let feature_columns = features
        .iter()
        .map(|name| column(name))
        .collect::<Result<Vec<_>, _>>()?;
    let label_column = column(label)?;

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for (record_idx, result) in reader.records().enumerate() {
        // 1-based file line; the header occupies line 1.
        let line = (record_idx + 2).to_string();
        let record = result.map_err(|err| wrap_csv("dataset-record", err))?;
        let mut values = Vec::with_capacity(feature_columns.len());
        for (&idx, name) in feature_columns.iter().zip(features) {
            let raw = record.get(idx).unwrap_or_default();
            let value = raw.parse::<f64>().map_err(|err| {
                LfbError::Dataset(
                    ErrorInfo::new("dataset-parse", "feature value is not numeric")
                        .with_context("line", line.as_str())
                        .with_context("column", name.as_str())
                        .with_context("value", raw)
                        .with_hint(err.to_string()),
                )
            })?;
            values.push(value);
        }
        let raw_label = record.get(label_column).unwrap_or_default();
        if raw_label.is_empty() {
            return Err(LfbError::Dataset(
                ErrorInfo::new("dataset-label", "label value is empty")
                    .with_context("line", line.as_str())
                    .with_context("column", label),
            ));
        }
        rows.push(values);
        labels.push(Label::from(raw_label));
    }

    let features = FeatureMatrix::new(features.to_vec(), rows)?;
    Dataset::new(header, features, LabelSeries::from_labels(labels))
}
