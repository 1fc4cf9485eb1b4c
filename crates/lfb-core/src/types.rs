use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, LfbError};

/// Categorical class label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    /// Creates a label from its textual representation.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered mapping from sample index to class label.
///
/// The `index` column carries the original dataset row of every entry so a
/// series taken from a shuffled partition still identifies its samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LabelSeries {
    index: Vec<usize>,
    labels: Vec<Label>,
}

impl LabelSeries {
    /// Builds a series from parallel index and label columns.
    pub fn new(index: Vec<usize>, labels: Vec<Label>) -> Result<Self, LfbError> {
        if index.len() != labels.len() {
            return Err(LfbError::Dataset(
                ErrorInfo::new("series-length", "index and label columns differ in length")
                    .with_context("index", index.len().to_string())
                    .with_context("labels", labels.len().to_string()),
            ));
        }
        Ok(Self { index, labels })
    }

    /// Builds a series indexed `0..labels.len()`.
    pub fn from_labels(labels: Vec<Label>) -> Self {
        Self {
            index: (0..labels.len()).collect(),
            labels,
        }
    }

    /// Number of entries in the series.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true when the series holds no entries.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Sample indices in series order.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Labels in series order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Label stored at `position`.
    pub fn get(&self, position: usize) -> Option<&Label> {
        self.labels.get(position)
    }

    /// Iterates `(sample index, label)` pairs in series order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Label)> + '_ {
        self.index.iter().copied().zip(self.labels.iter())
    }

    /// Distinct labels in order of first appearance.
    pub fn classes(&self) -> Vec<Label> {
        let mut classes: Vec<Label> = Vec::new();
        for label in &self.labels {
            if !classes.contains(label) {
                classes.push(label.clone());
            }
        }
        classes
    }

    /// Replaces the label at `position`, returning the previous value.
    ///
    /// Panics when `position` is out of bounds.
    pub fn relabel(&mut self, position: usize, label: Label) -> Label {
        std::mem::replace(&mut self.labels[position], label)
    }
}

/// Row-oriented numeric feature matrix with named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Builds a matrix, checking every row matches the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, LfbError> {
        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != columns.len())
        {
            return Err(LfbError::Dataset(
                ErrorInfo::new("feature-width", "feature row width does not match columns")
                    .with_context("row", row.to_string())
                    .with_context("expected", columns.len().to_string())
                    .with_context("found", values.len().to_string()),
            ));
        }
        Ok(Self { columns, rows })
    }

    /// Feature column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of feature columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the matrix holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row-major feature values.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Copies the rows at `positions` into a new matrix.
    pub fn select(&self, positions: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: positions.iter().map(|&pos| self.rows[pos].clone()).collect(),
        }
    }
}
