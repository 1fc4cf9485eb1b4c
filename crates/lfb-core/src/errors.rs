//! Structured error types shared across LFB crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`LfbError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, row numbers, levels, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the LFB workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum LfbError {
    /// Invalid poisoning arguments.
    #[error("poison error: {0}")]
    Poison(ErrorInfo),
    /// Dataset loading, parsing, and splitting errors.
    #[error("dataset error: {0}")]
    Dataset(ErrorInfo),
    /// Classifier training, prediction, and restore errors.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// Experiment tracker write errors.
    #[error("tracker error: {0}")]
    Tracker(ErrorInfo),
    /// Model registry resolution errors.
    #[error("registry error: {0}")]
    Registry(ErrorInfo),
    /// Configuration and plan validation errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl LfbError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            LfbError::Poison(info)
            | LfbError::Dataset(info)
            | LfbError::Model(info)
            | LfbError::Tracker(info)
            | LfbError::Registry(info)
            | LfbError::Config(info)
            | LfbError::Serde(info) => info,
        }
    }

    /// Returns the serialized family name of the error.
    pub fn family(&self) -> &'static str {
        match self {
            LfbError::Poison(_) => "Poison",
            LfbError::Dataset(_) => "Dataset",
            LfbError::Model(_) => "Model",
            LfbError::Tracker(_) => "Tracker",
            LfbError::Registry(_) => "Registry",
            LfbError::Config(_) => "Config",
            LfbError::Serde(_) => "Serde",
        }
    }
}
