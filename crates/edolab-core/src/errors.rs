//! Structured error types shared across edolab crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`LabError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, generations, quantiles, etc.).
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

/// Canonical error type for trial summarisation.
///
/// Variants map onto the failure scopes of the pipeline: configuration errors
/// abort before any trial is read, trial errors abort a single trial, schema
/// mismatches drop a single row and missing individuals fail a single
/// quantile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "detail")]
pub enum LabError {
    /// Distribution schema missing, empty or structurally invalid.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// Fitness log missing, unreadable or lacking required columns.
    #[error("corrupt trial: {0}")]
    CorruptTrial(ErrorInfo),
    /// Individual references an unknown family or holds undecodable cells.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(ErrorInfo),
    /// Representative selection over a table without rows.
    #[error("empty table: {0}")]
    EmptyTable(ErrorInfo),
    /// Requested quantile outside `[0, 1]`.
    #[error("invalid quantile: {0}")]
    InvalidQuantile(ErrorInfo),
    /// Selected representative no longer exists on disk.
    #[error("missing individual: {0}")]
    MissingIndividual(ErrorInfo),
    /// Filesystem, encoding and archive failures.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl LabError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            LabError::Configuration(info)
            | LabError::CorruptTrial(info)
            | LabError::SchemaMismatch(info)
            | LabError::EmptyTable(info)
            | LabError::InvalidQuantile(info)
            | LabError::MissingIndividual(info)
            | LabError::Io(info) => info,
        }
    }

    /// Shorthand for an [`LabError::Io`] carrying the display form of `err`.
    pub fn io(code: &str, err: impl Display) -> Self {
        LabError::Io(ErrorInfo::new(code, err.to_string()))
    }
}
