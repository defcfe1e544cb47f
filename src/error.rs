//! Error Types
//!
//! Every fallible operation in the crate returns [`WorkflowError`]. None of
//! these errors are retried internally: a failing task aborts, and the failure
//! travels up through its enclosing flows.

use std::path::PathBuf;

use thiserror::Error;

use crate::workflow::validator::ValidationError;

/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors raised while loading, validating, or executing a workflow.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// A store reference did not resolve.
    #[error("Key not found in intermediate store: '{0}'")]
    KeyNotFound(String),

    /// A store entry exists but holds the other kind of value.
    #[error("Store entry '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("Malformed store reference '{reference}': {reason}")]
    MalformedReference { reference: String, reason: String },

    #[error("Malformed condition '{condition}': {reason}")]
    MalformedCondition { condition: String, reason: String },

    #[error("Malformed rule file '{}' (line {line}): {reason}", path.display())]
    MalformedRuleFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Malformed precedence file '{}': {reason}", path.display())]
    MalformedPrecedenceFile { path: PathBuf, reason: String },

    #[error("Malformed data file '{}' (line {line}): {reason}", path.display())]
    MalformedDataFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A dataset row does not have the shape the task needs.
    #[error("Dataset '{key}' row {row}: {reason}")]
    MalformedDataset {
        key: String,
        row: usize,
        reason: String,
    },

    #[error("Datasets have different row counts: '{first}' has {expected}, '{other}' has {actual}")]
    RowCountMismatch {
        first: String,
        expected: usize,
        other: String,
        actual: usize,
    },

    #[error("I/O failure on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV failure on '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The workflow description could not be turned into a tree.
    #[error("Failed to parse workflow: {0}")]
    Parse(String),

    #[error("Invalid workflow: {}", summarize(.0))]
    Validation(Vec<ValidationError>),

    #[error("Branch '{0}' panicked during concurrent execution")]
    BranchPanicked(String),
}

impl WorkflowError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_yaml::Error> for WorkflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
