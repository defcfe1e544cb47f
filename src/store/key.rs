//! Store Keys and References
//!
//! A store key names one output of one producing node: the node's dotted
//! path plus an [`OutputName`]. In workflow text a key is written as a
//! reference, `$(<path>.<OutputName>)`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WorkflowError};

/// Prefix marking a string as a store reference rather than a literal.
pub const REFERENCE_PREFIX: char = '$';

/// Named outputs a task can publish into the intermediate store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputName {
    DataTable,
    NoOfDefects,
    BinningResultsTable,
    MergedResults,
}

impl OutputName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataTable => "DataTable",
            Self::NoOfDefects => "NoOfDefects",
            Self::BinningResultsTable => "BinningResultsTable",
            Self::MergedResults => "MergedResults",
        }
    }

    /// Whether the output holds a table; `NoOfDefects` is the only count.
    pub fn is_table(&self) -> bool {
        !matches!(self, Self::NoOfDefects)
    }
}

impl fmt::Display for OutputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "DataTable" => Ok(Self::DataTable),
            "NoOfDefects" => Ok(Self::NoOfDefects),
            "BinningResultsTable" => Ok(Self::BinningResultsTable),
            "MergedResults" => Ok(Self::MergedResults),
            other => Err(format!("unknown output name '{}'", other)),
        }
    }
}

/// Identity of a value in the intermediate store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    producer: String,
    output: OutputName,
}

impl StoreKey {
    pub fn new(producer: impl Into<String>, output: OutputName) -> Self {
        Self {
            producer: producer.into(),
            output,
        }
    }

    /// Path of the node that writes this key.
    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn output(&self) -> OutputName {
        self.output
    }

    /// Parses a bare key of the form `<path>.<OutputName>`.
    ///
    /// The output name is the segment after the last dot; everything before
    /// it is the producing node's path.
    pub fn parse(key: &str) -> Result<Self> {
        let malformed = |reason: String| WorkflowError::MalformedReference {
            reference: key.to_string(),
            reason,
        };

        let (producer, output) = key
            .trim()
            .rsplit_once('.')
            .ok_or_else(|| malformed("expected '<path>.<OutputName>'".to_string()))?;

        if producer.is_empty() || producer.split('.').any(|s| s.is_empty()) {
            return Err(malformed("empty path segment".to_string()));
        }

        let output = output.parse::<OutputName>().map_err(malformed)?;
        Ok(Self::new(producer, output))
    }

    /// Parses a reference of the form `$(<path>.<OutputName>)`.
    ///
    /// The `$` prefix is removed, then exactly one leading `(` and one
    /// trailing `)`.
    pub fn from_reference(reference: &str) -> Result<Self> {
        let trimmed = reference.trim();
        let inner = trimmed
            .strip_prefix(REFERENCE_PREFIX)
            .and_then(|s| s.strip_prefix('('))
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| WorkflowError::MalformedReference {
                reference: reference.to_string(),
                reason: "expected '$(<path>.<OutputName>)'".to_string(),
            })?;

        Self::parse(inner)
    }

    /// Renders the key back into reference syntax.
    pub fn to_reference(&self) -> String {
        format!("{}({})", REFERENCE_PREFIX, self)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.producer, self.output)
    }
}

/// Returns true if `value` uses store-reference syntax.
pub fn is_reference(value: &str) -> bool {
    value.trim_start().starts_with(REFERENCE_PREFIX)
}
