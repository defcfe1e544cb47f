//! Intermediate Result Store
//!
//! The only channel through which tasks exchange data. Producers write a
//! value under their own path; consumers read it by key. The store is
//! internally synchronized, so tasks running on different branches of a
//! concurrent flow can share one instance through a plain reference.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;

use super::key::StoreKey;
use crate::error::{Result, WorkflowError};

/// A single data row: integer fields in column order.
pub type Row = Vec<i64>;

/// An ordered sequence of rows, shared immutably between readers.
pub type Table = Arc<Vec<Row>>;

/// A value produced by a task.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Table(Table),
    Count(i64),
}

impl StoreValue {
    pub fn table(rows: Vec<Row>) -> Self {
        Self::Table(Arc::new(rows))
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{}", n),
            Self::Table(rows) => write!(f, "<table: {} rows>", rows.len()),
        }
    }
}

/// Concurrency-safe key/value store for one workflow run.
#[derive(Debug, Default)]
pub struct IntermediateStore {
    entries: RwLock<HashMap<StoreKey, StoreValue>>,
}

impl IntermediateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value under the same key.
    pub fn put(&self, key: StoreKey, value: StoreValue) {
        debug!("Store put: {} = {}", key, value);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    /// Looks up a value.
    ///
    /// Tables are reference-counted, so this never copies row data.
    pub fn get(&self, key: &StoreKey) -> Result<StoreValue> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| WorkflowError::KeyNotFound(key.to_string()))
    }

    pub fn get_table(&self, key: &StoreKey) -> Result<Table> {
        match self.get(key)? {
            StoreValue::Table(rows) => Ok(rows),
            StoreValue::Count(_) => Err(WorkflowError::TypeMismatch {
                key: key.to_string(),
                expected: "table",
            }),
        }
    }

    pub fn get_count(&self, key: &StoreKey) -> Result<i64> {
        match self.get(key)? {
            StoreValue::Count(n) => Ok(n),
            StoreValue::Table(_) => Err(WorkflowError::TypeMismatch {
                key: key.to_string(),
                expected: "count",
            }),
        }
    }

    pub fn contains(&self, key: &StoreKey) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Returns all keys, sorted.
    pub fn keys(&self) -> Vec<StoreKey> {
        let mut keys: Vec<StoreKey> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
