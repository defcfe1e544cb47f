//! Built-in Task Functions
//!
//! Each task works only through the intermediate store and the filesystem:
//! it reads its inputs by key, and publishes its outputs under its own path.
//!
//! - [`delay`]: Log a value, then sleep
//! - [`data_load`]: Load integer rows from a CSV file
//! - [`binning`]: Assign bincodes to rows from a rule file
//! - [`merge`]: Combine binned datasets by bincode precedence
//! - [`export`]: Write a dataset to a CSV file

pub mod binning;
pub mod data_load;
pub mod delay;
pub mod export;
pub mod merge;

use log::debug;

use crate::store::{IntermediateStore, OutputName, StoreKey, StoreValue};
use crate::workflow::Task;

/// Column holding the measured signal.
pub const SIGNAL_COLUMN: usize = 3;

/// Column holding the assigned bincode.
pub const BINCODE_COLUMN: usize = 4;

/// Bincode of a row no rule matched.
pub const UNBINNED: i64 = -1;

/// Header of exported result files.
pub const EXPORT_HEADER: [&str; 5] = ["Id", "X", "Y", "Signal", "Bincode"];

/// What a task function sees of the node it runs for.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub path: &'a str,
    pub task: &'a Task,
    pub store: &'a IntermediateStore,
}

impl<'a> TaskContext<'a> {
    pub fn new(path: &'a str, task: &'a Task, store: &'a IntermediateStore) -> Self {
        Self { path, task, store }
    }

    /// Writes an output under this node's path if the task publishes it.
    pub fn publish(&self, output: OutputName, value: StoreValue) {
        if self.task.writes(output) {
            self.store.put(StoreKey::new(self.path, output), value);
        } else {
            debug!("{}: output {} not declared, not published", self.path, output);
        }
    }
}
