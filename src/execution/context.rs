//! Per-run shared state.

use std::sync::Mutex;
use std::time::Duration;

use crate::monitoring::ExecutionTimeline;
use crate::store::IntermediateStore;

/// Default length of one delay unit.
pub const DEFAULT_DELAY_UNIT: Duration = Duration::from_secs(1);

/// Everything the nodes of one run share.
///
/// Borrowed by every branch of the run; concurrent branches only touch it
/// through the store, the timeline and the binning lock.
#[derive(Debug)]
pub struct RunContext {
    store: IntermediateStore,
    timeline: ExecutionTimeline,
    binning_lock: Mutex<()>,
    delay_unit: Duration,
}

impl RunContext {
    pub fn new(delay_unit: Duration) -> Self {
        Self {
            store: IntermediateStore::new(),
            timeline: ExecutionTimeline::new(),
            binning_lock: Mutex::new(()),
            delay_unit,
        }
    }

    pub fn store(&self) -> &IntermediateStore {
        &self.store
    }

    pub fn timeline(&self) -> &ExecutionTimeline {
        &self.timeline
    }

    /// Serializes binning work across concurrent branches.
    pub fn binning_lock(&self) -> &Mutex<()> {
        &self.binning_lock
    }

    pub fn delay_unit(&self) -> Duration {
        self.delay_unit
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_UNIT)
    }
}
