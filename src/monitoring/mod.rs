//! Execution Monitoring Module
//!
//! Records the execution trace of a workflow run.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Ordered Entry/Skipped/Exit events, Gantt chart
//!   rendering, and JSON export

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
