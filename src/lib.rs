//! FlowRunner - Workflow Tree Execution Engine
//!
//! Executes hierarchical workflows described in YAML. Flows group nodes and
//! run them sequentially or concurrently; tasks do the work and exchange
//! results through a shared, thread-safe intermediate store.
//!
//! # Architecture
//!
//! The library is organized into six modules:
//!
//! - [`workflow`]: Workflow tree, conditions, YAML loading and validation
//! - [`execution`]: Recursive execution engine
//! - [`tasks`]: Built-in task functions (Delay, DataLoad, Binning, ...)
//! - [`store`]: Intermediate store keyed by producer path and output name
//! - [`monitoring`]: Execution timeline
//! - [`error`]: Error type shared by every module
//!
//! # Example
//!
//! ```rust,no_run
//! use flowrunner::execution::Engine;
//! use flowrunner::load_workflow;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load and validate a workflow from YAML
//!     let workflow = load_workflow("milestone.yaml")?;
//!
//!     // Execute it
//!     let mut engine = Engine::new(workflow);
//!     engine.run()?;
//!
//!     println!("{}", engine.timeline().gantt_chart());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod monitoring;
pub mod store;
pub mod tasks;
pub mod workflow;

// Re-export commonly used types
pub use error::{Result, WorkflowError};
pub use execution::engine::Engine;
pub use workflow::model::{Workflow, WorkflowNode};
pub use workflow::parser::load_workflow;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "FlowRunner";
