//! Workflow Execution Module
//!
//! Runs workflow trees: recursive node execution, per-run shared state,
//! and dispatch of task nodes to their task functions.
//!
//! # Architecture
//!
//! - [`engine`]: Recursive node execution and the [`Engine`] entry point
//! - [`context`]: Store, timeline and locks shared by one run
//! - [`task`]: Task node dispatch

pub mod context;
pub mod engine;
pub mod task;

pub use context::RunContext;
pub use engine::Engine;
