//! Workflow Definition Module
//!
//! Provides data structures and utilities for defining, parsing, and
//! validating workflow trees.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (WorkflowNode, Task, Workflow)
//! - [`condition`]: Node guards evaluated against the store
//! - [`parser`]: YAML parsing and loading
//! - [`validator`]: Naming and reference checks

pub mod condition;
pub mod model;
pub mod parser;
pub mod validator;

pub use condition::{evaluate, Comparison, Condition};
pub use model::{
    ExecutionMode, NodeBody, NodeKind, Operand, Task, TaskInputs, TaskKind, Workflow,
    WorkflowNode,
};
pub use parser::{load_workflow, parse_workflow};
pub use validator::{validate_workflow, ValidationError};
