//! Intermediate Store Module
//!
//! Shared, run-scoped storage for values that tasks produce and consume.
//!
//! - [`key`]: Structured keys and `$(...)` reference syntax
//! - [`intermediate`]: The synchronized store itself

pub mod intermediate;
pub mod key;

pub use intermediate::{IntermediateStore, Row, StoreValue, Table};
pub use key::{is_reference, OutputName, StoreKey};
