//! Workflow Validation
//!
//! Structural checks run once, when a tree becomes a [`Workflow`]:
//! - Node names are non-empty, dot-free, and unique among siblings
//! - Tasks only declare outputs their kind can produce
//! - Every store reference (task inputs and conditions) names an output
//!   some other task in the tree publishes, of the shape the reader needs
//!
//! Catching unresolved references here means a run never fails halfway with
//! a `KeyNotFound` that was visible in the tree all along.
//!
//! [`Workflow`]: super::model::Workflow

use std::collections::HashSet;
use std::fmt;

use log::{debug, info};

use super::model::{TaskInputs, WorkflowNode, PATH_SEPARATOR};
use crate::error::{Result, WorkflowError};
use crate::store::{OutputName, StoreKey};

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The root, or a child of the given flow, has an empty name.
    EmptyName(String),
    InvalidName(String),
    DuplicateName { parent: String, name: String },
    UnsupportedOutput { node: String, output: OutputName },
    UnresolvedReference { node: String, reference: String },
    SelfReference { node: String, reference: String },
    /// A table was referenced where a count is read, or the reverse.
    WrongValueKind {
        node: String,
        reference: String,
        expected: &'static str,
    },
    EmptyMerge(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName(parent) if parent.is_empty() => {
                write!(f, "The workflow root has an empty name")
            }
            Self::EmptyName(parent) => write!(f, "Flow '{}' has a child with an empty name", parent),
            Self::InvalidName(name) => {
                write!(f, "Name '{}' must not contain '{}' or whitespace", name, PATH_SEPARATOR)
            }
            Self::DuplicateName { parent, name } => {
                write!(f, "Flow '{}' has more than one child named '{}'", parent, name)
            }
            Self::UnsupportedOutput { node, output } => {
                write!(f, "Task '{}' declares output '{}' which it cannot produce", node, output)
            }
            Self::UnresolvedReference { node, reference } => write!(
                f,
                "'{}' references '{}' but no task publishes it",
                node, reference
            ),
            Self::SelfReference { node, reference } => {
                write!(f, "'{}' references its own output '{}'", node, reference)
            }
            Self::WrongValueKind {
                node,
                reference,
                expected,
            } => write!(f, "'{}' needs a {} but '{}' is not one", node, expected, reference),
            Self::EmptyMerge(node) => write!(f, "Task '{}' merges no datasets", node),
        }
    }
}

/// Validates a tree whose paths have already been assigned.
pub fn validate_workflow(root: &WorkflowNode) -> Result<()> {
    info!(
        "Validating workflow '{}' with {} nodes",
        root.path(),
        root.node_count()
    );

    let mut errors = Vec::new();

    if root.name().is_empty() {
        errors.push(ValidationError::EmptyName(String::new()));
    } else {
        check_name(root, &mut errors);
    }
    check_structure(root, &mut errors);

    let published = published_keys(root);
    debug!("{} store keys published by tasks", published.len());

    root.visit(&mut |node| check_references(node, &published, &mut errors));

    if errors.is_empty() {
        info!("Workflow '{}' is valid", root.path());
        Ok(())
    } else {
        Err(WorkflowError::Validation(errors))
    }
}

fn check_name(node: &WorkflowNode, errors: &mut Vec<ValidationError>) {
    let name = node.name();
    if name.contains(PATH_SEPARATOR) || name.chars().any(char::is_whitespace) {
        errors.push(ValidationError::InvalidName(name.to_string()));
    }
}

/// Checks names and declared outputs across the whole subtree.
fn check_structure(node: &WorkflowNode, errors: &mut Vec<ValidationError>) {
    if let Some(task) = node.as_task() {
        for output in task.declared_outputs().unwrap_or_default() {
            if !task.kind().supported_outputs().contains(output) {
                errors.push(ValidationError::UnsupportedOutput {
                    node: node.path().to_string(),
                    output: *output,
                });
            }
        }

        if let TaskInputs::MergeResults { datasets, .. } = task.inputs() {
            if datasets.is_empty() {
                errors.push(ValidationError::EmptyMerge(node.path().to_string()));
            }
        }
    }

    let mut seen = HashSet::new();
    for child in node.children() {
        if child.name().is_empty() {
            errors.push(ValidationError::EmptyName(node.path().to_string()));
        } else {
            check_name(child, errors);
            if !seen.insert(child.name()) {
                errors.push(ValidationError::DuplicateName {
                    parent: node.path().to_string(),
                    name: child.name().to_string(),
                });
            }
        }

        check_structure(child, errors);
    }
}

fn published_keys(root: &WorkflowNode) -> HashSet<StoreKey> {
    let mut keys = HashSet::new();
    root.visit(&mut |node| keys.extend(node.produced_keys()));
    keys
}

fn check_references(
    node: &WorkflowNode,
    published: &HashSet<StoreKey>,
    errors: &mut Vec<ValidationError>,
) {
    // Delay prints a count; every other task reads tables.
    let mut references: Vec<(&StoreKey, bool)> = node
        .as_task()
        .map(|task| {
            let wants_table = !matches!(task.inputs(), TaskInputs::Delay { .. });
            task.inputs()
                .references()
                .into_iter()
                .map(|key| (key, wants_table))
                .collect()
        })
        .unwrap_or_default();

    if let Some(condition) = node.condition() {
        references.push((condition.key(), false));
    }

    for (key, wants_table) in references {
        if key.producer() == node.path() {
            errors.push(ValidationError::SelfReference {
                node: node.path().to_string(),
                reference: key.to_string(),
            });
        } else if !published.contains(key) {
            errors.push(ValidationError::UnresolvedReference {
                node: node.path().to_string(),
                reference: key.to_string(),
            });
        } else if key.output().is_table() != wants_table {
            errors.push(ValidationError::WrongValueKind {
                node: node.path().to_string(),
                reference: key.to_string(),
                expected: if wants_table { "table" } else { "count" },
            });
        }
    }
}
