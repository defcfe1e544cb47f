//! Workflow Data Model
//!
//! A workflow is a tree of activities. Leaves are tasks that run one built-in
//! operation; inner nodes are flows that run their children one after
//! another or all at once.
//!
//! # Example
//!
//! ```
//! use flowrunner::workflow::{ExecutionMode, TaskInputs, Workflow, WorkflowNode};
//! use flowrunner::store::{OutputName, StoreKey};
//!
//! let root = WorkflowNode::flow("root", ExecutionMode::Sequential)
//!     .with_child(WorkflowNode::task(
//!         "Load",
//!         TaskInputs::DataLoad { filename: "defects.csv".into() },
//!     ))
//!     .with_child(WorkflowNode::task(
//!         "Export",
//!         TaskInputs::ExportResults {
//!             dataset: StoreKey::new("root.Load", OutputName::DataTable),
//!             filename: "out.csv".into(),
//!         },
//!     ));
//!
//! let workflow = Workflow::new(root).unwrap();
//! assert!(workflow.find("root.Export").is_some());
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::condition::Condition;
use super::validator::validate_workflow;
use crate::error::Result;
use crate::store::{is_reference, OutputName, StoreKey};

/// Separator between segments of a node path.
pub const PATH_SEPARATOR: char = '.';

/// How a flow runs its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One child at a time, in declared order.
    Sequential,
    /// All children at once, joined before the flow exits.
    Concurrent,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(format!("unknown execution mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Flow,
    Task,
}

/// The closed set of built-in task operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Delay,
    DataLoad,
    Binning,
    MergeResults,
    ExportResults,
}

impl TaskKind {
    /// Outputs this kind of task is able to publish.
    pub fn supported_outputs(&self) -> &'static [OutputName] {
        match self {
            Self::Delay | Self::ExportResults => &[],
            Self::DataLoad => &[OutputName::DataTable, OutputName::NoOfDefects],
            Self::Binning => &[OutputName::BinningResultsTable, OutputName::NoOfDefects],
            Self::MergeResults => &[OutputName::MergedResults],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delay => "Delay",
            Self::DataLoad => "DataLoad",
            Self::Binning => "Binning",
            Self::MergeResults => "MergeResults",
            Self::ExportResults => "ExportResults",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task input that is either used as-is or looked up in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(String),
    Reference(StoreKey),
}

impl Operand {
    /// Interprets `$(...)` text as a reference and anything else as a literal.
    pub fn parse(text: &str) -> Result<Self> {
        if is_reference(text) {
            Ok(Self::Reference(StoreKey::from_reference(text)?))
        } else {
            Ok(Self::Literal(text.to_string()))
        }
    }
}

/// Inputs of a task, one shape per task kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskInputs {
    Delay {
        input: Operand,
        /// Sleep length, in delay units.
        duration: u64,
    },
    DataLoad {
        filename: PathBuf,
    },
    Binning {
        rule_file: PathBuf,
        dataset: StoreKey,
    },
    MergeResults {
        precedence_file: PathBuf,
        datasets: Vec<StoreKey>,
    },
    ExportResults {
        dataset: StoreKey,
        filename: PathBuf,
    },
}

impl TaskInputs {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Delay { .. } => TaskKind::Delay,
            Self::DataLoad { .. } => TaskKind::DataLoad,
            Self::Binning { .. } => TaskKind::Binning,
            Self::MergeResults { .. } => TaskKind::MergeResults,
            Self::ExportResults { .. } => TaskKind::ExportResults,
        }
    }

    /// Store keys these inputs read.
    pub fn references(&self) -> Vec<&StoreKey> {
        match self {
            Self::Delay {
                input: Operand::Reference(key),
                ..
            } => vec![key],
            Self::Delay { .. } | Self::DataLoad { .. } => Vec::new(),
            Self::Binning { dataset, .. } | Self::ExportResults { dataset, .. } => vec![dataset],
            Self::MergeResults { datasets, .. } => datasets.iter().collect(),
        }
    }
}

/// Leaf payload: what to run and which outputs to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    inputs: TaskInputs,
    declared_outputs: Option<Vec<OutputName>>,
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        self.inputs.kind()
    }

    pub fn inputs(&self) -> &TaskInputs {
        &self.inputs
    }

    pub fn declared_outputs(&self) -> Option<&[OutputName]> {
        self.declared_outputs.as_deref()
    }

    /// Outputs the task will publish: the declared set, or everything the
    /// kind supports when nothing was declared.
    pub fn outputs(&self) -> Vec<OutputName> {
        match &self.declared_outputs {
            Some(declared) => declared.clone(),
            None => self.kind().supported_outputs().to_vec(),
        }
    }

    pub fn writes(&self, output: OutputName) -> bool {
        match &self.declared_outputs {
            Some(declared) => declared.contains(&output),
            None => self.kind().supported_outputs().contains(&output),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    Flow {
        mode: ExecutionMode,
        children: Vec<WorkflowNode>,
    },
    Task(Task),
}

/// A node of the activity tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowNode {
    name: String,
    path: String,
    condition: Option<Condition>,
    body: NodeBody,
}

impl WorkflowNode {
    /// Creates an empty flow. An empty flow is legal and does nothing.
    pub fn flow(name: impl Into<String>, mode: ExecutionMode) -> Self {
        Self::with_body(
            name,
            NodeBody::Flow {
                mode,
                children: Vec::new(),
            },
        )
    }

    pub fn task(name: impl Into<String>, inputs: TaskInputs) -> Self {
        Self::with_body(
            name,
            NodeBody::Task(Task {
                inputs,
                declared_outputs: None,
            }),
        )
    }

    fn with_body(name: impl Into<String>, body: NodeBody) -> Self {
        let name = name.into().trim().to_string();
        Self {
            path: name.clone(),
            name,
            condition: None,
            body,
        }
    }

    /// Appends a child. Has no effect on tasks.
    pub fn with_child(mut self, child: WorkflowNode) -> Self {
        if let NodeBody::Flow { children, .. } = &mut self.body {
            children.push(child);
        }
        self
    }

    /// Appends several children in order. Has no effect on tasks.
    pub fn with_children(mut self, nodes: impl IntoIterator<Item = WorkflowNode>) -> Self {
        if let NodeBody::Flow { children, .. } = &mut self.body {
            children.extend(nodes);
        }
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Declares the outputs a task publishes. Has no effect on flows.
    pub fn with_outputs(mut self, outputs: Vec<OutputName>) -> Self {
        if let NodeBody::Task(task) = &mut self.body {
            task.declared_outputs = Some(outputs);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the root. Equal to the name until the node is
    /// placed in a [`Workflow`].
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        match self.body {
            NodeBody::Flow { .. } => NodeKind::Flow,
            NodeBody::Task(_) => NodeKind::Task,
        }
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn execution_mode(&self) -> Option<ExecutionMode> {
        match self.body {
            NodeBody::Flow { mode, .. } => Some(mode),
            NodeBody::Task(_) => None,
        }
    }

    /// Children of a flow; empty for tasks.
    pub fn children(&self) -> &[WorkflowNode] {
        match &self.body {
            NodeBody::Flow { children, .. } => children,
            NodeBody::Task(_) => &[],
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match &self.body {
            NodeBody::Task(task) => Some(task),
            NodeBody::Flow { .. } => None,
        }
    }

    /// Store keys this node will publish when it runs.
    pub fn produced_keys(&self) -> Vec<StoreKey> {
        self.as_task()
            .map(|task| {
                task.outputs()
                    .into_iter()
                    .map(|output| StoreKey::new(self.path.clone(), output))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Visits this node and all descendants, parents before children.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a WorkflowNode)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Finds a node in this subtree by its full path.
    pub fn find(&self, path: &str) -> Option<&WorkflowNode> {
        if self.path == path {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(path))
    }

    /// Number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(WorkflowNode::node_count)
            .sum::<usize>()
    }

    fn assign_paths(&mut self, parent: Option<&str>) {
        self.path = match parent {
            Some(parent) => format!("{}{}{}", parent, PATH_SEPARATOR, self.name),
            None => self.name.clone(),
        };

        if let NodeBody::Flow { children, .. } = &mut self.body {
            for child in children {
                child.assign_paths(Some(&self.path));
            }
        }
    }
}

/// A validated, immutable workflow tree.
#[derive(Debug, Clone)]
pub struct Workflow {
    root: WorkflowNode,
}

impl Workflow {
    /// Assigns every node its path and validates the tree.
    ///
    /// Fails if names collide, references do not resolve to a declared
    /// output of some task, or a task declares outputs its kind cannot
    /// produce.
    pub fn new(mut root: WorkflowNode) -> Result<Self> {
        root.assign_paths(None);
        validate_workflow(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &WorkflowNode {
        &self.root
    }

    pub fn name(&self) -> &str {
        self.root.name()
    }

    pub fn find(&self, path: &str) -> Option<&WorkflowNode> {
        self.root.find(path)
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    pub fn task_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |node| {
            if node.kind() == NodeKind::Task {
                count += 1;
            }
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(name: &str, file: &str) -> WorkflowNode {
        WorkflowNode::task(
            name,
            TaskInputs::DataLoad {
                filename: file.into(),
            },
        )
    }

    fn delay(name: &str) -> WorkflowNode {
        WorkflowNode::task(
            name,
            TaskInputs::Delay {
                input: Operand::Literal("x".to_string()),
                duration: 0,
            },
        )
    }

    #[test]
    fn test_paths_assigned_on_build() {
        let root = WorkflowNode::flow("root", ExecutionMode::Sequential)
            .with_child(
                WorkflowNode::flow("inner", ExecutionMode::Concurrent)
                    .with_child(delay("A"))
                    .with_child(delay("B")),
            )
            .with_child(load("Load", "data.csv"));

        let workflow = Workflow::new(root).unwrap();

        assert_eq!(workflow.root().path(), "root");
        assert!(workflow.find("root.inner.A").is_some());
        assert!(workflow.find("root.inner.B").is_some());
        assert_eq!(workflow.find("root.Load").unwrap().kind(), NodeKind::Task);
        assert_eq!(workflow.node_count(), 5);
        assert_eq!(workflow.task_count(), 3);
    }

    #[test]
    fn test_children_order_preserved() {
        let root = WorkflowNode::flow("root", ExecutionMode::Sequential)
            .with_children(vec![delay("C"), delay("A"), delay("B")]);

        let names: Vec<&str> = root.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_empty_flow_is_valid() {
        let workflow = Workflow::new(WorkflowNode::flow("root", ExecutionMode::Concurrent));
        assert!(workflow.is_ok());
        assert!(workflow.unwrap().root().children().is_empty());
    }

    #[test]
    fn test_with_child_on_task_is_ignored() {
        let task = delay("A").with_child(delay("B"));
        assert!(task.children().is_empty());
    }

    #[test]
    fn test_task_constructor_and_accessor() {
        let task = load("Load", "data.csv");
        assert_eq!(task.as_task().map(Task::kind), Some(TaskKind::DataLoad));

        let flow = WorkflowNode::flow("F", ExecutionMode::Sequential).with_child(task);
        assert!(flow.as_task().is_none());
    }

    #[test]
    fn test_default_outputs_follow_kind() {
        let node = load("Load", "data.csv");
        let task = node.as_task().unwrap();

        assert!(task.declared_outputs().is_none());
        assert!(task.writes(OutputName::DataTable));
        assert!(task.writes(OutputName::NoOfDefects));
        assert!(!task.writes(OutputName::MergedResults));
    }

    #[test]
    fn test_declared_outputs_restrict_writes() {
        let node = load("Load", "data.csv").with_outputs(vec![OutputName::NoOfDefects]);
        let task = node.as_task().unwrap();

        assert!(!task.writes(OutputName::DataTable));
        assert!(task.writes(OutputName::NoOfDefects));
    }

    #[test]
    fn test_produced_keys_use_full_path() {
        let root = WorkflowNode::flow("root", ExecutionMode::Sequential)
            .with_child(load("Load", "data.csv"));
        let workflow = Workflow::new(root).unwrap();

        let keys = workflow.find("root.Load").unwrap().produced_keys();
        assert!(keys.contains(&StoreKey::new("root.Load", OutputName::DataTable)));
        assert!(keys.contains(&StoreKey::new("root.Load", OutputName::NoOfDefects)));
    }

    #[test]
    fn test_operand_parse() {
        assert_eq!(
            Operand::parse("hello").unwrap(),
            Operand::Literal("hello".to_string())
        );
        assert_eq!(
            Operand::parse("$(root.Load.NoOfDefects)").unwrap(),
            Operand::Reference(StoreKey::new("root.Load", OutputName::NoOfDefects))
        );
        assert!(Operand::parse("$(root.Load)").is_err());
    }

    #[test]
    fn test_task_inputs_references() {
        let inputs = TaskInputs::MergeResults {
            precedence_file: "p.txt".into(),
            datasets: vec![
                StoreKey::new("root.A", OutputName::BinningResultsTable),
                StoreKey::new("root.B", OutputName::BinningResultsTable),
            ],
        };
        assert_eq!(inputs.kind(), TaskKind::MergeResults);
        assert_eq!(inputs.references().len(), 2);
    }

    #[test]
    fn test_execution_mode_from_str() {
        assert_eq!(
            "Sequential".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::Sequential
        );
        assert_eq!(
            "concurrent".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::Concurrent
        );
        assert!("parallel".parse::<ExecutionMode>().is_err());
    }
}
