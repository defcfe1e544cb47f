//! Workflow Parser
//!
//! Loads a workflow tree from YAML. The document holds a single top-level
//! activity; flows list their children under `Activities`, in order.
//!
//! ```yaml
//! M3_Workflow:
//!   Type: Flow
//!   Execution: Sequential
//!   Activities:
//!     Load:
//!       Type: Task
//!       Function: DataLoad
//!       Inputs:
//!         Filename: data/defects.csv
//!       Outputs: [DataTable, NoOfDefects]
//!     Wait:
//!       Type: Task
//!       Function: TimeFunction
//!       Condition: $(M3_Workflow.Load.NoOfDefects) > 2
//!       Inputs:
//!         FunctionInput: $(M3_Workflow.Load.NoOfDefects)
//!         ExecutionTime: '1'
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::condition::Condition;
use super::model::{ExecutionMode, Operand, TaskInputs, Workflow, WorkflowNode};
use crate::error::{Result, WorkflowError};
use crate::store::{OutputName, StoreKey};

/// Prefix of the numbered dataset inputs of a merge task.
const DATASET_PREFIX: &str = "DataSet";

/// One activity as written in YAML, before interpretation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawActivity {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    execution: Option<String>,
    #[serde(default)]
    activities: Mapping,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    inputs: Mapping,
    #[serde(default)]
    outputs: Option<Vec<String>>,
    #[serde(default)]
    condition: Option<String>,
}

/// Loads and validates a workflow from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use flowrunner::workflow::load_workflow;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_workflow("workflow.yaml")?;
///     println!("Loaded {} nodes", workflow.node_count());
///     Ok(())
/// }
/// ```
pub fn load_workflow(path: impl AsRef<Path>) -> Result<Workflow> {
    let path = path.as_ref();
    info!("Loading workflow from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|e| WorkflowError::io(path, e))?;
    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    parse_workflow(&yaml_content)
}

/// Parses and validates a workflow from YAML text.
pub fn parse_workflow(yaml: &str) -> Result<Workflow> {
    let document: Mapping = serde_yaml::from_str(yaml)?;

    let mut entries = document.into_iter();
    let (name, value) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        (None, _) => return Err(WorkflowError::Parse("workflow document is empty".to_string())),
        (Some(_), Some(_)) => {
            return Err(WorkflowError::Parse(
                "workflow document must have exactly one top-level activity".to_string(),
            ))
        }
    };

    let root = build_node(&key_to_string(&name)?, value)?;
    let workflow = Workflow::new(root)?;

    info!(
        "Parsed workflow '{}': {} nodes, {} tasks",
        workflow.name(),
        workflow.node_count(),
        workflow.task_count()
    );

    Ok(workflow)
}

fn build_node(name: &str, value: Value) -> Result<WorkflowNode> {
    let raw: RawActivity = serde_yaml::from_value(value)
        .map_err(|e| WorkflowError::Parse(format!("activity '{}': {}", name, e)))?;

    let node = match raw.kind.trim().to_ascii_lowercase().as_str() {
        "flow" => build_flow(name, &raw)?,
        "task" => build_task(name, &raw)?,
        other => {
            return Err(WorkflowError::Parse(format!(
                "activity '{}' has unknown type '{}'",
                name, other
            )))
        }
    };

    let node = match &raw.condition {
        Some(text) => node.with_condition(Condition::parse(text)?),
        None => node,
    };

    Ok(node)
}

fn build_flow(name: &str, raw: &RawActivity) -> Result<WorkflowNode> {
    let mode = match &raw.execution {
        Some(text) => text
            .parse::<ExecutionMode>()
            .map_err(|e| WorkflowError::Parse(format!("flow '{}': {}", name, e)))?,
        None => ExecutionMode::Sequential,
    };

    let children = raw
        .activities
        .iter()
        .map(|(child_name, child)| build_node(&key_to_string(child_name)?, child.clone()))
        .collect::<Result<Vec<_>>>()?;

    debug!("Flow '{}' ({:?}) with {} children", name, mode, children.len());
    Ok(WorkflowNode::flow(name, mode).with_children(children))
}

fn build_task(name: &str, raw: &RawActivity) -> Result<WorkflowNode> {
    let function = raw
        .function
        .as_deref()
        .ok_or_else(|| WorkflowError::Parse(format!("task '{}' has no Function", name)))?;

    let inputs = match function.trim() {
        "TimeFunction" | "Delay" => {
            let duration = input(raw, name, "ExecutionTime")?;
            TaskInputs::Delay {
                input: Operand::parse(&input(raw, name, "FunctionInput")?)?,
                duration: duration.trim().parse().map_err(|e| {
                    WorkflowError::Parse(format!(
                        "task '{}': invalid ExecutionTime '{}': {}",
                        name, duration, e
                    ))
                })?,
            }
        }
        "DataLoad" => TaskInputs::DataLoad {
            filename: PathBuf::from(input(raw, name, "Filename")?),
        },
        "Binning" => TaskInputs::Binning {
            rule_file: PathBuf::from(input(raw, name, "RuleFilename")?),
            dataset: reference(raw, name, "DataSet")?,
        },
        "MergeResults" => TaskInputs::MergeResults {
            precedence_file: PathBuf::from(input(raw, name, "PrecedenceFile")?),
            datasets: dataset_references(raw, name)?,
        },
        "ExportResults" => TaskInputs::ExportResults {
            dataset: reference(raw, name, "DefectTable")?,
            filename: PathBuf::from(input(raw, name, "FileName")?),
        },
        other => {
            return Err(WorkflowError::Parse(format!(
                "task '{}' uses unknown function '{}'",
                name, other
            )))
        }
    };

    let node = WorkflowNode::task(name, inputs);

    match &raw.outputs {
        Some(outputs) => {
            let outputs = outputs
                .iter()
                .map(|o| {
                    o.trim().parse::<OutputName>().map_err(|e| {
                        WorkflowError::Parse(format!("task '{}': {}", name, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(node.with_outputs(outputs))
        }
        None => Ok(node),
    }
}

/// Reads a required scalar input as text.
fn input(raw: &RawActivity, task: &str, key: &str) -> Result<String> {
    raw.inputs
        .get(key)
        .and_then(scalar_to_string)
        .ok_or_else(|| WorkflowError::Parse(format!("task '{}' is missing input '{}'", task, key)))
}

fn reference(raw: &RawActivity, task: &str, key: &str) -> Result<StoreKey> {
    StoreKey::from_reference(&input(raw, task, key)?)
}

/// Collects `DataSet1`, `DataSet2`, ... in declaration order.
fn dataset_references(raw: &RawActivity, task: &str) -> Result<Vec<StoreKey>> {
    raw.inputs
        .iter()
        .filter_map(|(key, value)| {
            let key = key.as_str()?;
            key.starts_with(DATASET_PREFIX).then_some((key, value))
        })
        .map(|(key, value)| {
            let text = scalar_to_string(value).ok_or_else(|| {
                WorkflowError::Parse(format!("task '{}': input '{}' is not a scalar", task, key))
            })?;
            StoreKey::from_reference(&text)
        })
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn key_to_string(key: &Value) -> Result<String> {
    scalar_to_string(key)
        .ok_or_else(|| WorkflowError::Parse(format!("activity name must be a scalar: {:?}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::{NodeKind, TaskKind};

    const MILESTONE_YAML: &str = r#"
M3_Workflow:
  Type: Flow
  Execution: Sequential
  Activities:
    Load:
      Type: Task
      Function: DataLoad
      Inputs:
        Filename: data/defects.csv
      Outputs: [DataTable, NoOfDefects]
    Parallel:
      Type: Flow
      Execution: Concurrent
      Activities:
        BinA:
          Type: Task
          Function: Binning
          Inputs:
            RuleFilename: rules/a.csv
            DataSet: $(M3_Workflow.Load.DataTable)
          Outputs: [BinningResultsTable, NoOfDefects]
        BinB:
          Type: Task
          Function: Binning
          Inputs:
            RuleFilename: rules/b.csv
            DataSet: $(M3_Workflow.Load.DataTable)
          Outputs: [BinningResultsTable]
    Merge:
      Type: Task
      Function: MergeResults
      Inputs:
        PrecedenceFile: precedence.txt
        DataSet1: $(M3_Workflow.Parallel.BinA.BinningResultsTable)
        DataSet2: $(M3_Workflow.Parallel.BinB.BinningResultsTable)
      Outputs: [MergedResults]
    Wait:
      Type: Task
      Function: TimeFunction
      Condition: $(M3_Workflow.Load.NoOfDefects) > 2
      Inputs:
        FunctionInput: $(M3_Workflow.Parallel.BinA.NoOfDefects)
        ExecutionTime: '1'
    Export:
      Type: Task
      Function: ExportResults
      Inputs:
        FileName: out/merged.csv
        DefectTable: $(M3_Workflow.Merge.MergedResults)
"#;

    #[test]
    fn test_parse_full_workflow() {
        let workflow = parse_workflow(MILESTONE_YAML).unwrap();

        assert_eq!(workflow.name(), "M3_Workflow");
        assert_eq!(workflow.node_count(), 8);
        assert_eq!(workflow.task_count(), 6);

        let names: Vec<&str> = workflow
            .root()
            .children()
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(names, vec!["Load", "Parallel", "Merge", "Wait", "Export"]);

        let parallel = workflow.find("M3_Workflow.Parallel").unwrap();
        assert_eq!(parallel.kind(), NodeKind::Flow);
        assert_eq!(parallel.execution_mode(), Some(ExecutionMode::Concurrent));
    }

    #[test]
    fn test_parse_task_inputs() {
        let workflow = parse_workflow(MILESTONE_YAML).unwrap();

        let merge = workflow.find("M3_Workflow.Merge").unwrap().as_task().unwrap();
        match merge.inputs() {
            TaskInputs::MergeResults {
                precedence_file,
                datasets,
            } => {
                assert_eq!(precedence_file, &PathBuf::from("precedence.txt"));
                assert_eq!(datasets.len(), 2);
                assert_eq!(datasets[0].producer(), "M3_Workflow.Parallel.BinA");
                assert_eq!(datasets[1].producer(), "M3_Workflow.Parallel.BinB");
            }
            other => panic!("unexpected inputs: {:?}", other),
        }

        let wait = workflow.find("M3_Workflow.Wait").unwrap();
        assert_eq!(wait.as_task().unwrap().kind(), TaskKind::Delay);
        assert_eq!(wait.condition().unwrap().literal(), 2);
    }

    #[test]
    fn test_numeric_execution_time() {
        let yaml = r#"
W:
  Type: Flow
  Execution: Sequential
  Activities:
    T:
      Type: Task
      Function: TimeFunction
      Inputs:
        FunctionInput: hello
        ExecutionTime: 2
"#;
        let workflow = parse_workflow(yaml).unwrap();
        let task = workflow.find("W.T").unwrap().as_task().unwrap();
        assert_eq!(
            task.inputs(),
            &TaskInputs::Delay {
                input: Operand::Literal("hello".to_string()),
                duration: 2,
            }
        );
    }

    #[test]
    fn test_invalid_execution_time() {
        let yaml = r#"
W:
  Type: Task
  Function: TimeFunction
  Inputs:
    FunctionInput: hello
    ExecutionTime: soon
"#;
        let err = parse_workflow(yaml).unwrap_err();
        assert!(err.to_string().contains("ExecutionTime"));
    }

    #[test]
    fn test_missing_input() {
        let yaml = r#"
W:
  Type: Task
  Function: DataLoad
  Inputs: {}
"#;
        let err = parse_workflow(yaml).unwrap_err();
        assert!(err.to_string().contains("missing input 'Filename'"));
    }

    #[test]
    fn test_unknown_function() {
        let yaml = r#"
W:
  Type: Task
  Function: Teleport
"#;
        assert!(matches!(parse_workflow(yaml), Err(WorkflowError::Parse(_))));
    }

    #[test]
    fn test_unknown_output() {
        let yaml = r#"
W:
  Type: Task
  Function: DataLoad
  Inputs:
    Filename: a.csv
  Outputs: [Rows]
"#;
        assert!(matches!(parse_workflow(yaml), Err(WorkflowError::Parse(_))));
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let yaml = r#"
A:
  Type: Flow
B:
  Type: Flow
"#;
        assert!(matches!(parse_workflow(yaml), Err(WorkflowError::Parse(_))));
    }

    #[test]
    fn test_unresolved_reference_rejected() {
        let yaml = r#"
W:
  Type: Flow
  Execution: Sequential
  Activities:
    Export:
      Type: Task
      Function: ExportResults
      Inputs:
        FileName: out.csv
        DefectTable: $(W.Nowhere.DataTable)
"#;
        assert!(matches!(
            parse_workflow(yaml),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_load_workflow_file_not_found() {
        let result = load_workflow("/nonexistent/path/workflow.yaml");
        assert!(matches!(result, Err(WorkflowError::Io { .. })));
    }

    #[test]
    fn test_load_workflow_from_file() {
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        let workflow_path = temp_dir.path().join("workflow.yaml");
        std::fs::write(&workflow_path, MILESTONE_YAML).unwrap();

        let workflow = load_workflow(&workflow_path).unwrap();
        assert_eq!(workflow.task_count(), 6);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            parse_workflow("this is not valid yaml: [[["),
            Err(WorkflowError::Parse(_))
        ));
    }
}
