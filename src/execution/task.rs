//! Task dispatch.
//!
//! Maps a task node's inputs onto the matching task function.

use log::debug;

use super::context::RunContext;
use crate::error::Result;
use crate::tasks::{binning, data_load, delay, export, merge, TaskContext};
use crate::workflow::{Task, TaskInputs};

/// Runs one task on the calling thread.
///
/// # Arguments
///
/// * `path` - Fully qualified path of the task node
/// * `task` - The task payload
/// * `ctx` - Shared state of the current run
pub fn execute_task(path: &str, task: &Task, ctx: &RunContext) -> Result<()> {
    debug!("{}: running {} task", path, task.kind());
    let task_ctx = TaskContext::new(path, task, ctx.store());

    match task.inputs() {
        TaskInputs::Delay { input, duration } => {
            delay::run(&task_ctx, input, *duration, ctx.delay_unit())
        }
        TaskInputs::DataLoad { filename } => data_load::run(&task_ctx, filename),
        TaskInputs::Binning { rule_file, dataset } => {
            binning::run(&task_ctx, rule_file, dataset, ctx.binning_lock())
        }
        TaskInputs::MergeResults {
            precedence_file,
            datasets,
        } => merge::run(&task_ctx, precedence_file, datasets),
        TaskInputs::ExportResults { dataset, filename } => {
            export::run(&task_ctx, dataset, filename)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::store::{OutputName, StoreKey};
    use crate::workflow::{Operand, WorkflowNode};
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_dispatch_data_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("defects.csv");
        fs::write(&path, "Id,X,Y,Signal\n1,2,3,4\n5,6,7,8\n").unwrap();

        let node = WorkflowNode::task("Load", TaskInputs::DataLoad { filename: path });
        let ctx = RunContext::default();
        execute_task("root.Load", node.as_task().unwrap(), &ctx).unwrap();

        let count = ctx
            .store()
            .get_count(&StoreKey::new("root.Load", OutputName::NoOfDefects))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_dispatch_delay_uses_context_unit() {
        let node = WorkflowNode::task(
            "Wait",
            TaskInputs::Delay {
                input: Operand::Literal("x".to_string()),
                duration: 2,
            },
        );
        let ctx = RunContext::new(Duration::from_millis(10));

        let start = std::time::Instant::now();
        execute_task("root.Wait", node.as_task().unwrap(), &ctx).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_dispatch_propagates_errors() {
        let node = WorkflowNode::task(
            "Export",
            TaskInputs::ExportResults {
                dataset: StoreKey::new("root.Merge", OutputName::MergedResults),
                filename: "unused.csv".into(),
            },
        );
        let ctx = RunContext::default();

        let err = execute_task("root.Export", node.as_task().unwrap(), &ctx).unwrap_err();
        assert!(matches!(err, WorkflowError::KeyNotFound(_)));
    }
}
