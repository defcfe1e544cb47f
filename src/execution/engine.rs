//! Workflow Execution Engine
//!
//! Runs a workflow tree top-down. Every node records `Entry` when it starts
//! and `Exit` when it finishes successfully; a node whose condition is false
//! records `Skipped` between the two and runs nothing below it.
//!
//! Sequential flows run their children in order on the calling thread.
//! Concurrent flows run each child on its own scoped thread and wait for
//! all of them before returning.

use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use super::context::{RunContext, DEFAULT_DELAY_UNIT};
use super::task::execute_task;
use crate::error::{Result, WorkflowError};
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::store::IntermediateStore;
use crate::workflow::{ExecutionMode, NodeBody, Workflow, WorkflowNode};

impl WorkflowNode {
    /// Executes this node and everything below it.
    ///
    /// Blocks until the whole subtree has finished. A failing node records
    /// no `Exit` and its error is returned to the caller.
    pub fn run(&self, ctx: &RunContext) -> Result<()> {
        ctx.timeline().record(self.path(), EventType::Entry);

        match self.execute(ctx) {
            Ok(()) => {
                ctx.timeline().record(self.path(), EventType::Exit);
                Ok(())
            }
            Err(e) => {
                error!("{} failed: {}", self.path(), e);
                Err(e)
            }
        }
    }

    fn execute(&self, ctx: &RunContext) -> Result<()> {
        if let Some(condition) = self.condition() {
            if !condition.evaluate(ctx.store())? {
                ctx.timeline().record(self.path(), EventType::Skipped);
                return Ok(());
            }
        }

        match self.body() {
            NodeBody::Task(task) => execute_task(self.path(), task, ctx),
            NodeBody::Flow {
                mode: ExecutionMode::Sequential,
                children,
            } => children.iter().try_for_each(|child| child.run(ctx)),
            NodeBody::Flow {
                mode: ExecutionMode::Concurrent,
                children,
            } => self.run_concurrent(children, ctx),
        }
    }

    /// Runs every child on its own thread and joins them all.
    ///
    /// A failing branch never stops its siblings. When several branches
    /// fail, the first in declaration order is returned.
    fn run_concurrent(&self, children: &[WorkflowNode], ctx: &RunContext) -> Result<()> {
        let results: Vec<(&str, thread::Result<Result<()>>)> = thread::scope(|scope| {
            let handles: Vec<_> = children
                .iter()
                .map(|child| (child.path(), scope.spawn(move || child.run(ctx))))
                .collect();

            handles
                .into_iter()
                .map(|(path, handle)| (path, handle.join()))
                .collect()
        });

        let mut first_error = None;
        for (path, result) in results {
            let err = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(_) => {
                    error!("{} panicked", path);
                    WorkflowError::BranchPanicked(path.to_string())
                }
            };

            if first_error.is_none() {
                first_error = Some(err);
            } else {
                warn!("{}: further branch failure: {}", self.path(), err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

/// Workflow execution engine.
///
/// Owns a validated workflow and the state of its most recent run.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use flowrunner::execution::Engine;
/// use flowrunner::load_workflow;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_workflow("milestone.yaml")?;
///     let mut engine = Engine::new(workflow);
///     engine.set_delay_unit(Duration::from_millis(100));
///
///     engine.run()?;
///     println!("{}", engine.timeline().gantt_chart());
///     Ok(())
/// }
/// ```
pub struct Engine {
    workflow: Workflow,
    delay_unit: Duration,
    context: RunContext,
}

impl Engine {
    /// Creates a new execution engine for a workflow.
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            delay_unit: DEFAULT_DELAY_UNIT,
            context: RunContext::new(DEFAULT_DELAY_UNIT),
        }
    }

    /// Sets the wall-clock length of one Delay unit.
    pub fn set_delay_unit(&mut self, unit: Duration) {
        self.delay_unit = unit;
    }

    /// Executes the workflow from an empty store and timeline.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every node finished or was skipped
    /// * `Err` - The first failure that reached the root
    pub fn run(&mut self) -> Result<()> {
        self.context = RunContext::new(self.delay_unit);

        info!(
            "Starting workflow '{}' ({} nodes, {} tasks)",
            self.workflow.name(),
            self.workflow.node_count(),
            self.workflow.task_count()
        );

        let result = self.workflow.root().run(&self.context);

        match &result {
            Ok(()) => {
                let mut durations: Vec<_> = self.timeline().get_durations().into_iter().collect();
                durations.sort();
                for (path, ms) in durations {
                    debug!("{} took {} ms", path, ms);
                }

                info!(
                    "Workflow '{}' completed in {:.2}s",
                    self.workflow.name(),
                    self.timeline().elapsed().as_secs_f64()
                );
            }
            Err(e) => error!("Workflow '{}' failed: {}", self.workflow.name(), e),
        }

        result
    }

    /// Store of the most recent run.
    pub fn store(&self) -> &IntermediateStore {
        self.context.store()
    }

    /// Timeline of the most recent run.
    pub fn timeline(&self) -> &ExecutionTimeline {
        self.context.timeline()
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }
}
