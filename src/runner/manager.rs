//! Tasks manager
//!
//! Owns one [`TaskHandler`] per resolvable task and runs them sequentially
//! or concurrently under a single run-wide deadline.

use crate::config::{ExecutionMode, Profile};
use crate::error::{is_cancellation, ConfigError, DelegatorError, Result};
use crate::runner::{Deadline, HandlerState, RunContext, TaskHandler};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A task left out of the run because it could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTask {
    pub id: u32,
    pub name: String,
    pub reason: ConfigError,
}

/// Final state of one handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub id: u32,
    pub name: String,
    pub state: HandlerState,
}

/// Outcome of a run, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<TaskReport>,
    pub skipped: Vec<SkippedTask>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.count(|s| s == HandlerState::DoneSuccess)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| s == HandlerState::DoneFail)
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| s == HandlerState::Cancelled)
    }

    /// Handlers that never reached a terminal state
    pub fn unfinished(&self) -> usize {
        self.count(|s| !s.is_terminal())
    }

    /// True when every task ran and finished successfully
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && self.succeeded() == self.reports.len()
    }

    fn count(&self, pred: impl Fn(HandlerState) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(r.state)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} cancelled, {} not finished, {} skipped",
            self.succeeded(),
            self.failed(),
            self.cancelled(),
            self.unfinished(),
            self.skipped.len()
        )
    }
}

pub struct TasksManager {
    handlers: Vec<Arc<TaskHandler>>,
    index: HashMap<u32, usize>,
    skipped: Vec<SkippedTask>,
    mode: ExecutionMode,
    deadline: Deadline,
    join_interval: Duration,
}

impl TasksManager {
    /// Resolve every task of the profile into a handler
    ///
    /// Tasks that fail to resolve are logged and skipped.
    pub fn new(profile: &Profile, ctx: RunContext) -> Self {
        let deadline = Deadline::new(profile.period());
        let mut handlers = Vec::with_capacity(profile.tasks.len());
        let mut index = HashMap::new();
        let mut skipped = Vec::new();

        for task in &profile.tasks {
            match ctx.resolver.resolve(task.id) {
                Ok(material) => {
                    index.insert(task.id, handlers.len());
                    handlers.push(Arc::new(TaskHandler::new(material, ctx.clone(), &deadline)));
                }
                Err(e) => {
                    error!(task_id = task.id, task = %task.name, error = %e, "Skipping task");
                    skipped.push(SkippedTask {
                        id: task.id,
                        name: task.name.clone(),
                        reason: e,
                    });
                }
            }
        }

        debug!(
            handlers = handlers.len(),
            skipped = skipped.len(),
            mode = ?profile.execution_mode(),
            "Tasks manager initialized"
        );

        TasksManager {
            handlers,
            index,
            skipped,
            mode: profile.execution_mode(),
            deadline,
            join_interval: ctx.join_interval,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn handlers(&self) -> &[Arc<TaskHandler>] {
        &self.handlers
    }

    pub fn handler(&self, id: u32) -> Option<&Arc<TaskHandler>> {
        self.index.get(&id).map(|&i| &self.handlers[i])
    }

    pub fn skipped(&self) -> &[SkippedTask] {
        &self.skipped
    }

    /// Current state of every handler, in declaration order
    pub fn states(&self) -> Vec<(u32, HandlerState)> {
        self.handlers.iter().map(|h| (h.id(), h.state())).collect()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            reports: self
                .handlers
                .iter()
                .map(|h| TaskReport {
                    id: h.id(),
                    name: h.name().to_string(),
                    state: h.state(),
                })
                .collect(),
            skipped: self.skipped.clone(),
        }
    }

    /// Run every task and wait for all of them to finish
    pub async fn run(&self) -> RunSummary {
        info!(tasks = self.handlers.len(), mode = ?self.mode, "Running tasks");
        match self.mode {
            ExecutionMode::Sequential => self.run_sequential().await,
            ExecutionMode::Concurrent => self.run_concurrent().await,
        }
        let summary = self.summary();
        info!(%summary, "Run finished");
        summary
    }

    /// Run a single task
    pub async fn run_one(&self, id: u32) -> Result<()> {
        let handler = self.handler(id).ok_or(ConfigError::TaskNotFound(id))?;
        handler.start().await
    }

    /// Stop every task
    pub fn stop(&self) {
        info!("Stopping all tasks");
        for handler in &self.handlers {
            handler.stop();
        }
        self.deadline.cancel();
    }

    /// Stop one task; false if no such handler exists
    pub fn stop_one(&self, id: u32) -> bool {
        match self.handler(id) {
            Some(handler) => {
                handler.stop();
                true
            }
            None => {
                warn!(task_id = id, "No handler to stop");
                false
            }
        }
    }

    async fn run_sequential(&self) {
        for handler in &self.handlers {
            if let Some(cause) = self.deadline.cause() {
                info!(%cause, "Not starting remaining tasks");
                break;
            }
            if let Err(e) = handler.start().await {
                log_unsuccessful(handler, &e);
            }
        }
    }

    async fn run_concurrent(&self) {
        let joins: Vec<_> = self
            .handlers
            .iter()
            .map(|handler| {
                let handler = Arc::clone(handler);
                tokio::spawn(async move {
                    if let Err(e) = handler.start().await {
                        log_unsuccessful(&handler, &e);
                    }
                })
            })
            .collect();

        loop {
            let pending = self
                .handlers
                .iter()
                .zip(&joins)
                .filter(|(handler, join)| !handler.state().is_terminal() && !join.is_finished())
                .count();
            if pending == 0 {
                break;
            }
            debug!(pending, "Waiting for tasks");
            tokio::time::sleep(self.join_interval).await;
        }

        // A stopped handler is terminal before its task has torn down
        for join in joins {
            if let Err(e) = join.await {
                error!(error = %e, "Task runner panicked");
            }
        }
    }
}

/// Failures were already logged by the handler
fn log_unsuccessful(handler: &TaskHandler, e: &DelegatorError) {
    if is_cancellation(e) {
        info!(task_id = handler.id(), error = %e, "Task cancelled");
    } else {
        debug!(task_id = handler.id(), error = %e, "Task did not succeed");
    }
}
