//! Task handler
//!
//! A handler drives one resolved task through its lifecycle: optional
//! condition monitoring, then the repeat loop of its action with pre- and
//! post-actions, all bounded by deadlines derived from the manager's.

use crate::config::{Action, TaskMaterial};
use crate::error::{
    CancelCause, DelegatorError, ExecutionError, ExecutionResult, Result, StateError,
};
use crate::runner::{execute_action, Deadline, HandlerState, Inspector, RunContext, StateCell};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, trace};

pub struct TaskHandler {
    material: Arc<TaskMaterial>,
    ctx: RunContext,
    deadline: Deadline,
    state: StateCell<HandlerState>,
    inspector: Option<Inspector>,
    executions: AtomicU32,
}

impl TaskHandler {
    /// Create a handler whose deadline descends from `parent`
    pub fn new(material: TaskMaterial, ctx: RunContext, parent: &Deadline) -> Self {
        let material = Arc::new(material);
        let inspector = material
            .condition
            .as_ref()
            .map(|condition| Inspector::new(Arc::new(condition.clone()), &ctx));

        let handler = TaskHandler {
            deadline: parent.unbounded_child(),
            state: StateCell::new(HandlerState::Uninitialized),
            inspector,
            executions: AtomicU32::new(0),
            material,
            ctx,
        };
        handler.settle(HandlerState::Initialized);
        trace!(task_id = handler.id(), "Task handler initialized");
        handler
    }

    pub fn id(&self) -> u32 {
        self.material.task_id
    }

    pub fn name(&self) -> &str {
        &self.material.task_name
    }

    pub fn material(&self) -> &TaskMaterial {
        &self.material
    }

    pub fn state(&self) -> HandlerState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<HandlerState> {
        self.state.subscribe()
    }

    /// Number of once-executions started so far
    pub fn executions(&self) -> u32 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Condition ticks evaluated so far, 0 for ungated tasks
    pub fn polls(&self) -> u64 {
        self.inspector.as_ref().map_or(0, Inspector::polls)
    }

    /// Run the task to a terminal state
    pub async fn start(&self) -> Result<()> {
        let task_id = self.id();

        if let Some(inspector) = &self.inspector {
            self.enter(HandlerState::Monitoring)?;
            info!(task_id, task = self.name(), "Monitoring condition");

            let mut entered = None;
            let monitored = inspector
                .start(&self.deadline, || {
                    entered = Some(self.state.transition(HandlerState::Executing));
                })
                .await;

            if let Err(e) = monitored {
                error!(task_id, error = %e, "Condition monitoring ended without a hit");
                self.settle(HandlerState::DoneFail);
                return Err(e.into());
            }
            if let Some(Err(e)) = entered {
                return Err(self.rejected(e));
            }
        } else {
            self.enter(HandlerState::Executing)?;
        }

        info!(task_id, task = self.name(), "Executing action");
        match self.execute().await {
            Ok(()) => {
                info!(task_id, "Task finished successfully");
                self.settle(HandlerState::DoneSuccess);
                Ok(())
            }
            Err(e) => {
                error!(task_id, error = %e, "Task failed");
                self.settle(HandlerState::DoneFail);
                Err(e.into())
            }
        }
    }

    /// Cancel the task; a no-op once it has finished
    pub fn stop(&self) {
        if self.state.transition(HandlerState::Stopping).is_err() {
            debug!(task_id = self.id(), state = %self.state(), "Stop ignored");
            return;
        }
        self.settle(HandlerState::Cancelled);
        self.deadline.cancel();
        info!(task_id = self.id(), "Task stopped");
    }

    fn enter(&self, next: HandlerState) -> Result<()> {
        self.state
            .transition(next)
            .map(|_| ())
            .map_err(|e| self.rejected(e))
    }

    /// Map a rejected transition, reporting a stopped handler as cancelled
    fn rejected(&self, e: StateError) -> DelegatorError {
        if matches!(self.state(), HandlerState::Stopping | HandlerState::Cancelled) {
            ExecutionError::Cancelled(CancelCause::Stopped).into()
        } else {
            e.into()
        }
    }

    /// Transition if allowed; a stop that raced ahead keeps its state
    fn settle(&self, next: HandlerState) {
        if let Err(e) = self.state.transition(next) {
            debug!(task_id = self.id(), error = %e, "Handler state unchanged");
        }
    }

    async fn execute(&self) -> ExecutionResult<()> {
        let property = &self.material.action.property;
        let deadline = self.deadline.child(property.timeout());
        let count = property.repeat_count();

        for round in 1..=count {
            trace!(task_id = self.id(), round, count, "Execute once");
            self.execute_once(&deadline).await?;

            if round < count {
                deadline
                    .sleep(property.repeat_interval())
                    .await
                    .map_err(ExecutionError::Cancelled)?;
            }
        }

        Ok(())
    }

    async fn execute_once(&self, deadline: &Deadline) -> ExecutionResult<()> {
        self.executions.fetch_add(1, Ordering::Relaxed);
        let action = &self.material.action.action;

        if action.pre_action != 0 {
            let hook = self.ctx.resolver.resolve_action(action.pre_action)?;
            self.run_action(&hook.action, deadline).await?;
        }

        self.run_action(action, deadline).await?;

        let period = self.material.action.property.period();
        if !period.is_zero() {
            deadline
                .sleep(period)
                .await
                .map_err(ExecutionError::Cancelled)?;
        }

        if action.post_action != 0 {
            let hook = self.ctx.resolver.resolve_action(action.post_action)?;
            self.run_action(&hook.action, deadline).await?;
        }

        Ok(())
    }

    async fn run_action(&self, action: &Action, deadline: &Deadline) -> ExecutionResult<()> {
        execute_action(
            action,
            &self.ctx.executor,
            self.ctx.launcher.as_ref(),
            &self.ctx.output_dir,
            deadline,
        )
        .await
    }
}
