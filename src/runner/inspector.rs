//! Condition inspector
//!
//! Polls the criteria of one condition against its target process until
//! they are satisfied, the inspector's deadline fires, or a criterion
//! cannot be evaluated.
//!
//! Each tick evaluates mandatory criteria in declared order and stops at the
//! first one that fails. When all pass, optional criteria are evaluated in
//! order and the first passing one is a hit; without optional criteria the
//! mandatory ones alone are enough. A criterion with a maturity delay only
//! counts if it still passes when re-checked after that delay.

use crate::config::{ConditionCriteria, ConditionMaterial};
use crate::error::{ConditionError, ConditionResult};
use crate::runner::{CheckerRegistry, Deadline, InspectorState, RunContext, StateCell};
use crate::system::{MetricsError, MetricsProvider};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

pub struct Inspector {
    material: Arc<ConditionMaterial>,
    metrics: Arc<dyn MetricsProvider>,
    checkers: Arc<CheckerRegistry>,
    poll_interval: Duration,
    state: StateCell<InspectorState>,
    polls: AtomicU64,
}

impl Inspector {
    pub fn new(material: Arc<ConditionMaterial>, ctx: &RunContext) -> Self {
        trace!(condition_id = material.condition.id, "Inspector created");
        Inspector {
            material,
            metrics: Arc::clone(&ctx.metrics),
            checkers: Arc::clone(&ctx.checkers),
            poll_interval: ctx.poll_interval,
            state: StateCell::new(InspectorState::Pending),
            polls: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> InspectorState {
        self.state.get()
    }

    /// Number of ticks evaluated so far
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Poll until the condition is met, then call `on_hit`
    ///
    /// The poll loop runs under a child of `parent` bounded by the
    /// condition's own timeout.
    pub async fn start<F: FnOnce()>(&self, parent: &Deadline, on_hit: F) -> ConditionResult<()> {
        let condition = &self.material.condition;
        let deadline = parent.child_with(condition.timeout());
        trace!(condition_id = condition.id, target = %condition.target_process, "Inspector start");

        let result = self.poll(&deadline).await;
        match &result {
            Ok(()) => {
                self.settle(InspectorState::Satisfied);
                debug!(condition_id = condition.id, "Condition satisfied");
                on_hit();
            }
            Err(ConditionError::Cancelled(cause)) => {
                self.settle(InspectorState::Cancelled);
                info!(condition_id = condition.id, %cause, "Inspector cancelled");
            }
            Err(_) => self.settle(InspectorState::Failed),
        }
        result
    }

    fn settle(&self, next: InspectorState) {
        if let Err(e) = self.state.transition(next) {
            debug!(error = %e, "Inspector state unchanged");
        }
    }

    async fn poll(&self, deadline: &Deadline) -> ConditionResult<()> {
        loop {
            if let Some(cause) = deadline.cause() {
                return Err(ConditionError::Cancelled(cause));
            }

            self.polls.fetch_add(1, Ordering::Relaxed);
            if self.evaluate(deadline).await? {
                return Ok(());
            }

            deadline
                .sleep(self.poll_interval)
                .await
                .map_err(ConditionError::Cancelled)?;
        }
    }

    /// Evaluate one tick
    async fn evaluate(&self, deadline: &Deadline) -> ConditionResult<bool> {
        for criteria in self.material.mandatory.iter().flatten() {
            if !self.check_criterion(criteria, deadline).await? {
                trace!(criteria_id = criteria.id, "Mandatory criteria not satisfied");
                return Ok(false);
            }
        }

        let mut optional = self.material.optional.iter().flatten().peekable();
        if optional.peek().is_none() {
            return Ok(true);
        }

        for criteria in optional {
            if self.check_criterion(criteria, deadline).await? {
                trace!(criteria_id = criteria.id, "Optional criteria satisfied");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Check a criterion, confirming it after its maturity delay
    async fn check_criterion(
        &self,
        criteria: &ConditionCriteria,
        deadline: &Deadline,
    ) -> ConditionResult<bool> {
        if !self.check_once(criteria).await? {
            return Ok(false);
        }

        if criteria.maturity_ms > 0 {
            deadline
                .sleep(criteria.maturity())
                .await
                .map_err(ConditionError::Cancelled)?;
            if !self.check_once(criteria).await? {
                trace!(criteria_id = criteria.id, "Criteria did not mature");
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn check_once(&self, criteria: &ConditionCriteria) -> ConditionResult<bool> {
        let checkers = Arc::clone(&self.checkers);
        let metrics = Arc::clone(&self.metrics);
        let target = self.material.condition.target_process.clone();
        let criteria = criteria.clone();

        // Metrics reads block while sampling
        tokio::task::spawn_blocking(move || checkers.check(&target, &criteria, metrics.as_ref()))
            .await
            .map_err(|e| ConditionError::Metrics(MetricsError::Unavailable(e.to_string())))?
    }
}
