//! In-memory collaborators for runner tests

use crate::config::{
    Action, ActionProperty, Argument, Condition, ConditionCriteria, Criteria, Profile,
    RepeatProperty, Task, Template,
};
use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{Deadline, LaunchOutput, LaunchRequest, Launcher};
use crate::system::{MetricsError, MetricsProvider};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Records every request; optionally fails one call or takes a while
#[derive(Default)]
pub struct RecordingLauncher {
    pub requests: Mutex<Vec<LaunchRequest>>,
    /// 1-based call number that exits non-zero
    pub fail_on: Option<usize>,
    pub delay: Duration,
    /// Time a cancelled call takes to wind down
    pub teardown: Duration,
    pub torn_down: AtomicUsize,
}

impl RecordingLauncher {
    pub fn failing_on(call: usize) -> Self {
        RecordingLauncher {
            fail_on: Some(call),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        RecordingLauncher {
            delay,
            ..Default::default()
        }
    }

    pub fn torn_down(&self) -> usize {
        self.torn_down.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Joined arguments of every recorded call, in order
    pub fn tools(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.args.join(" "))
            .collect()
    }
}

#[async_trait]
impl Launcher for RecordingLauncher {
    async fn launch(
        &self,
        request: &LaunchRequest,
        deadline: &Deadline,
    ) -> ExecutionResult<LaunchOutput> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        if let Err(cause) = deadline.sleep(self.delay).await {
            tokio::time::sleep(self.teardown).await;
            self.torn_down.fetch_add(1, Ordering::SeqCst);
            return Err(ExecutionError::Cancelled(cause));
        }

        let success = self.fail_on != Some(call);
        Ok(LaunchOutput {
            code: Some(if success { 0 } else { 1 }),
            success,
            output: format!("call {}\n", call).into_bytes(),
        })
    }
}

/// Metrics with fixed readings
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMetrics {
    pub cpu: f64,
    pub memory: u64,
    pub disk: u64,
}

impl MetricsProvider for FixedMetrics {
    fn process_cpu_percent(&self, _process: &str) -> Result<f64, MetricsError> {
        Ok(self.cpu)
    }

    fn process_memory_mb(&self, _process: &str) -> Result<u64, MetricsError> {
        Ok(self.memory)
    }

    fn disk_free_gb(&self, _path: &Path) -> Result<u64, MetricsError> {
        Ok(self.disk)
    }
}

pub fn action(id: u32, executable: &str, property_id: u32) -> Action {
    Action {
        id,
        name: format!("action-{}", id),
        executable: executable.to_string(),
        arguments: vec![Argument {
            command: "-id".to_string(),
            value: id.to_string(),
        }],
        property_id,
        ..Default::default()
    }
}

pub fn property(id: u32, timeout_secs: u32, count: u32) -> ActionProperty {
    ActionProperty {
        id,
        timeout_secs,
        period_secs: 0,
        repeat: RepeatProperty {
            count,
            interval_secs: 0,
        },
    }
}

/// A CPU-gated condition with the given criteria as mandatory
pub fn cpu_condition(id: u32, criteria_id: u32) -> (Condition, ConditionCriteria) {
    let condition = Condition {
        id,
        name: format!("condition-{}", id),
        target_process: "svc.exe".to_string(),
        timeout_secs: 0,
        criteria: Criteria {
            mandatory: vec![criteria_id],
            optional: vec![],
        },
    };
    let criteria = ConditionCriteria {
        id: criteria_id,
        kind: "CPU".to_string(),
        threshold: 80,
        operator: ">".to_string(),
        maturity_ms: 0,
    };
    (condition, criteria)
}

/// A profile with `count` ungated tasks, each running its own `wpr.exe` action
pub fn ungated_profile(count: u32) -> Profile {
    let mut profile = Profile {
        template: Template {
            action_properties: vec![property(1, 0, 1)],
            ..Default::default()
        },
        ..Default::default()
    };
    for id in 1..=count {
        profile.tasks.push(Task {
            id,
            name: format!("task-{}", id),
            condition_id: 0,
            action_id: id,
        });
        profile.template.actions.push(action(id, "wpr.exe", 1));
    }
    profile
}
