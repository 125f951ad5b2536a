//! Core profile types
//!
//! This module defines the data structures that represent a profile document.
//! Field names follow the JSON contract consumed by the agent; every field is
//! optional and falls back to its default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout applied to an action when its property leaves `timeout_sec` at 0
pub const DEFAULT_TIMEOUT_SECS: u32 = 600;

/// Repeat count applied when an action property leaves `repeat.count` at 0
pub const DEFAULT_REPEAT_COUNT: u32 = 1;

/// Top-level profile structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Profile version
    #[serde(default, rename = "scp_version", alias = "version")]
    pub version: String,

    /// Overall run deadline in seconds (0 = unbounded)
    #[serde(default, rename = "Period", alias = "period")]
    pub period_secs: u32,

    /// Log level (trace, debug, info, error, fatal)
    #[serde(default)]
    pub log_level: String,

    /// Run tasks concurrently instead of one after another
    #[serde(default, rename = "async_execute")]
    pub async_run: bool,

    /// Tasks in declaration order
    #[serde(default)]
    pub tasks: Vec<Task>,

    /// Catalog of reusable actions and conditions
    #[serde(default)]
    pub template: Template,

    /// Variables available to `{alias}` placeholders
    #[serde(default)]
    pub variables: Vec<Variable>,

    /// Artifact upload settings, carried for the packaging stage
    #[serde(default)]
    pub upload: Upload,
}

impl Profile {
    /// Overall run deadline, `None` when unbounded
    pub fn period(&self) -> Option<Duration> {
        match self.period_secs {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }

    /// Selected scheduling mode
    pub fn execution_mode(&self) -> ExecutionMode {
        if self.async_run {
            ExecutionMode::Concurrent
        } else {
            ExecutionMode::Sequential
        }
    }

    /// Find a task declaration by id
    pub fn task(&self, id: u32) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

/// How the manager schedules its handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Concurrent,
}

/// A user-defined task
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Task {
    #[serde(default)]
    pub id: u32,

    #[serde(default)]
    pub name: String,

    /// Gating condition (0 = run immediately)
    #[serde(default, rename = "condition")]
    pub condition_id: u32,

    #[serde(default, rename = "action")]
    pub action_id: u32,
}

/// Catalog of templates addressed by numeric id
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Template {
    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default)]
    pub action_properties: Vec<ActionProperty>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub condition_criteria: Vec<ConditionCriteria>,
}

/// An operation performed by a task
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Action {
    #[serde(default)]
    pub id: u32,

    #[serde(default)]
    pub name: String,

    /// Tool to run; must be present in the executable allow-list
    #[serde(default)]
    pub executable: String,

    #[serde(default)]
    pub arguments: Vec<Argument>,

    /// Action run before this one (0 = none)
    #[serde(default)]
    pub pre_action: u32,

    /// Action run after this one (0 = none)
    #[serde(default)]
    pub post_action: u32,

    #[serde(default, rename = "property")]
    pub property_id: u32,

    /// File under the output directory receiving the tool's output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Action {
    /// Output file name, ignoring an empty string
    pub fn output_file(&self) -> Option<&str> {
        self.output.as_deref().filter(|s| !s.is_empty())
    }
}

/// A command/value pair passed to the tool
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Argument {
    #[serde(default)]
    pub command: String,

    #[serde(default)]
    pub value: String,
}

/// Timing properties bound to an action
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ActionProperty {
    #[serde(default)]
    pub id: u32,

    #[serde(default, rename = "timeout_sec")]
    pub timeout_secs: u32,

    /// Pause between the action and its post action
    #[serde(default, rename = "period_sec")]
    pub period_secs: u32,

    #[serde(default)]
    pub repeat: RepeatProperty,
}

impl ActionProperty {
    /// Timeout spanning the whole repeat loop, 0 normalized to 600s
    pub fn timeout(&self) -> Duration {
        let secs = match self.timeout_secs {
            0 => DEFAULT_TIMEOUT_SECS,
            secs => secs,
        };
        Duration::from_secs(u64::from(secs))
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(u64::from(self.period_secs))
    }

    /// Number of times the action runs, 0 normalized to 1
    pub fn repeat_count(&self) -> u32 {
        match self.repeat.count {
            0 => DEFAULT_REPEAT_COUNT,
            count => count,
        }
    }

    pub fn repeat_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.repeat.interval_secs))
    }
}

/// Repeat count and interval of an action
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RepeatProperty {
    #[serde(default)]
    pub count: u32,

    #[serde(default, rename = "interval_sec")]
    pub interval_secs: u32,
}

/// A condition gating a task
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Condition {
    #[serde(default)]
    pub id: u32,

    #[serde(default)]
    pub name: String,

    /// Process whose metrics are inspected
    #[serde(default, rename = "monitor_process")]
    pub target_process: String,

    /// Inspection timeout in seconds (0 = bounded by the parent only)
    #[serde(default, rename = "timeout_sec")]
    pub timeout_secs: u32,

    #[serde(default)]
    pub criteria: Criteria,
}

impl Condition {
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }
}

/// Mandatory criteria must all pass; then any one optional criterion suffices
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Criteria {
    #[serde(default)]
    pub mandatory: Vec<u32>,

    #[serde(default)]
    pub optional: Vec<u32>,
}

/// One measurable comparison
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConditionCriteria {
    #[serde(default)]
    pub id: u32,

    /// Checker type, e.g. `CPU`, `Memory`, `DiskAvailableUsage`
    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub threshold: u64,

    #[serde(default)]
    pub operator: String,

    /// Delay before the confirming re-check (0 = no re-check)
    #[serde(default)]
    pub maturity_ms: u64,
}

impl ConditionCriteria {
    pub fn maturity(&self) -> Duration {
        Duration::from_millis(self.maturity_ms)
    }
}

/// Alias and raw value of a profile variable
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Variable {
    #[serde(default)]
    pub alias: String,

    #[serde(default)]
    pub value: String,
}

/// Upload settings for the packaging stage
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Upload {
    #[serde(default, rename = "azure_blob")]
    pub blob: BlobStore,

    #[serde(default)]
    pub proxy: Proxy,

    #[serde(default, rename = "max_block_size_MB")]
    pub max_block_size_mb: u32,

    #[serde(default, rename = "rate_limit_MB")]
    pub rate_limit_mb: u32,

    #[serde(default, rename = "timeout_sec")]
    pub timeout_secs: u32,

    #[serde(default)]
    pub max_retry_count: u32,

    #[serde(default)]
    pub seg_case_id: String,

    #[serde(default)]
    pub company_id: String,

    #[serde(default)]
    pub device_id: String,
}

/// Blob store destination
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BlobStore {
    #[serde(default)]
    pub host_name: String,

    #[serde(default)]
    pub account_name: String,

    #[serde(default)]
    pub container_name: String,

    #[serde(default)]
    pub sas_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Proxy {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: u16,
}
