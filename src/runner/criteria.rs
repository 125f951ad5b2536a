//! Criteria evaluation
//!
//! Each criteria type is handled by a [`CriterionChecker`] registered in a
//! [`CheckerRegistry`] under its type name. New types add a checker without
//! touching the inspector.

use crate::config::ConditionCriteria;
use crate::error::{ConditionError, ConditionResult};
use crate::system::{MetricsError, MetricsProvider};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tracing::warn;

/// Comparison between a measured value and a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl Operator {
    /// Parse an operator; `Ok(None)` for an empty string
    pub fn parse(s: &str) -> ConditionResult<Option<Self>> {
        let op = match s.trim() {
            "" => return Ok(None),
            ">" => Operator::Greater,
            ">=" => Operator::GreaterOrEqual,
            "<" => Operator::Less,
            "<=" => Operator::LessOrEqual,
            "==" | "<>" => Operator::Equal,
            "!=" => Operator::NotEqual,
            other => return Err(ConditionError::InvalidOperator(other.to_string())),
        };
        Ok(Some(op))
    }

    pub fn apply(self, value: u64, threshold: u64) -> bool {
        match self {
            Operator::Greater => value > threshold,
            Operator::GreaterOrEqual => value >= threshold,
            Operator::Less => value < threshold,
            Operator::LessOrEqual => value <= threshold,
            Operator::Equal => value == threshold,
            Operator::NotEqual => value != threshold,
        }
    }
}

/// Compare `value` against `threshold` with an operator string
///
/// An empty operator never matches; an unknown one is an error.
pub fn compare(value: u64, threshold: u64, operator: &str) -> ConditionResult<bool> {
    match Operator::parse(operator)? {
        Some(op) => Ok(op.apply(value, threshold)),
        None => {
            warn!("No operator given, comparison never matches");
            Ok(false)
        }
    }
}

/// Evaluates one criteria type against a target process
pub trait CriterionChecker: Send + Sync {
    fn check(
        &self,
        target: &str,
        criteria: &ConditionCriteria,
        metrics: &dyn MetricsProvider,
    ) -> ConditionResult<bool>;
}

/// Process CPU usage in percent, rounded up
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuChecker;

impl CriterionChecker for CpuChecker {
    fn check(
        &self,
        target: &str,
        criteria: &ConditionCriteria,
        metrics: &dyn MetricsProvider,
    ) -> ConditionResult<bool> {
        let usage = metrics.process_cpu_percent(target)?;
        let usage = usage.max(0.0).ceil() as u64;
        compare(usage, criteria.threshold, &criteria.operator)
    }
}

/// Process resident memory in MB
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryChecker;

impl CriterionChecker for MemoryChecker {
    fn check(
        &self,
        target: &str,
        criteria: &ConditionCriteria,
        metrics: &dyn MetricsProvider,
    ) -> ConditionResult<bool> {
        let usage = metrics.process_memory_mb(target)?;
        compare(usage, criteria.threshold, &criteria.operator)
    }
}

/// Free space in GB of the disk holding the working directory
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFreeSpaceChecker;

impl CriterionChecker for DiskFreeSpaceChecker {
    fn check(
        &self,
        _target: &str,
        criteria: &ConditionCriteria,
        metrics: &dyn MetricsProvider,
    ) -> ConditionResult<bool> {
        let cwd = env::current_dir().map_err(|e| MetricsError::Unavailable(e.to_string()))?;
        let free = metrics.disk_free_gb(&cwd)?;
        compare(free, criteria.threshold, &criteria.operator)
    }
}

/// Checkers keyed by criteria type name
#[derive(Clone)]
pub struct CheckerRegistry {
    checkers: HashMap<String, Arc<dyn CriterionChecker>>,
}

impl CheckerRegistry {
    /// A registry without any checkers
    pub fn empty() -> Self {
        CheckerRegistry {
            checkers: HashMap::new(),
        }
    }

    /// A registry with the built-in CPU, memory and disk checkers
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("CPU", CpuChecker);
        registry.register("Memory", MemoryChecker);
        registry.register("DiskAvailableUsage", DiskFreeSpaceChecker);
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, checker: impl CriterionChecker + 'static) {
        self.checkers.insert(kind.into(), Arc::new(checker));
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn CriterionChecker>> {
        self.checkers.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.checkers.contains_key(kind)
    }

    /// Evaluate a criterion once
    pub fn check(
        &self,
        target: &str,
        criteria: &ConditionCriteria,
        metrics: &dyn MetricsProvider,
    ) -> ConditionResult<bool> {
        let checker = self
            .get(&criteria.kind)
            .ok_or_else(|| ConditionError::InvalidCriteria {
                kind: criteria.kind.clone(),
                id: criteria.id,
            })?;
        checker.check(target, criteria, metrics)
    }
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CheckerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.checkers.keys().collect();
        kinds.sort();
        f.debug_struct("CheckerRegistry").field("kinds", &kinds).finish()
    }
}
