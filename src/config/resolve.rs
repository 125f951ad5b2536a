//! Template resolution
//!
//! Turns the numeric references of a task into a closed [`TaskMaterial`].
//! Templates are indexed by id once, so each lookup is a map access.

use crate::config::types::{
    Action, ActionProperty, Condition, ConditionCriteria, Profile, Task,
};
use crate::error::{ConfigError, ConfigResult};
use std::collections::HashMap;
use tracing::warn;

/// An action together with its resolved property
#[derive(Debug, Clone, PartialEq)]
pub struct ActionMaterial {
    pub action: Action,
    pub property: ActionProperty,
}

/// A condition together with its resolved criteria
///
/// Criteria ids missing from the catalog resolve to `None` and are skipped
/// by the inspector.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionMaterial {
    pub condition: Condition,
    pub mandatory: Vec<Option<ConditionCriteria>>,
    pub optional: Vec<Option<ConditionCriteria>>,
}

/// Everything a task handler needs to run one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMaterial {
    pub task_id: u32,
    pub task_name: String,
    pub action: ActionMaterial,
    pub condition: Option<ConditionMaterial>,
}

impl TaskMaterial {
    pub fn is_gated(&self) -> bool {
        self.condition.is_some()
    }
}

/// Id-indexed view over a profile's template catalog
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    tasks: HashMap<u32, Task>,
    actions: HashMap<u32, Action>,
    properties: HashMap<u32, ActionProperty>,
    conditions: HashMap<u32, Condition>,
    criteria: HashMap<u32, ConditionCriteria>,
}

impl Resolver {
    /// Index the templates of a profile
    pub fn new(profile: &Profile) -> Self {
        let template = &profile.template;
        Resolver {
            tasks: profile.tasks.iter().map(|t| (t.id, t.clone())).collect(),
            actions: template.actions.iter().map(|a| (a.id, a.clone())).collect(),
            properties: template
                .action_properties
                .iter()
                .map(|p| (p.id, p.clone()))
                .collect(),
            conditions: template
                .conditions
                .iter()
                .map(|c| (c.id, c.clone()))
                .collect(),
            criteria: template
                .condition_criteria
                .iter()
                .map(|c| (c.id, c.clone()))
                .collect(),
        }
    }

    /// Resolve a task into its material
    pub fn resolve(&self, task_id: u32) -> ConfigResult<TaskMaterial> {
        let task = self
            .tasks
            .get(&task_id)
            .ok_or(ConfigError::TaskNotFound(task_id))?;

        let action = self.resolve_action(task.action_id)?;
        let condition = match task.condition_id {
            0 => None,
            id => self.resolve_condition(id),
        };

        Ok(TaskMaterial {
            task_id,
            task_name: task.name.clone(),
            action,
            condition,
        })
    }

    /// Resolve an action and its property
    pub fn resolve_action(&self, action_id: u32) -> ConfigResult<ActionMaterial> {
        let action = self
            .actions
            .get(&action_id)
            .ok_or(ConfigError::ActionNotFound(action_id))?;
        let property = self
            .properties
            .get(&action.property_id)
            .ok_or(ConfigError::PropertyNotFound(action.property_id))?;

        Ok(ActionMaterial {
            action: action.clone(),
            property: property.clone(),
        })
    }

    /// Resolve a condition and its criteria
    ///
    /// A missing condition is not an error: the task then runs ungated.
    pub fn resolve_condition(&self, condition_id: u32) -> Option<ConditionMaterial> {
        let Some(condition) = self.conditions.get(&condition_id) else {
            warn!(condition_id, "Condition not found in template catalog, task runs ungated");
            return None;
        };

        Some(ConditionMaterial {
            mandatory: self.resolve_criteria(condition, &condition.criteria.mandatory),
            optional: self.resolve_criteria(condition, &condition.criteria.optional),
            condition: condition.clone(),
        })
    }

    fn resolve_criteria(&self, condition: &Condition, ids: &[u32]) -> Vec<Option<ConditionCriteria>> {
        ids.iter()
            .map(|id| {
                let criteria = self.criteria.get(id).cloned();
                if criteria.is_none() {
                    warn!(
                        condition_id = condition.id,
                        criteria_id = *id,
                        "Criteria not found in template catalog, skipping"
                    );
                }
                criteria
            })
            .collect()
    }
}
