//! Profile validation
//!
//! This module provides validation logic for profile documents.

use crate::config::types::{Action, Profile};
use crate::error::{ConfigError, ConfigResult};
use crate::runner::is_allowed_executable;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Validate a complete profile
pub fn validate_profile(profile: &Profile) -> ConfigResult<()> {
    check_unique("task", profile.tasks.iter().map(|t| t.id))?;
    check_unique("action", profile.template.actions.iter().map(|a| a.id))?;
    check_unique(
        "action property",
        profile.template.action_properties.iter().map(|p| p.id),
    )?;
    check_unique("condition", profile.template.conditions.iter().map(|c| c.id))?;
    check_unique(
        "condition criteria",
        profile.template.condition_criteria.iter().map(|c| c.id),
    )?;

    let actions: HashMap<u32, &Action> =
        profile.template.actions.iter().map(|a| (a.id, a)).collect();

    for action in &profile.template.actions {
        validate_hooks(action, &actions)?;

        if !is_allowed_executable(&action.executable) {
            warn!(
                action_id = action.id,
                executable = %action.executable,
                "Action uses an executable outside the allow-list and will fail when run"
            );
        }
    }

    Ok(())
}

/// Check that ids of one catalog are unique
fn check_unique(kind: &'static str, ids: impl Iterator<Item = u32>) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ConfigError::DuplicateId { kind, id });
        }
    }
    Ok(())
}

/// Pre/post actions may only nest one level deep
fn validate_hooks(action: &Action, actions: &HashMap<u32, &Action>) -> ConfigResult<()> {
    for hook_id in [action.pre_action, action.post_action] {
        if hook_id == 0 {
            continue;
        }
        if hook_id == action.id {
            return Err(ConfigError::SelfHook(action.id));
        }
        // A dangling hook is reported when the action is resolved, not here
        if let Some(hook) = actions.get(&hook_id) {
            if hook.pre_action != 0 || hook.post_action != 0 {
                return Err(ConfigError::NestedHook {
                    action: action.id,
                    hook: hook_id,
                });
            }
        }
    }
    Ok(())
}
