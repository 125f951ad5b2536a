//! Variable interpolation for profiles
//!
//! Variables are resolved once into an [`AliasMap`], then every string field of
//! the profile has its `{alias}` tokens replaced. A variable value is either
//! a literal, the output directory sentinel, or a registry query:
//!
//! ```text
//! {"alias": "dir",  "value": "$OUTPUT_DIR"}
//! {"alias": "home", "value": "$REG_QUERY(HKEY_LOCAL_MACHINE, SOFTWARE\\Vendor, InstallDir)"}
//! ```
//!
//! Tokens naming an alias that is not in the map are left as literal text.

use crate::config::types::{Action, Condition, ConditionCriteria, Profile, Task};
use crate::error::{InterpolationError, InterpolationResult};
use crate::system::RegistrySource;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, error};

/// Value replaced by the run's output directory
pub const OUTPUT_DIR_SENTINEL: &str = "$OUTPUT_DIR";

/// Prefix marking a registry query expression
pub const REGISTRY_QUERY_PREFIX: &str = "$REG_QUERY(";

/// Resolved variable values keyed by alias
pub type AliasMap = HashMap<String, String>;

/// Collaborators used while resolving variable values
pub struct VariableSources<'a> {
    pub output_dir: &'a Path,
    pub registry: &'a dyn RegistrySource,
}

/// Parsed arguments of a registry query expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryQuery {
    pub hive: String,
    pub path: String,
    pub name: String,
}

fn alias_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_.\-]+)\}").expect("alias pattern is valid"))
}

/// Resolve every profile variable, in declaration order
///
/// A variable that fails to resolve is logged and left out of the map.
pub fn resolve_variables(profile: &Profile, sources: &VariableSources<'_>) -> AliasMap {
    let mut aliases = AliasMap::new();

    for variable in &profile.variables {
        match resolve_value(&variable.value, sources) {
            Ok(value) => {
                debug!(alias = %variable.alias, value = %value, "Variable resolved");
                aliases.insert(variable.alias.clone(), value);
            }
            Err(e @ InterpolationError::Query { .. }) => {
                error!(alias = %variable.alias, error = %e, fatal = true, "Registry lookup failed");
            }
            Err(e) => {
                error!(alias = %variable.alias, error = %e, "Failed to resolve variable");
            }
        }
    }

    aliases
}

/// Resolve a single raw variable value
pub fn resolve_value(value: &str, sources: &VariableSources<'_>) -> InterpolationResult<String> {
    if let Some(query) = parse_registry_query(value)? {
        return sources
            .registry
            .query(&query.hive, &query.path, &query.name)
            .map_err(|source| InterpolationError::Query {
                hive: query.hive,
                path: query.path,
                name: query.name,
                source,
            });
    }

    if value.trim() == OUTPUT_DIR_SENTINEL {
        return Ok(sources.output_dir.display().to_string());
    }

    Ok(value.to_string())
}

/// Parse a registry query expression
///
/// Returns `Ok(None)` when the value does not carry the registry marker.
pub fn parse_registry_query(value: &str) -> InterpolationResult<Option<RegistryQuery>> {
    let trimmed = value.trim();
    let Some(rest) = trimmed.strip_prefix(REGISTRY_QUERY_PREFIX) else {
        return Ok(None);
    };

    let format_error = |reason: &str| InterpolationError::Format {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let inner = rest
        .strip_suffix(')')
        .ok_or_else(|| format_error("missing closing parenthesis"))?;

    let args: Vec<String> = inner
        .split(',')
        .map(|arg| {
            arg.trim()
                .trim_matches(|c| matches!(c, '[' | ']' | '"' | '\''))
                .trim()
                .to_string()
        })
        .collect();

    if args.len() != 3 {
        return Err(format_error(&format!(
            "expected 3 arguments (hive, path, name), got {}",
            args.len()
        )));
    }
    if args.iter().any(|a| a.is_empty()) {
        return Err(format_error("empty argument"));
    }

    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(hive), Some(path), Some(name)) => Ok(Some(RegistryQuery { hive, path, name })),
        _ => Err(format_error("expected 3 arguments")),
    }
}

/// Replace `{alias}` tokens in a string
pub fn interpolate<'s>(s: &'s str, aliases: &AliasMap) -> Cow<'s, str> {
    alias_pattern().replace_all(s, |caps: &Captures| match aliases.get(&caps[1]) {
        Some(value) => value.clone(),
        None => {
            debug!(alias = &caps[1], "Unresolved alias left as literal");
            caps[0].to_string()
        }
    })
}

fn rewrite(s: &mut String, aliases: &AliasMap) {
    if let Cow::Owned(replaced) = interpolate(s, aliases) {
        *s = replaced;
    }
}

/// Rewrite every string-bearing field of the profile
pub fn interpolate_profile(mut profile: Profile, aliases: &AliasMap) -> Profile {
    if aliases.is_empty() {
        return profile;
    }

    rewrite(&mut profile.version, aliases);
    rewrite(&mut profile.log_level, aliases);

    for task in &mut profile.tasks {
        interpolate_task(task, aliases);
    }
    for action in &mut profile.template.actions {
        interpolate_action(action, aliases);
    }
    for condition in &mut profile.template.conditions {
        interpolate_condition(condition, aliases);
    }
    for criteria in &mut profile.template.condition_criteria {
        interpolate_criteria(criteria, aliases);
    }

    let upload = &mut profile.upload;
    for field in [
        &mut upload.blob.host_name,
        &mut upload.blob.account_name,
        &mut upload.blob.container_name,
        &mut upload.blob.sas_token,
        &mut upload.proxy.host,
        &mut upload.seg_case_id,
        &mut upload.company_id,
        &mut upload.device_id,
    ] {
        rewrite(field, aliases);
    }

    profile
}

fn interpolate_task(task: &mut Task, aliases: &AliasMap) {
    rewrite(&mut task.name, aliases);
}

fn interpolate_action(action: &mut Action, aliases: &AliasMap) {
    rewrite(&mut action.name, aliases);
    rewrite(&mut action.executable, aliases);
    for argument in &mut action.arguments {
        rewrite(&mut argument.command, aliases);
        rewrite(&mut argument.value, aliases);
    }
    if let Some(output) = action.output.as_mut() {
        rewrite(output, aliases);
    }
}

fn interpolate_condition(condition: &mut Condition, aliases: &AliasMap) {
    rewrite(&mut condition.name, aliases);
    rewrite(&mut condition.target_process, aliases);
}

fn interpolate_criteria(criteria: &mut ConditionCriteria, aliases: &AliasMap) {
    rewrite(&mut criteria.kind, aliases);
    rewrite(&mut criteria.operator, aliases);
}
