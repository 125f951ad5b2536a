//! Error types for Delegator

use crate::system::{MetricsError, RegistryError};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Delegator operations
pub type Result<T> = std::result::Result<T, DelegatorError>;

/// Main error type for Delegator
#[derive(Error, Debug)]
pub enum DelegatorError {
    /// Profile loading, validation and template resolution errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Variable interpolation errors
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// Condition inspection errors
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    /// Action execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// State machine errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Profile parsing, validation and resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to find profile (searched: {0})")]
    NotFound(String),

    #[error("Invalid profile: {0}")]
    Invalid(String),

    #[error("Unsupported profile format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Task {0} is not defined")]
    TaskNotFound(u32),

    #[error("Action {0} is not defined in the template catalog")]
    ActionNotFound(u32),

    #[error("Action property {0} is not defined in the template catalog")]
    PropertyNotFound(u32),

    #[error("Duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },

    #[error("Action {hook} is used as a pre/post action of {action} but declares hooks of its own")]
    NestedHook { action: u32, hook: u32 },

    #[error("Action {0} uses itself as a pre/post action")]
    SelfHook(u32),
}

/// Variable interpolation errors
#[derive(Error, Debug)]
pub enum InterpolationError {
    #[error("Malformed variable expression '{value}': {reason}")]
    Format { value: String, reason: String },

    #[error("Registry query {hive}\\{path}\\{name} failed: {source}")]
    Query {
        hive: String,
        path: String,
        name: String,
        #[source]
        source: RegistryError,
    },
}

/// Condition inspection errors
#[derive(Error, Debug)]
pub enum ConditionError {
    #[error("Invalid criteria, type={kind}, id={id}")]
    InvalidCriteria { kind: String, id: u32 },

    #[error("Unrecognized operator '{0}'")]
    InvalidOperator(String),

    #[error("Metrics query failed: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Inspector cancelled: {0}")]
    Cancelled(CancelCause),
}

/// Action execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Executable '{0}' is not in the allow-list")]
    NotAllowed(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Command failed with exit code {0:?}")]
    CommandFailed(Option<i32>),

    #[error("Execution cancelled: {0}")]
    Cancelled(CancelCause),

    #[error("Failed to resolve hook action: {0}")]
    Resolution(#[from] ConfigError),
}

/// State machine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },
}

/// Why a deadline fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The bounding timeout elapsed
    DeadlineExceeded,
    /// Cancelled explicitly through a stop call or an ancestor token
    Stopped,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::DeadlineExceeded => write!(f, "deadline exceeded"),
            CancelCause::Stopped => write!(f, "stopped"),
        }
    }
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;

/// Specialized result type for condition operations
pub type ConditionResult<T> = std::result::Result<T, ConditionError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Helper to determine if an error was caused by cancellation rather than a fault
pub fn is_cancellation(err: &DelegatorError) -> bool {
    matches!(
        err,
        DelegatorError::Condition(ConditionError::Cancelled(_))
            | DelegatorError::Execution(ExecutionError::Cancelled(_))
    )
}
