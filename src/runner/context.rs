//! Shared run context
//!
//! The context carries the read-only collaborators every handler needs.
//! It is built once before any task starts and shared by reference.

use crate::config::Resolver;
use crate::runner::{CheckerRegistry, Launcher, ProcessLauncher};
use crate::system::{MetricsProvider, OutputDir, SystemMetrics};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Inspector poll cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Cadence at which the manager checks for handler completion
pub const DEFAULT_JOIN_INTERVAL: Duration = Duration::from_secs(1);

/// Name of the tool executor binary
#[cfg(windows)]
pub const EXECUTOR_NAME: &str = "rp_main.exe";
#[cfg(not(windows))]
pub const EXECUTOR_NAME: &str = "rp_main";

/// Collaborators and settings shared by all handlers of a run
#[derive(Clone)]
pub struct RunContext {
    /// Template index used for tasks and pre/post actions
    pub resolver: Arc<Resolver>,

    pub launcher: Arc<dyn Launcher>,

    pub metrics: Arc<dyn MetricsProvider>,

    pub checkers: Arc<CheckerRegistry>,

    /// Directory receiving action output files
    pub output_dir: OutputDir,

    /// Binary that runs the allow-listed tools
    pub executor: PathBuf,

    pub poll_interval: Duration,

    pub join_interval: Duration,
}

impl RunContext {
    /// Create a context with system-backed collaborators
    pub fn new(resolver: Resolver) -> Self {
        RunContext {
            resolver: Arc::new(resolver),
            launcher: Arc::new(ProcessLauncher),
            metrics: Arc::new(SystemMetrics::new()),
            checkers: Arc::new(CheckerRegistry::with_defaults()),
            output_dir: OutputDir::default_location(),
            executor: default_executor(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            join_interval: DEFAULT_JOIN_INTERVAL,
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsProvider>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_checkers(mut self, checkers: CheckerRegistry) -> Self {
        self.checkers = Arc::new(checkers);
        self
    }

    pub fn with_output_dir(mut self, output_dir: OutputDir) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_executor(mut self, executor: PathBuf) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_join_interval(mut self, interval: Duration) -> Self {
        self.join_interval = interval;
        self
    }
}

/// Executor binary in the working directory
pub fn default_executor() -> PathBuf {
    match env::current_dir() {
        Ok(cwd) => cwd.join(EXECUTOR_NAME),
        Err(_) => PathBuf::from(EXECUTOR_NAME),
    }
}
