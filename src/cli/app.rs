//! Main CLI application

use crate::config::{
    interpolate_profile, parse_profile_auto, parse_profile_file, resolve_variables,
    validate_profile, Profile, Resolver, VariableSources,
};
use crate::error::ConfigError;
use crate::runner::{default_executor, HandlerState, RunContext, RunSummary, TasksManager};
use crate::system::{OutputDir, UnsupportedRegistry};
use anyhow::{Context as _, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Console verbosity selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

/// Options of the `run` subcommand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub task: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub executor: Option<PathBuf>,
}

impl RunOptions {
    fn from_matches(matches: Option<&ArgMatches>) -> Self {
        let Some(matches) = matches else {
            return RunOptions::default();
        };
        RunOptions {
            task: matches.get_one::<u32>("task").copied(),
            output_dir: matches.get_one::<PathBuf>("output-dir").cloned(),
            executor: matches.get_one::<PathBuf>("executor").cloned(),
        }
    }
}

/// Build the clap command
pub fn build_command() -> Command {
    Command::new("delegator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs profile-driven, condition-gated diagnostic tool tasks")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Path to the profile (default: search profile.json/.yml upward)")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only log errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log debug output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Run the profile's tasks (default)")
                .arg(
                    Arg::new("task")
                        .long("task")
                        .value_name("ID")
                        .value_parser(value_parser!(u32))
                        .help("Run only the task with this id"),
                )
                .arg(
                    Arg::new("output-dir")
                        .long("output-dir")
                        .value_name("DIR")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory receiving action output files"),
                )
                .arg(
                    Arg::new("executor")
                        .long("executor")
                        .value_name("PATH")
                        .value_parser(value_parser!(PathBuf))
                        .help("Tool executor binary"),
                ),
        )
        .subcommand(Command::new("validate").about("Check the profile and exit"))
        .subcommand(Command::new("list").about("List the profile's tasks"))
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Log filter directive from the flags, falling back to the profile level
pub fn level_filter(verbosity: Verbosity, profile_level: &str) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Verbose => "debug",
        Verbosity::Normal => match profile_level.trim().to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "error" | "fatal" => "error",
            _ => "info",
        },
    }
}

/// Install the tracing subscriber; `RUST_LOG` overrides everything
fn init_logging(verbosity: Verbosity, profile_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_filter(verbosity, profile_level)));

    // A subscriber may already be set when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_profile(matches: &ArgMatches) -> Result<(Profile, PathBuf)> {
    match matches.get_one::<PathBuf>("file") {
        Some(path) => {
            let profile = parse_profile_file(path)
                .with_context(|| format!("Failed to load profile {}", path.display()))?;
            Ok((profile, path.clone()))
        }
        None => parse_profile_auto().context("Failed to load profile"),
    }
}

/// Run the CLI application with the process arguments
///
/// Returns the process exit code.
pub async fn run() -> Result<i32> {
    run_from(std::env::args_os()).await
}

/// Run the CLI application with explicit arguments
pub async fn run_from<I, T>(args: I) -> Result<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = match build_command().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(e) => {
            // Help and version land here too
            e.print()?;
            return Ok(e.exit_code());
        }
    };
    let verbosity = get_verbosity(&matches);

    match matches.subcommand() {
        Some(("validate", _)) => cmd_validate(&matches, verbosity),
        Some(("list", _)) => {
            let (profile, path) = load_profile(&matches)?;
            cmd_list(&profile, &path);
            Ok(0)
        }
        Some(("run", sub)) => cmd_run(&matches, verbosity, RunOptions::from_matches(Some(sub))).await,
        _ => cmd_run(&matches, verbosity, RunOptions::from_matches(None)).await,
    }
}

/// Resolve the profile's variables and substitute them into every field
fn interpolated(profile: Profile, output_dir: &OutputDir) -> Profile {
    let aliases = resolve_variables(
        &profile,
        &VariableSources {
            output_dir: output_dir.path(),
            registry: &UnsupportedRegistry,
        },
    );
    interpolate_profile(profile, &aliases)
}

fn cmd_validate(matches: &ArgMatches, verbosity: Verbosity) -> Result<i32> {
    let (profile, path) = match load_profile(matches) {
        Ok(loaded) => loaded,
        Err(e) => {
            init_logging(verbosity, "");
            println!("{} {:#}", "✗".red(), e);
            return Ok(1);
        }
    };
    init_logging(verbosity, &profile.log_level);

    // Check what `run` would see
    let profile = interpolated(profile, &OutputDir::default_location());
    match validate_profile(&profile) {
        Ok(()) => {
            println!(
                "{} {} ({} tasks)",
                "✓".green(),
                path.display(),
                profile.tasks.len()
            );
            Ok(0)
        }
        Err(e) => {
            println!("{} {}: {}", "✗".red(), path.display(), e);
            Ok(1)
        }
    }
}

fn cmd_list(profile: &Profile, path: &std::path::Path) {
    println!("{} {}", "Profile:".bold(), path.display());
    if profile.tasks.is_empty() {
        println!("  (no tasks)");
        return;
    }

    let template = &profile.template;
    for task in &profile.tasks {
        let action = template
            .actions
            .iter()
            .find(|a| a.id == task.action_id)
            .map_or("<missing>", |a| a.name.as_str());
        let condition = match task.condition_id {
            0 => "-",
            id => template
                .conditions
                .iter()
                .find(|c| c.id == id)
                .map_or("<missing>", |c| c.name.as_str()),
        };
        println!(
            "  {:>4}  {:<24} action: {:<20} condition: {}",
            task.id.to_string().cyan(),
            task.name,
            action,
            condition
        );
    }
}

async fn cmd_run(matches: &ArgMatches, verbosity: Verbosity, options: RunOptions) -> Result<i32> {
    let (profile, path) = load_profile(matches)?;
    init_logging(verbosity, &profile.log_level);
    info!(profile = %path.display(), version = %profile.version, "Profile loaded");

    let output_dir = match &options.output_dir {
        Some(dir) => OutputDir::new(dir.clone()),
        None => OutputDir::default_location(),
    };

    let profile = interpolated(profile, &output_dir);
    validate_profile(&profile)
        .with_context(|| format!("Invalid profile {}", path.display()))?;

    let ctx = RunContext::new(Resolver::new(&profile))
        .with_output_dir(output_dir)
        .with_executor(options.executor.clone().unwrap_or_else(default_executor));
    let manager = Arc::new(TasksManager::new(&profile, ctx));

    let interrupt = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping tasks");
                manager.stop();
            }
        })
    };

    let summary = match options.task {
        Some(id) => run_single(&manager, id).await?,
        None => manager.run().await,
    };
    interrupt.abort();

    print_summary(&summary);
    Ok(if summary.is_success() { 0 } else { 1 })
}

async fn run_single(manager: &TasksManager, id: u32) -> Result<RunSummary> {
    let skipped = manager.skipped().iter().any(|s| s.id == id);
    if manager.handler(id).is_none() && !skipped {
        return Err(ConfigError::TaskNotFound(id).into());
    }

    if !skipped {
        if let Err(e) = manager.run_one(id).await {
            warn!(task_id = id, error = %e, "Task did not succeed");
        }
    }

    let mut summary = manager.summary();
    summary.reports.retain(|r| r.id == id);
    summary.skipped.retain(|s| s.id == id);
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!("{}", "Summary".bold());
    for report in &summary.reports {
        let state = report.state.to_string();
        let state = match report.state {
            HandlerState::DoneSuccess => state.green(),
            HandlerState::DoneFail => state.red(),
            HandlerState::Cancelled => state.yellow(),
            _ => state.dimmed(),
        };
        println!("  {:>4}  {:<24} {}", report.id, report.name, state);
    }
    for skipped in &summary.skipped {
        println!(
            "  {:>4}  {:<24} {} ({})",
            skipped.id,
            skipped.name,
            "Skipped".yellow(),
            skipped.reason
        );
    }
    println!("{}", summary);
}
