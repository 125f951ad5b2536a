//! Action command execution
//!
//! This module composes tool command lines from the executable allow-list
//! and runs them through a [`Launcher`] bound to a [`Deadline`].

use crate::config::Action;
use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::Deadline;
use crate::system::OutputDir;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tracing::{debug, error, trace};

/// Executables a profile may name, with the executor flags selecting them
pub const EXECUTABLE_FLAGS: &[(&str, &[&str])] = &[
    ("wpr.exe", &["-w"]),
    ("toolDiskVolScan.exe", &["-d"]),
    ("dsa_control.cmd", &["-t", "dsa_control"]),
    ("dsa_query.cmd", &["-t", "dsa_query"]),
    ("sendCommand.cmd", &["-t", "sendCommand"]),
    ("ratt.exe", &["-t", "ratt"]),
];

/// Executor flags for an allowed executable
pub fn executable_flags(executable: &str) -> Option<&'static [&'static str]> {
    EXECUTABLE_FLAGS
        .iter()
        .find(|(name, _)| *name == executable)
        .map(|(_, flags)| *flags)
}

pub fn is_allowed_executable(executable: &str) -> bool {
    executable_flags(executable).is_some()
}

/// A fully composed process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Capture stdout and stderr instead of discarding them
    pub capture: bool,
}

impl LaunchRequest {
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Exit status and captured output of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOutput {
    pub code: Option<i32>,
    pub success: bool,
    /// stdout and stderr in arrival order, empty unless captured
    pub output: Vec<u8>,
}

/// Spawns processes bound to a deadline
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Run the request to completion, killing it if the deadline fires
    async fn launch(&self, request: &LaunchRequest, deadline: &Deadline)
        -> ExecutionResult<LaunchOutput>;
}

/// Launcher backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(
        &self,
        request: &LaunchRequest,
        deadline: &Deadline,
    ) -> ExecutionResult<LaunchOutput> {
        if let Some(cause) = deadline.cause() {
            return Err(ExecutionError::Cancelled(cause));
        }

        let mut command = TokioCommand::new(&request.program);
        command.args(&request.args);
        command.stdin(Stdio::null());
        if request.capture {
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null());
            command.stderr(Stdio::null());
        }
        // Dropping the child on cancellation kills it
        command.kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ExecutionError::Spawn {
            program: request.program.clone(),
            source,
        })?;

        let finished = async {
            let mut combined = Vec::new();
            if let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) {
                read_interleaved(stdout, stderr, &mut combined).await?;
            }
            let status = child.wait().await?;
            Ok::<_, io::Error>((status, combined))
        };

        tokio::select! {
            result = finished => {
                let (status, output) = result.map_err(|source| ExecutionError::Spawn {
                    program: request.program.clone(),
                    source,
                })?;
                Ok(LaunchOutput {
                    code: status.code(),
                    success: status.success(),
                    output,
                })
            }
            cause = deadline.done() => {
                debug!(program = %request.program.display(), %cause, "Killing process");
                Err(ExecutionError::Cancelled(cause))
            }
        }
    }
}

/// Drain both streams into `combined` in the order chunks arrive
async fn read_interleaved<O, E>(
    mut stdout: O,
    mut stderr: E,
    combined: &mut Vec<u8>,
) -> io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    let (mut out_open, mut err_open) = (true, true);

    while out_open || err_open {
        tokio::select! {
            biased;
            read = stdout.read(&mut out_buf), if out_open => match read? {
                0 => out_open = false,
                n => combined.extend_from_slice(&out_buf[..n]),
            },
            read = stderr.read(&mut err_buf), if err_open => match read? {
                0 => err_open = false,
                n => combined.extend_from_slice(&err_buf[..n]),
            },
        }
    }
    Ok(())
}

/// Compose the command line for an action
///
/// Fails closed for executables outside the allow-list.
pub fn compose_request(executor: &Path, action: &Action) -> ExecutionResult<LaunchRequest> {
    let flags = executable_flags(&action.executable)
        .ok_or_else(|| ExecutionError::NotAllowed(action.executable.clone()))?;

    let mut args: Vec<String> = flags.iter().map(|f| f.to_string()).collect();
    for argument in &action.arguments {
        for part in [&argument.command, &argument.value] {
            let part = part.trim();
            if !part.is_empty() {
                args.push(part.to_string());
            }
        }
    }

    Ok(LaunchRequest {
        program: executor.to_path_buf(),
        args,
        capture: action.output_file().is_some(),
    })
}

/// Run one action to completion
pub async fn execute_action(
    action: &Action,
    executor: &Path,
    launcher: &dyn Launcher,
    output_dir: &OutputDir,
    deadline: &Deadline,
) -> ExecutionResult<()> {
    let request = compose_request(executor, action)?;
    trace!(action_id = action.id, command = %request.display(), "Execute command");

    let result = launcher.launch(&request, deadline).await?;

    if let Some(file_name) = action.output_file() {
        if let Err(e) = output_dir.append(file_name, &result.output) {
            error!(action_id = action.id, file = file_name, error = %e, "Failed to write action output");
        }
    }

    if !result.success {
        return Err(ExecutionError::CommandFailed(result.code));
    }

    Ok(())
}
