// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process interface.
//!
//! Hecate leans on external tools for the heavy lifting, i.e., the container
//! orchestrator and the ACME client. Instead of handing command strings to a
//! shell, every invocation is described by an [`ExternalCommand`] (program,
//! arguments, working directory, and exit codes considered successful), and
//! executed by a [`CommandRunner`]. Unexpected exit status is always an error
//! that names the failing command. Nothing is retried and nothing times out.

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
    time::Duration,
};
use tracing::{debug, info, instrument};

/// Description of one external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    expected_codes: Vec<i32>,
}

impl ExternalCommand {
    /// Construct new command expecting exit code 0.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            expected_codes: vec![0],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Replace the set of exit codes considered successful.
    pub fn expected_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.expected_codes = codes.into_iter().collect();
        self
    }

    pub fn program(&self) -> &str {
        self.program.as_str()
    }

    pub fn arguments(&self) -> &[String] {
        self.args.as_slice()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Check if exit status counts as success.
    ///
    /// Processes killed by a signal never succeed.
    pub fn is_expected(&self, status: ExitStatus) -> bool {
        status
            .code()
            .map(|code| self.expected_codes.contains(&code))
            .unwrap_or(false)
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(self.program.as_str());
        command.args(self.args.iter());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        command
    }

    fn status_error(&self, status: ExitStatus, message: String) -> ExecError {
        ExecError::Status {
            command: self.to_string(),
            code: status.code(),
            status: status.to_string(),
            message,
        }
    }
}

impl Display for ExternalCommand {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.program.as_str())?;
        for arg in &self.args {
            write!(fmt, " {arg}")?;
        }

        Ok(())
    }
}

/// Captured output of a finished process.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Combined stdout and stderr with trailing newline chomped.
    pub fn message(&self) -> String {
        let mut message = String::new();
        if !self.stdout.is_empty() {
            message.push_str(format!("stdout: {}", self.stdout).as_str());
        }

        if !self.stderr.is_empty() {
            message.push_str(format!("stderr: {}", self.stderr).as_str());
        }

        // INVARIANT: Chomp trailing newlines.
        message
            .strip_suffix("\r\n")
            .or(message.strip_suffix('\n'))
            .map(ToString::to_string)
            .unwrap_or(message)
    }
}

/// Execute external commands.
pub trait CommandRunner {
    /// Run command with captured output.
    ///
    /// # Errors
    ///
    /// - Return [`ExecError::Spawn`] if process cannot be started.
    /// - Return [`ExecError::Status`] if process exits with unexpected status.
    fn run(&self, command: &ExternalCommand) -> Result<CommandOutput>;

    /// Run command attached to the operator's terminal.
    ///
    /// # Errors
    ///
    /// - Return [`ExecError::Spawn`] if process cannot be started.
    /// - Return [`ExecError::Status`] if process exits with unexpected status.
    fn run_interactive(&self, command: &ExternalCommand) -> Result<()>;
}

/// Run commands as real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    spinner: bool,
}

impl SystemRunner {
    /// Construct new runner showing a spinner while captured commands run.
    pub fn new() -> Self {
        Self { spinner: true }
    }

    /// Construct new runner without spinner.
    pub fn quiet() -> Self {
        Self { spinner: false }
    }

    fn spinner(&self, command: &ExternalCommand) -> Result<ProgressBar> {
        if !self.spinner {
            return Ok(ProgressBar::hidden());
        }

        let style = ProgressStyle::with_template("{spinner:.green} {elapsed:.yellow}  {msg}")?;
        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_message(command.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Ok(bar)
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemRunner {
    #[instrument(skip(self, command), level = "debug")]
    fn run(&self, command: &ExternalCommand) -> Result<CommandOutput> {
        debug!("run {command}");
        let bar = self.spinner(command)?;
        let output = command.to_command().output();
        bar.finish_and_clear();

        let output = output.map_err(|err| ExecError::Spawn {
            source: err,
            command: command.to_string(),
        })?;
        let captured = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
        };

        if !command.is_expected(output.status) {
            return Err(command.status_error(output.status, captured.message()));
        }

        Ok(captured)
    }

    #[instrument(skip(self, command), level = "debug")]
    fn run_interactive(&self, command: &ExternalCommand) -> Result<()> {
        info!("run {command}");
        let status = command
            .to_command()
            .spawn()
            .and_then(|mut child| child.wait())
            .map_err(|err| ExecError::Spawn {
                source: err,
                command: command.to_string(),
            })?;

        if !command.is_expected(status) {
            return Err(command.status_error(status, String::new()));
        }

        Ok(())
    }
}

/// External process error types.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Process cannot be started.
    #[error("failed to start command {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Process exited with unexpected status.
    #[error("command {command:?} failed with {status}")]
    Status {
        command: String,
        code: Option<i32>,
        status: String,
        message: String,
    },

    /// Spinner template is invalid.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = ExecError> = std::result::Result<T, E>;
