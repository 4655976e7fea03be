// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command invocation.
//!
//! Every collaborating tool (Homebrew, gpg, zip, rsync, defaults, etc.) is
//! driven through the [`Shell`] trait. Callers describe a command as a
//! [`Syscall`], and the shell decides how to run it. The contract with every
//! tool is the same: invoke with fixed arguments, inspect exit status, treat
//! anything else as the tool being unavailable.

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::Duration,
};
use tracing::{debug, instrument};

/// Description of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syscall {
    program: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
}

impl Syscall {
    /// Construct new command description for target program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Self {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Run command from target directory.
    pub fn current_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(path.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(path) = &self.current_dir {
            command.current_dir(path);
        }

        command
    }
}

impl Display for Syscall {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.program)?;
        for arg in &self.args {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Layer of indirection for running external commands.
pub trait Shell {
    /// Check if program can be found on `PATH`.
    fn is_available(&self, program: &str) -> bool;

    /// Run command and capture its standard output.
    fn output(&self, syscall: &Syscall) -> Result<String>;

    /// Run command with the terminal attached, e.g., for password prompts.
    fn interactive(&self, syscall: &Syscall) -> Result<()>;
}

/// Shell that spawns real processes.
#[derive(Debug, Default, Clone)]
pub struct SystemShell {
    spinner: bool,
}

impl SystemShell {
    /// Construct new shell that runs commands quietly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a spinner while captured commands run.
    pub fn with_spinner(mut self) -> Self {
        self.spinner = true;
        self
    }

    fn start_spinner(&self, syscall: &Syscall) -> Option<ProgressBar> {
        if !self.spinner {
            return None;
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.yellow} {elapsed:>4} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(syscall.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Some(bar)
    }
}

impl Shell for SystemShell {
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    #[instrument(skip_all, fields(syscall = %syscall), level = "debug")]
    fn output(&self, syscall: &Syscall) -> Result<String> {
        let bar = self.start_spinner(syscall);
        let output = syscall
            .to_command()
            .stdin(Stdio::null())
            .output()
            .map_err(|err| SyscallError::Spawn {
                program: syscall.program.clone(),
                source: err,
            });
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        let output = output?;

        let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

        if !output.status.success() {
            return Err(SyscallError::Failed {
                command: syscall.to_string(),
                message: chomp(stderr),
            });
        }

        debug!("{} bytes of output", stdout.len());
        Ok(stdout)
    }

    #[instrument(skip_all, fields(syscall = %syscall), level = "debug")]
    fn interactive(&self, syscall: &Syscall) -> Result<()> {
        let status = syscall
            .to_command()
            .spawn()
            .map_err(|err| SyscallError::Spawn {
                program: syscall.program.clone(),
                source: err,
            })?
            .wait()
            .map_err(|err| SyscallError::Spawn {
                program: syscall.program.clone(),
                source: err,
            })?;

        if !status.success() {
            return Err(SyscallError::Failed {
                command: syscall.to_string(),
                message: status.to_string(),
            });
        }

        Ok(())
    }
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: String) -> String {
    message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message)
}

/// External command error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Program could not be started at all.
    #[error("failed to run {program:?}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Program ran, but exited with failure.
    #[error("command {command:?} failed: {message}")]
    Failed { command: String, message: String },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;
