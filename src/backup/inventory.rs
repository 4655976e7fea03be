// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Inventory scanner.
//!
//! Read-only probe of the system that tells the operator how much data each
//! backup item would cover before anything is selected. The scan never mutates
//! anything, and a failing probe only ever degrades into a "not available"
//! notice.

use crate::{
    backup::{
        files::{disk_usage, human_size},
        handler::count_secret_keys,
        item::BackupItem,
    },
    config::Config,
    repo,
    syscall::{Shell, Syscall, SyscallError},
};

use glob::glob;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};
use tracing::{debug, instrument, warn};

/// Result of probing one backup item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Available(String),
    Unavailable(String),
}

/// Probe results of every backup item, in menu order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryReport {
    pub entries: Vec<(BackupItem, Probe)>,
}

impl Display for InventoryReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (item, probe) in &self.entries {
            match probe {
                Probe::Available(text) => writeln!(fmt, "  {:<16}{text}", item.key())?,
                Probe::Unavailable(reason) => {
                    writeln!(fmt, "  {:<16}not available ({reason})", item.key())?
                }
            }
        }

        Ok(())
    }
}

/// Read-only system prober.
pub struct InventoryScanner<'a, S>
where
    S: Shell,
{
    config: &'a Config,
    home: &'a Path,
    shell: &'a S,
}

impl<'a, S> InventoryScanner<'a, S>
where
    S: Shell,
{
    pub fn new(config: &'a Config, home: &'a Path, shell: &'a S) -> Self {
        Self {
            config,
            home,
            shell,
        }
    }

    /// Probe every backup item.
    #[instrument(skip(self), level = "debug")]
    pub fn scan(&self) -> InventoryReport {
        let entries = BackupItem::ALL
            .into_iter()
            .map(|item| {
                let probe = self.probe(item).unwrap_or_else(|err| {
                    debug!("probe {item} failed: {err}");
                    Probe::Unavailable(err.to_string())
                });
                (item, probe)
            })
            .collect();

        InventoryReport { entries }
    }

    fn probe(&self, item: BackupItem) -> Result<Probe> {
        match item {
            BackupItem::Brewfile => self.probe_brew(),
            BackupItem::GitRepos => self.probe_repos(),
            BackupItem::SshKeys => self.probe_ssh_keys(),
            BackupItem::GpgKeys => self.probe_gpg_keys(),
            BackupItem::Configs => Ok(self.probe_configs()),
            BackupItem::Claude => Ok(self.probe_claude()),
            BackupItem::MacosDefaults => Ok(self.probe_defaults()),
            BackupItem::Documents => Ok(self.probe_documents()),
        }
    }

    fn require(&self, program: &str) -> Result<()> {
        if self.shell.is_available(program) {
            Ok(())
        } else {
            Err(ProbeError::MissingTool(program.to_string()))
        }
    }

    fn count_lines(&self, syscall: &Syscall) -> Result<usize> {
        let output = self.shell.output(syscall)?;
        Ok(output.lines().filter(|line| !line.trim().is_empty()).count())
    }

    fn probe_brew(&self) -> Result<Probe> {
        self.require("brew")?;
        let formulae = self.count_lines(&Syscall::new("brew").args(["list", "--formula", "-1"]))?;
        let casks = self.count_lines(&Syscall::new("brew").args(["list", "--cask", "-1"]))?;

        Ok(Probe::Available(format!("{formulae} formulae, {casks} casks")))
    }

    fn probe_repos(&self) -> Result<Probe> {
        let projects = &self.config.settings.projects_dir;
        if !projects.is_dir() {
            return Ok(Probe::Unavailable(format!("{} missing", projects.display())));
        }

        let mut inspected = 0;
        let mut unsynced = 0;
        for path in repo::discover(projects) {
            match repo::inspect(&path) {
                Ok(status) => {
                    inspected += 1;
                    unsynced += usize::from(!status.is_synced());
                }
                Err(error) => warn!("cannot inspect {}: {error}", path.display()),
            }
        }

        Ok(Probe::Available(format!(
            "{inspected} repositories, {unsynced} with uncommitted or unpushed work"
        )))
    }

    fn probe_ssh_keys(&self) -> Result<Probe> {
        let ssh_dir = self.home.join(".ssh");
        if !ssh_dir.is_dir() {
            return Ok(Probe::Unavailable(format!("{} missing", ssh_dir.display())));
        }

        let pattern = ssh_dir.join("id_*");
        let count = glob(&pattern.to_string_lossy())?
            .flatten()
            .filter(|path| path.extension().is_none_or(|ext| ext != "pub"))
            .count();

        Ok(Probe::Available(format!("{count} private keys")))
    }

    fn probe_gpg_keys(&self) -> Result<Probe> {
        self.require("gpg")?;
        let listing = self
            .shell
            .output(&Syscall::new("gpg").args(["--list-secret-keys", "--with-colons"]))?;

        Ok(Probe::Available(format!(
            "{} secret keys",
            count_secret_keys(&listing)
        )))
    }

    fn probe_configs(&self) -> Probe {
        let present: Vec<_> = self
            .config
            .sources
            .configs
            .iter()
            .map(|relative| self.home.join(relative))
            .filter(|path| path.exists())
            .collect();
        let size: u64 = present.iter().map(disk_usage).sum();

        Probe::Available(format!(
            "{} of {} configured paths present, {}",
            present.len(),
            self.config.sources.configs.len(),
            human_size(size)
        ))
    }

    fn probe_claude(&self) -> Probe {
        let claude_dir = &self.config.sources.claude_dir;
        if !claude_dir.is_dir() {
            return Probe::Unavailable(format!("{} missing", claude_dir.display()));
        }

        Probe::Available(human_size(disk_usage(claude_dir)))
    }

    fn probe_defaults(&self) -> Probe {
        if !self.shell.is_available("defaults") {
            return Probe::Unavailable("defaults not found on PATH".into());
        }

        Probe::Available(format!(
            "{} preference domains",
            self.config.sources.defaults_domains.len()
        ))
    }

    fn probe_documents(&self) -> Probe {
        let sizes: Vec<String> = self
            .config
            .sources
            .documents
            .iter()
            .filter(|folder| folder.is_dir())
            .map(|folder| format!("{} {}", folder.display(), human_size(disk_usage(folder))))
            .collect();

        if sizes.is_empty() {
            return Probe::Unavailable("no configured folder exists".into());
        }

        Probe::Available(sizes.join(", "))
    }
}

/// Inventory probe error types.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Tool needed by probe is not installed.
    #[error("{0} not found on PATH")]
    MissingTool(String),

    /// Tool ran, but failed.
    #[error(transparent)]
    Syscall(#[from] SyscallError),

    /// Glob pattern could not be built from path.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

/// Friendly result alias :3
type Result<T, E = ProbeError> = std::result::Result<T, E>;
