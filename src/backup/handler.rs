// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup item handlers.
//!
//! Each [`BackupItem`] has exactly one handler. Handlers are independent of
//! one another, and every side effect they have is local: files written into
//! the dotfiles repository, archives or synced folders written into the iCloud
//! backup directory, and read-only queries against git and Homebrew. None of
//! them can be rolled back.

use crate::{
    backup::{
        dispatch::ItemOutcome,
        files::{copy_path, file_count},
        item::BackupItem,
    },
    config::Config,
    repo::{self, RepoStatus},
    syscall::{Shell, Syscall, SyscallError, SystemShell},
};

use chrono::NaiveDate;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Files and directories of the Claude configuration directory worth keeping.
const CLAUDE_ENTRIES: [&str; 4] = ["CLAUDE.md", "settings.json", "commands", "agents"];

/// Layer of indirection for running backup item handlers.
pub trait BackupHandler {
    /// Run the handler of target item.
    fn run(&self, item: BackupItem) -> Result<ItemOutcome>;
}

/// Handlers that act on the real system.
#[derive(Debug, Clone)]
pub struct SystemHandler<S = SystemShell>
where
    S: Shell,
{
    config: Config,
    home: PathBuf,
    date: NaiveDate,
    shell: S,
}

impl<S> SystemHandler<S>
where
    S: Shell,
{
    /// Construct new system handler.
    ///
    /// Target date is stamped into the names of created archives.
    pub fn new(config: Config, home: impl Into<PathBuf>, date: NaiveDate, shell: S) -> Self {
        Self {
            config,
            home: home.into(),
            date,
            shell,
        }
    }

    fn dotfiles_dir(&self) -> &Path {
        &self.config.settings.dotfiles_dir
    }

    fn icloud_dir(&self) -> &Path {
        &self.config.settings.icloud_backup_dir
    }

    fn missing_tool(&self, programs: &[&str]) -> Option<ItemOutcome> {
        programs
            .iter()
            .find(|program| !self.shell.is_available(program))
            .map(|program| ItemOutcome::Skipped {
                reason: format!("{program} not found on PATH"),
            })
    }

    fn missing_icloud(&self) -> Option<ItemOutcome> {
        (!self.icloud_dir().is_dir()).then(|| ItemOutcome::Skipped {
            reason: format!("iCloud backup directory {:?} missing", self.icloud_dir()),
        })
    }

    fn archive_path(&self, stem: &str) -> PathBuf {
        self.icloud_dir().join(format!("{stem}-{}.zip", self.date))
    }

    #[instrument(skip(self), level = "debug")]
    fn dump_brewfile(&self) -> Result<ItemOutcome> {
        if let Some(skip) = self.missing_tool(&["brew"]) {
            return Ok(skip);
        }

        let brewfile = self.dotfiles_dir().join("Brewfile");
        self.shell.output(
            &Syscall::new("brew")
                .args(["bundle", "dump", "--force", "--describe"])
                .arg(format!("--file={}", brewfile.display())),
        )?;

        let content = fs::read_to_string(&brewfile).map_err(|err| HandlerError::Io {
            source: err,
            path: brewfile.clone(),
        })?;
        let count = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .count();
        info!("dumped {count} Brewfile entries");

        Ok(ItemOutcome::Saved {
            location: Some(brewfile),
            count: Some(count),
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn verify_git_repos(&self) -> Result<ItemOutcome> {
        let projects = &self.config.settings.projects_dir;
        if !projects.is_dir() {
            return Ok(ItemOutcome::Skipped {
                reason: format!("projects directory {projects:?} missing"),
            });
        }

        let mut statuses = Vec::new();
        for path in repo::discover(projects) {
            match repo::inspect(&path) {
                Ok(status) => statuses.push(status),
                Err(err) => warn!("cannot inspect {:?}: {err}", path.display()),
            }
        }

        let count = statuses.len();
        let unsynced: Vec<RepoStatus> = statuses
            .into_iter()
            .filter(|status| !status.is_synced())
            .collect();
        if !unsynced.is_empty() {
            return Err(HandlerError::UnsyncedRepos(unsynced));
        }

        info!("all {count} repositories committed and pushed");
        Ok(ItemOutcome::Verified { count })
    }

    #[instrument(skip(self), level = "debug")]
    fn archive_ssh_keys(&self) -> Result<ItemOutcome> {
        if let Some(skip) = self.missing_tool(&["zip"]).or_else(|| self.missing_icloud()) {
            return Ok(skip);
        }

        let ssh_dir = self.home.join(".ssh");
        if !ssh_dir.is_dir() {
            return Ok(ItemOutcome::Skipped {
                reason: format!("{:?} missing", ssh_dir.display()),
            });
        }

        let archive = self.archive_path("ssh-keys");
        remove_stale(&archive)?;
        info!("enter a password to encrypt {:?}", archive.display());
        self.shell.interactive(
            &Syscall::new("zip")
                .args(["-r", "-q", "-e"])
                .arg(&archive)
                .arg(".ssh")
                .current_dir(&self.home),
        )?;

        Ok(ItemOutcome::Saved {
            location: Some(archive),
            count: Some(file_count(&ssh_dir)),
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn archive_gpg_keys(&self) -> Result<ItemOutcome> {
        if let Some(skip) = self
            .missing_tool(&["gpg", "zip"])
            .or_else(|| self.missing_icloud())
        {
            return Ok(skip);
        }

        let listing = self.shell.output(
            &Syscall::new("gpg").args(["--list-secret-keys", "--with-colons"]),
        )?;
        let count = count_secret_keys(&listing);
        if count == 0 {
            return Ok(ItemOutcome::Skipped {
                reason: "no GPG secret keys".into(),
            });
        }

        let armored = self.shell.output(
            &Syscall::new("gpg").args(["--export-secret-keys", "--armor"]),
        )?;

        // INVARIANT: Plain-text key material only ever lives in a private
        // temporary directory that is removed on drop.
        let staging = tempfile::TempDir::new().map_err(|err| HandlerError::Io {
            source: err,
            path: std::env::temp_dir(),
        })?;
        let export = staging.path().join("gpg-secret-keys.asc");
        fs::write(&export, armored).map_err(|err| HandlerError::Io {
            source: err,
            path: export.clone(),
        })?;

        let archive = self.archive_path("gpg-keys");
        remove_stale(&archive)?;
        info!("enter a password to encrypt {:?}", archive.display());
        self.shell.interactive(
            &Syscall::new("zip")
                .args(["-j", "-q", "-e"])
                .arg(&archive)
                .arg(&export),
        )?;

        Ok(ItemOutcome::Saved {
            location: Some(archive),
            count: Some(count),
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn copy_configs(&self) -> Result<ItemOutcome> {
        let target = self.dotfiles_dir().join("config");
        let mut copied = 0;
        let mut found = false;

        for relative in &self.config.sources.configs {
            let src = self.home.join(relative);
            if !src.exists() {
                debug!("skip missing config {:?}", src.display());
                continue;
            }

            found = true;
            let dst = target.join(relative);
            copied += copy_path(&src, &dst).map_err(|err| HandlerError::Io {
                source: err,
                path: src.clone(),
            })?;
        }

        if !found {
            return Ok(ItemOutcome::Skipped {
                reason: "none of the configured config files exist".into(),
            });
        }

        info!("copied {copied} config files into {:?}", target.display());
        Ok(ItemOutcome::Saved {
            location: Some(target),
            count: Some(copied),
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn copy_claude(&self) -> Result<ItemOutcome> {
        let claude_dir = &self.config.sources.claude_dir;
        if !claude_dir.is_dir() {
            return Ok(ItemOutcome::Skipped {
                reason: format!("{:?} missing", claude_dir.display()),
            });
        }

        let target = self.dotfiles_dir().join("claude");
        let mut copied = 0;
        for entry in CLAUDE_ENTRIES {
            let src = claude_dir.join(entry);
            if !src.exists() {
                continue;
            }

            copied += copy_path(&src, target.join(entry)).map_err(|err| HandlerError::Io {
                source: err,
                path: src.clone(),
            })?;
        }

        info!("copied {copied} Claude files into {:?}", target.display());
        Ok(ItemOutcome::Saved {
            location: Some(target),
            count: Some(copied),
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn export_defaults(&self) -> Result<ItemOutcome> {
        if let Some(skip) = self.missing_tool(&["defaults"]) {
            return Ok(skip);
        }

        let target = self.dotfiles_dir().join("macos");
        mkdirp::mkdirp(&target).map_err(|err| HandlerError::Io {
            source: err,
            path: target.clone(),
        })?;

        let domains = &self.config.sources.defaults_domains;
        let mut exported = 0;
        for domain in domains {
            let plist = target.join(format!("{domain}.plist"));
            match self
                .shell
                .output(&Syscall::new("defaults").arg("export").arg(domain).arg(&plist))
            {
                Ok(_) => exported += 1,
                Err(err) => warn!("cannot export {domain}: {err}"),
            }
        }

        if exported == 0 && !domains.is_empty() {
            return Err(HandlerError::NothingExported);
        }

        info!("exported {exported} of {} preference domains", domains.len());
        Ok(ItemOutcome::Saved {
            location: Some(target),
            count: Some(exported),
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn sync_documents(&self) -> Result<ItemOutcome> {
        if let Some(skip) = self.missing_tool(&["rsync"]).or_else(|| self.missing_icloud()) {
            return Ok(skip);
        }

        let target = self.icloud_dir().join("documents");
        let mut synced = 0;
        let mut last_error = None;
        for folder in &self.config.sources.documents {
            let Some(name) = folder.file_name().filter(|_| folder.is_dir()) else {
                warn!("skip missing folder {:?}", folder.display());
                continue;
            };

            let dst = target.join(name);
            mkdirp::mkdirp(&dst).map_err(|err| HandlerError::Io {
                source: err,
                path: dst.clone(),
            })?;

            // INVARIANT: Trailing slashes sync folder contents, not the folder.
            let result = self.shell.output(
                &Syscall::new("rsync")
                    .args(["-a", "--delete"])
                    .arg(format!("{}/", folder.display()))
                    .arg(format!("{}/", dst.display())),
            );
            match result {
                Ok(_) => synced += 1,
                Err(err) => {
                    warn!("cannot sync {:?}: {err}", folder.display());
                    last_error = Some(err);
                }
            }
        }

        if synced == 0 {
            return match last_error {
                Some(err) => Err(err.into()),
                None => Ok(ItemOutcome::Skipped {
                    reason: "none of the configured folders exist".into(),
                }),
            };
        }

        info!("synced {synced} folders into {:?}", target.display());
        Ok(ItemOutcome::Saved {
            location: Some(target),
            count: Some(synced),
        })
    }
}

impl<S> BackupHandler for SystemHandler<S>
where
    S: Shell,
{
    fn run(&self, item: BackupItem) -> Result<ItemOutcome> {
        match item {
            BackupItem::Brewfile => self.dump_brewfile(),
            BackupItem::GitRepos => self.verify_git_repos(),
            BackupItem::SshKeys => self.archive_ssh_keys(),
            BackupItem::GpgKeys => self.archive_gpg_keys(),
            BackupItem::Configs => self.copy_configs(),
            BackupItem::Claude => self.copy_claude(),
            BackupItem::MacosDefaults => self.export_defaults(),
            BackupItem::Documents => self.sync_documents(),
        }
    }
}

/// Count secret keys in `gpg --with-colons` listing.
pub fn count_secret_keys(listing: &str) -> usize {
    listing.lines().filter(|line| line.starts_with("sec:")).count()
}

// INVARIANT: zip updates existing archives in place, so start fresh.
fn remove_stale(archive: &Path) -> Result<()> {
    if archive.exists() {
        fs::remove_file(archive).map_err(|err| HandlerError::Io {
            source: err,
            path: archive.to_path_buf(),
        })?;
    }

    Ok(())
}

/// Backup handler error types.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Project repositories hold work that is not committed or pushed.
    #[error("{} repositories have uncommitted or unpushed work", .0.len())]
    UnsyncedRepos(Vec<RepoStatus>),

    /// Not a single preference domain could be exported.
    #[error("no preference domain could be exported")]
    NothingExported,

    /// External tool failed.
    #[error(transparent)]
    Syscall(#[from] SyscallError),

    /// File could not be read or written.
    #[error("file operation failed at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = HandlerError> = std::result::Result<T, E>;
