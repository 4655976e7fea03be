// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup workflow.
//!
//! Drives a single backup run through inventory, selection, execution, and
//! manifest phases. Everything the run touches in the outside world is handed
//! in: the operator through a [`Prompter`], subprocesses through a [`Shell`],
//! and item side effects through a [`BackupHandler`].

use crate::{
    backup::{
        dispatch, run_menu, BackupHandler, BackupItem, BackupManifest, DispatchError,
        InventoryReport, InventoryScanner, MachineInfo, ManifestError, Menu, MenuPhase, Selection,
    },
    config::Config,
    path::manifest_dir,
    prompt::{PromptError, Prompter},
    repo::{DotfilesRepo, RepoError},
    syscall::Shell,
};

use chrono::{DateTime, Local, NaiveDate, Utc};
use git2::Oid;
use indicatif::ProgressBar;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// How a backup run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Operator submitted an empty selection.
    NothingSelected,

    /// Operator declined or canceled the selection.
    Cancelled,

    /// Operator aborted over unsynced project repositories.
    Aborted,

    /// Every selected handler ran, and the manifest was written.
    Completed {
        manifest: PathBuf,
        commit: Option<Oid>,
        failures: Vec<BackupItem>,
    },
}

/// Single run of the backup pipeline.
pub struct Workflow<'a, H, P, S>
where
    H: BackupHandler,
    P: Prompter,
    S: Shell,
{
    config: &'a Config,
    home: &'a Path,
    now: DateTime<Local>,
    handler: &'a H,
    prompter: &'a mut P,
    shell: &'a S,
}

impl<'a, H, P, S> Workflow<'a, H, P, S>
where
    H: BackupHandler,
    P: Prompter,
    S: Shell,
{
    /// Construct new backup run.
    ///
    /// Target timestamp stamps the manifest, and its local calendar date names
    /// the manifest file.
    pub fn new(
        config: &'a Config,
        home: &'a Path,
        now: DateTime<Local>,
        handler: &'a H,
        prompter: &'a mut P,
        shell: &'a S,
    ) -> Self {
        Self {
            config,
            home,
            now,
            handler,
            prompter,
            shell,
        }
    }

    /// Run every phase of the backup pipeline.
    ///
    /// # Errors
    ///
    /// - Return [`WorkflowError::MissingDotfiles`] or
    ///   [`WorkflowError::NotARepository`] before any phase runs if the
    ///   dotfiles repository is unusable.
    /// - Return [`WorkflowError::Prompt`] if the operator cannot be prompted.
    /// - Return [`WorkflowError::Manifest`] or [`WorkflowError::Repo`] if the
    ///   manifest cannot be written or staged.
    #[instrument(skip(self), level = "debug")]
    pub fn run(mut self) -> Result<RunOutcome> {
        let repo = open_dotfiles(self.config)?;

        let report = scan(self.config, self.home, self.shell);
        info!("inventory:\n{report}");

        let menu = run_menu(&mut *self.prompter, Menu::new(Selection::default()))?;
        let selection = match menu.phase {
            MenuPhase::Proceed => menu.selection,
            MenuPhase::Empty => {
                info!("nothing selected, exiting");
                return Ok(RunOutcome::NothingSelected);
            }
            _ => {
                info!("backup cancelled");
                return Ok(RunOutcome::Cancelled);
            }
        };

        let report = match dispatch(&selection, self.handler, &mut *self.prompter) {
            Ok(report) => report,
            Err(DispatchError::Aborted { repos }) => {
                warn!("backup aborted, {} repositories need attention", repos.len());
                return Ok(RunOutcome::Aborted);
            }
            Err(DispatchError::Prompt(error)) => return Err(error.into()),
        };

        let dotfiles_repo = Some(self.config.settings.dotfiles_repo.clone())
            .filter(|url| !url.is_empty())
            .or_else(|| repo.remote_url(&self.config.settings.remote))
            .unwrap_or_default();
        let manifest = BackupManifest::new(
            &report,
            MachineInfo::probe(self.shell),
            self.now.with_timezone(&Utc),
            &self.config.settings.icloud_backup_dir,
            dotfiles_repo,
        );
        let date = self.now.date_naive();
        let path = manifest.write(&self.config.settings.dotfiles_dir, date)?;
        info!("manifest written to {}", path.display());

        repo.stage_all()?;
        let commit = self.commit_and_push(&repo, date)?;

        let failures: Vec<_> = report.failures().collect();
        for item in &failures {
            warn!("{} did not complete", item.label());
        }

        Ok(RunOutcome::Completed {
            manifest: path,
            commit,
            failures,
        })
    }

    fn commit_and_push(&mut self, repo: &DotfilesRepo, date: NaiveDate) -> Result<Option<Oid>> {
        let proceed = match self.prompter.confirm("Commit and push the backup?", true) {
            Ok(proceed) => proceed,
            Err(PromptError::Canceled) => false,
            Err(error) => return Err(error.into()),
        };

        if !proceed {
            info!("changes left staged in {}", self.config.settings.dotfiles_dir.display());
            return Ok(None);
        }

        let commit = match repo.commit(&format!("backup: {}", date.format("%Y-%m-%d"))) {
            Ok(commit) => commit,
            Err(error) => {
                warn!("failed to commit backup, changes left staged: {error}");
                return Ok(None);
            }
        };

        let remote = &self.config.settings.remote;
        if let Err(error) = repo.push(remote, ProgressBar::no_length()) {
            warn!("failed to push to {remote}: {error}");
        }

        Ok(commit)
    }
}

/// Probe the system for every backup item.
pub fn scan(config: &Config, home: &Path, shell: &impl Shell) -> InventoryReport {
    InventoryScanner::new(config, home, shell).scan()
}

/// List manifests of previous backups, newest first.
///
/// # Errors
///
/// - Return [`WorkflowError::Manifest`] if the manifest directory exists but
///   cannot be read.
pub fn history(config: &Config) -> Result<Vec<PathBuf>> {
    let dir = manifest_dir(&config.settings.dotfiles_dir);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(&dir).map_err(|err| ManifestError::Io {
        source: err,
        path: dir.clone(),
    })?;
    let mut manifests: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();

    // INVARIANT: File names are ISO dates, so name order is date order.
    manifests.sort();
    manifests.reverse();

    Ok(manifests)
}

/// Check that the dotfiles repository can be backed up into.
///
/// # Errors
///
/// - Return [`WorkflowError::MissingDotfiles`] if directory does not exist.
/// - Return [`WorkflowError::NotARepository`] if directory is not a git
///   repository.
pub fn open_dotfiles(config: &Config) -> Result<DotfilesRepo> {
    let path = &config.settings.dotfiles_dir;
    if !path.is_dir() {
        return Err(WorkflowError::MissingDotfiles(path.clone()));
    }

    DotfilesRepo::open(path).map_err(|err| WorkflowError::NotARepository {
        path: path.clone(),
        source: err,
    })
}

/// Backup workflow error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Dotfiles directory does not exist.
    #[error("dotfiles directory {} does not exist", .0.display())]
    MissingDotfiles(PathBuf),

    /// Dotfiles directory is not a git repository.
    #[error("dotfiles directory {} is not a git repository", path.display())]
    NotARepository {
        #[source]
        source: RepoError,
        path: PathBuf,
    },

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Friendly result alias :3
pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backup::{handler::Result as HandlerResult, ItemOutcome},
        config::VaultSettings,
        prompt::ScriptedPrompter,
        syscall::{Syscall, SyscallError},
    };
    use git2::Repository;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct Offline;

    impl Shell for Offline {
        fn is_available(&self, _program: &str) -> bool {
            false
        }

        fn output(&self, syscall: &Syscall) -> crate::syscall::Result<String> {
            Err(SyscallError::Failed {
                command: syscall.to_string(),
                message: "offline".into(),
            })
        }

        fn interactive(&self, syscall: &Syscall) -> crate::syscall::Result<()> {
            self.output(syscall).map(|_| ())
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<BackupItem>>,
    }

    impl BackupHandler for Recorder {
        fn run(&self, item: BackupItem) -> HandlerResult<ItemOutcome> {
            self.calls.borrow_mut().push(item);
            Ok(ItemOutcome::Saved {
                location: None,
                count: None,
            })
        }
    }

    fn config(dotfiles: &Path) -> Config {
        Config {
            settings: VaultSettings {
                dotfiles_dir: dotfiles.to_path_buf(),
                ..VaultSettings::default()
            },
            ..Config::default()
        }
    }

    fn init(path: &Path) -> anyhow::Result<()> {
        let repo = Repository::init(path)?;
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;
        Ok(())
    }

    #[test]
    fn missing_dotfiles_fails_before_any_phase() -> anyhow::Result<()> {
        let home = TempDir::new()?;
        let config = config(&home.path().join("nope"));
        let handler = Recorder::default();
        let mut prompter = ScriptedPrompter::default();

        let result = Workflow::new(
            &config,
            home.path(),
            Local::now(),
            &handler,
            &mut prompter,
            &Offline,
        )
        .run();

        assert!(matches!(result, Err(WorkflowError::MissingDotfiles(..))));
        assert!(prompter.screens.is_empty());

        Ok(())
    }

    #[test]
    fn plain_directory_is_not_a_repository() -> anyhow::Result<()> {
        let home = TempDir::new()?;
        let config = config(home.path());

        assert!(matches!(
            open_dotfiles(&config),
            Err(WorkflowError::NotARepository { .. })
        ));

        Ok(())
    }

    #[test]
    fn empty_selection_writes_no_manifest() -> anyhow::Result<()> {
        let home = TempDir::new()?;
        init(home.path())?;
        let config = config(home.path());
        let handler = Recorder::default();
        let mut prompter = ScriptedPrompter::new(["n", ""], Vec::<bool>::new());

        let result = Workflow::new(
            &config,
            home.path(),
            Local::now(),
            &handler,
            &mut prompter,
            &Offline,
        )
        .run()?;

        assert_eq!(result, RunOutcome::NothingSelected);
        assert!(handler.calls.borrow().is_empty());
        assert!(!manifest_dir(home.path()).exists());

        Ok(())
    }

    #[test]
    fn declined_confirmation_cancels() -> anyhow::Result<()> {
        let home = TempDir::new()?;
        init(home.path())?;
        let config = config(home.path());
        let handler = Recorder::default();
        let mut prompter = ScriptedPrompter::new([""], [false]);

        let result = Workflow::new(
            &config,
            home.path(),
            Local::now(),
            &handler,
            &mut prompter,
            &Offline,
        )
        .run()?;

        assert_eq!(result, RunOutcome::Cancelled);
        assert!(handler.calls.borrow().is_empty());

        Ok(())
    }

    #[test]
    fn history_lists_newest_first() -> anyhow::Result<()> {
        let home = TempDir::new()?;
        let backups = manifest_dir(home.path());
        fs::create_dir_all(&backups)?;
        for name in ["2025-12-31.json", "2026-10-19.json", "2026-01-02.json", "notes.txt"] {
            fs::write(backups.join(name), "{}")?;
        }

        let result = history(&config(home.path()))?;
        assert_eq!(
            result,
            vec![
                backups.join("2026-10-19.json"),
                backups.join("2026-01-02.json"),
                backups.join("2025-12-31.json"),
            ]
        );

        let empty = TempDir::new()?;
        assert!(history(&config(empty.path()))?.is_empty());

        Ok(())
    }
}
