// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git repository handling through libgit2.
//!
//! Two kinds of repositories matter to a backup run. The __dotfiles
//! repository__ receives copied configuration and the backup manifest, and is
//! committed and pushed at the end of the run. __Project repositories__ are
//! only ever inspected, so the operator can be warned about work that would be
//! lost by a factory reset.

use crate::prompt::PromptError;

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    Branch, Config, ErrorCode, IndexAddOption, Oid, PushOptions, RemoteCallbacks, Repository,
    Status, StatusOptions,
};
use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument};

/// Synchronization state of a project repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStatus {
    pub path: PathBuf,

    /// Number of modified, staged, or untracked paths.
    pub uncommitted: usize,

    /// Number of local commits missing from upstream.
    pub ahead: usize,

    /// Current branch tracks an upstream branch.
    pub has_upstream: bool,

    /// Repository has at least one commit.
    pub has_commits: bool,

    /// HEAD does not point at a branch.
    pub detached: bool,
}

impl RepoStatus {
    /// Nothing in this repository would be lost if the machine were wiped.
    pub fn is_synced(&self) -> bool {
        let pushed = !self.has_commits || self.detached || (self.has_upstream && self.ahead == 0);
        self.uncommitted == 0 && pushed
    }
}

impl Display for RepoStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}:", self.path.display())?;
        if self.uncommitted > 0 {
            write!(fmt, " {} uncommitted", self.uncommitted)?;
        }

        if self.has_commits && !self.detached {
            if !self.has_upstream {
                write!(fmt, " no upstream")?;
            } else if self.ahead > 0 {
                write!(fmt, " {} unpushed", self.ahead)?;
            }
        }

        if self.is_synced() {
            write!(fmt, " synced")?;
        }

        Ok(())
    }
}

/// Inspect synchronization state of repository at target path.
///
/// # Errors
///
/// - Return [`RepoError::Git2`] if repository cannot be opened or read.
#[instrument(skip(path), level = "debug")]
pub fn inspect(path: impl AsRef<Path>) -> Result<RepoStatus> {
    let repo = Repository::open(path.as_ref())?;

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(false)
        .include_ignored(false);
    let uncommitted = repo
        .statuses(Some(&mut opts))?
        .iter()
        .filter(|entry| entry.status() != Status::CURRENT)
        .count();

    let mut status = RepoStatus {
        path: path.as_ref().to_path_buf(),
        uncommitted,
        ahead: 0,
        has_upstream: false,
        has_commits: false,
        detached: false,
    };

    let head = match repo.head() {
        Ok(head) => head,
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(status);
        }
        Err(err) => return Err(err.into()),
    };

    status.has_commits = true;
    let Some(local) = head.target() else {
        return Ok(status);
    };

    if !head.is_branch() {
        status.detached = true;
        return Ok(status);
    }

    if let Ok(upstream) = Branch::wrap(head).upstream() {
        if let Some(remote) = upstream.get().target() {
            status.has_upstream = true;
            status.ahead = repo.graph_ahead_behind(local, remote)?.0;
        }
    }

    debug!("{status}");
    Ok(status)
}

/// Find git repositories at most two directory levels below target root.
///
/// Repositories nested inside other found repositories are not reported.
pub fn discover(root: impl AsRef<Path>) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = Vec::new();
    let walker = WalkBuilder::new(root.as_ref())
        .max_depth(Some(2))
        .sort_by_file_path(|a, b| a.cmp(b))
        .build();

    for entry in walker.flatten() {
        if entry.depth() == 0 || !entry.file_type().is_some_and(|kind| kind.is_dir()) {
            continue;
        }

        let path = entry.into_path();
        if !path.join(".git").exists() {
            continue;
        }

        // INVARIANT: Sorted walk visits parents before children.
        if found.iter().any(|repo| path.starts_with(repo)) {
            continue;
        }

        found.push(path);
    }

    found
}

/// Local clone of the dotfiles repository.
pub struct DotfilesRepo {
    repo: Repository,
}

impl DotfilesRepo {
    /// Open dotfiles repository at target path.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Git2`] if path is not a git repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            repo: Repository::open(path.as_ref())?,
        })
    }

    /// Working tree of the repository.
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// URL of target remote, if configured.
    pub fn remote_url(&self, remote: &str) -> Option<String> {
        self.repo
            .find_remote(remote)
            .ok()
            .and_then(|remote| remote.url().map(ToString::to_string))
    }

    /// Stage every change in the working tree, deletions included.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Git2`] if the index cannot be updated.
    #[instrument(skip(self), level = "debug")]
    pub fn stage_all(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;

        Ok(())
    }

    /// Commit current index.
    ///
    /// Returns `None` without committing if the index matches HEAD.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Git2`] if the commit cannot be written, e.g., no
    ///   committer identity is configured.
    #[instrument(skip(self), level = "debug")]
    pub fn commit(&self, message: &str) -> Result<Option<Oid>> {
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;

        // INVARIANT: Always determine latest parent commits to append to.
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                None
            }
            Err(err) => return Err(err.into()),
        };

        if parent.as_ref().map(|commit| commit.tree_id()) == Some(tree_oid) {
            info!("nothing to commit");
            return Ok(None);
        }

        let tree = self.repo.find_tree(tree_oid)?;
        let signature = self.repo.signature()?;
        let parents = parent.iter().collect::<Vec<_>>();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        info!("committed {oid}: {message}");

        Ok(Some(oid))
    }

    /// Push current branch to target remote.
    ///
    /// Push progress is displayed through target progress bar. If credentials
    /// are required, then the operator is prompted for them, suspending the
    /// progress bar.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::DetachedHead`] if HEAD is not on a branch.
    /// - Return [`RepoError::Git2`] if the push fails or is rejected.
    /// - Return [`RepoError::IndicatifStyleTemplate`] if bar style is invalid.
    #[instrument(skip(self, bar), level = "debug")]
    pub fn push(&self, remote: &str, bar: ProgressBar) -> Result<()> {
        let head = self.repo.head()?;
        let branch = head
            .shorthand()
            .filter(|_| head.is_branch())
            .ok_or(RepoError::DetachedHead)?
            .to_string();
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");

        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(format!("push {branch} to {remote}"));
        bar.enable_steady_tick(time::Duration::from_millis(100));

        let authenticator =
            GitAuthenticator::default().set_prompter(CredentialPrompt::new(remote, bar.clone()));
        let config = Config::open_default()?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.push_transfer_progress(|current, total, _bytes| {
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                bar.set_length(total as u64);
                bar.set_position(current as u64);
            }
        });
        rc.push_update_reference(|refname, status| match status {
            Some(message) => Err(git2::Error::from_str(&format!(
                "remote rejected {refname}: {message}"
            ))),
            None => Ok(()),
        });

        let mut po = PushOptions::new();
        po.remote_callbacks(rc);
        let result = self
            .repo
            .find_remote(remote)
            .and_then(|mut target| target.push(&[refspec.as_str()], Some(&mut po)));
        bar.finish_and_clear();
        result?;

        info!("pushed {branch} to {remote}");
        Ok(())
    }
}

/// Ask the operator for push credentials while the push bar is hidden.
#[derive(Debug, Clone)]
struct CredentialPrompt {
    remote: String,
    bar: ProgressBar,
}

impl CredentialPrompt {
    fn new(remote: impl Into<String>, bar: ProgressBar) -> Self {
        Self {
            remote: remote.into(),
            bar,
        }
    }

    /// Read one answer. Canceling the prompt gives up on authentication.
    fn ask(&self, label: &str, hidden: bool) -> Option<String> {
        let answer = self.bar.suspend(|| {
            if hidden {
                Password::new(label).without_confirmation().prompt()
            } else {
                Text::new(label).prompt()
            }
        });

        answer
            .map_err(PromptError::from)
            .inspect_err(|error| debug!("no {label} for {}: {error}", self.remote))
            .ok()
    }
}

impl Prompter for CredentialPrompt {
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("{} at {url} wants a username and password", self.remote);
        let username = self.ask("username", false)?;
        let password = self.ask("password", true)?;

        Some((username, password))
    }

    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("{} at {url} wants the password of {username}", self.remote);
        self.ask("password", true)
    }

    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("{} wants the passphrase of {}", self.remote, ssh_key_path.display());
        self.ask("passphrase", true)
    }
}

/// Git repository error types.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// HEAD is detached, so there is no branch to push.
    #[error("cannot push from detached HEAD")]
    DetachedHead,

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = RepoError> = std::result::Result<T, E>;
