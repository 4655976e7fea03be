// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Execution dispatcher.
//!
//! Runs the handler of every selected backup item exactly once, in menu
//! order, synchronously. Handler failures are best-effort: they are logged,
//! recorded, and the next handler runs anyway. The one exception is
//! uncommitted or unpushed work found in project repositories, which gives the
//! operator the chance to abort the entire run before anything else happens.

use crate::{
    backup::{
        handler::{BackupHandler, HandlerError},
        item::BackupItem,
        menu::Selection,
    },
    prompt::{PromptError, Prompter},
    repo::RepoStatus,
};

use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Typed result of one backup item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Operator did not select the item.
    NotSelected,

    /// Data was written to its backup location.
    Saved {
        location: Option<PathBuf>,
        count: Option<usize>,
    },

    /// State was checked and found to be safe.
    Verified { count: usize },

    /// Handler could not run, e.g., a tool or source is missing.
    Skipped { reason: String },

    /// Handler ran, but failed.
    Failed { reason: String },
}

impl ItemOutcome {
    /// Did the handler actually save or verify anything?
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Saved { .. } | Self::Verified { .. })
    }
}

/// Outcome of every backup item after dispatch, in menu order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<(BackupItem, ItemOutcome)>,
}

impl DispatchReport {
    /// Outcome of target item.
    pub fn outcome(&self, item: BackupItem) -> Option<&ItemOutcome> {
        self.outcomes
            .iter()
            .find(|(entry, _)| *entry == item)
            .map(|(_, outcome)| outcome)
    }

    /// Items whose handler failed.
    pub fn failures(&self) -> impl Iterator<Item = BackupItem> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ItemOutcome::Failed { .. }))
            .map(|(item, _)| *item)
    }
}

/// Run handler of every selected item.
///
/// # Errors
///
/// - Return [`DispatchError::Aborted`] if the operator aborts after project
///   repositories were found with unsynced work.
/// - Return [`DispatchError::Prompt`] if the operator cannot be prompted.
#[instrument(skip_all, level = "debug")]
pub fn dispatch(
    selection: &Selection,
    handler: &impl BackupHandler,
    prompter: &mut impl Prompter,
) -> Result<DispatchReport> {
    let total = selection.count();
    let mut outcomes = Vec::with_capacity(BackupItem::ALL.len());
    let mut position = 0;

    for (item, selected) in selection.iter() {
        if !selected {
            outcomes.push((item, ItemOutcome::NotSelected));
            continue;
        }

        position += 1;
        info!("[{position}/{total}] {}", item.label());
        let outcome = match handler.run(item) {
            Ok(outcome) => outcome,
            Err(HandlerError::UnsyncedRepos(repos)) => unsynced_repos(repos, prompter)?,
            Err(error) => {
                warn!("{item} failed: {error}");
                ItemOutcome::Failed {
                    reason: error.to_string(),
                }
            }
        };

        if let ItemOutcome::Skipped { reason } = &outcome {
            warn!("{item} skipped: {reason}");
        }

        outcomes.push((item, outcome));
    }

    Ok(DispatchReport { outcomes })
}

fn unsynced_repos(repos: Vec<RepoStatus>, prompter: &mut impl Prompter) -> Result<ItemOutcome> {
    for repo in &repos {
        warn!("{repo}");
    }

    let reason = format!("{} repositories have uncommitted or unpushed work", repos.len());
    let abort = match prompter.confirm(&format!("{reason}. Abort the backup?"), false) {
        Ok(abort) => abort,
        Err(PromptError::Canceled) => true,
        Err(error) => return Err(error.into()),
    };

    if abort {
        return Err(DispatchError::Aborted { repos });
    }

    warn!("continuing with unsynced repositories");
    Ok(ItemOutcome::Failed { reason })
}

/// Execution dispatch error types.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Operator aborted because of unsynced project repositories.
    #[error("backup aborted with {} unsynced repositories", repos.len())]
    Aborted { repos: Vec<RepoStatus> },

    /// Operator could not be prompted.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Friendly result alias :3
pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
