// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup manifest.
//!
//! JSON record of a single backup run. Lists what the operator selected, what
//! actually happened to each backup item, and which machine it happened on.
//! Manifests are written once per run into the `backups/` directory of the
//! dotfiles repository, named after the local calendar date, and are never
//! touched again except by a rerun on the same day.

use crate::{
    backup::{
        dispatch::{DispatchReport, ItemOutcome},
        item::BackupItem,
    },
    path::manifest_dir,
    syscall::{Shell, Syscall},
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Version of manifest layout.
pub const SCHEMA_VERSION: &str = "1.0";

const UNKNOWN: &str = "unknown";

/// Record of one backup run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackupManifest {
    pub schema_version: String,
    pub created_at: DateTime<Utc>,
    pub machine: MachineInfo,
    pub backup_items: BTreeMap<BackupItem, ItemRecord>,
    pub icloud_backup_dir: PathBuf,
    pub dotfiles_repo: String,
}

impl BackupManifest {
    /// Build manifest from outcome of dispatch.
    ///
    /// Every backup item gets a record, even those the dispatch report does
    /// not mention. Missing items are treated as not selected.
    pub fn new(
        report: &DispatchReport,
        machine: MachineInfo,
        created_at: DateTime<Utc>,
        icloud_backup_dir: impl Into<PathBuf>,
        dotfiles_repo: impl Into<String>,
    ) -> Self {
        let backup_items = BackupItem::ALL
            .into_iter()
            .map(|item| {
                let outcome = report.outcome(item).unwrap_or(&ItemOutcome::NotSelected);
                (item, ItemRecord::new(item, outcome))
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION.into(),
            created_at,
            machine,
            backup_items,
            icloud_backup_dir: icloud_backup_dir.into(),
            dotfiles_repo: dotfiles_repo.into(),
        }
    }

    /// Path manifest of target date is written to.
    pub fn path(dotfiles_dir: impl Into<PathBuf>, date: NaiveDate) -> PathBuf {
        manifest_dir(dotfiles_dir).join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// Write manifest as pretty JSON into dotfiles repository.
    ///
    /// Overwrites any manifest already written on target date.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::Io`] if manifest cannot be written.
    #[instrument(skip(self, dotfiles_dir), level = "debug")]
    pub fn write(&self, dotfiles_dir: impl Into<PathBuf>, date: NaiveDate) -> Result<PathBuf> {
        let path = Self::path(dotfiles_dir, date);
        let mut json = self.to_string();
        json.push('\n');

        if let Some(parent) = path.parent() {
            mkdirp::mkdirp(parent).map_err(|err| ManifestError::Io {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        fs::write(&path, json).map_err(|err| ManifestError::Io {
            source: err,
            path: path.clone(),
        })?;
        debug!("wrote manifest {}", path.display());

        Ok(path)
    }

    /// Read manifest back from file.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::Io`] if file cannot be read.
    /// - Return [`ManifestError::Deserialize`] if file is not a manifest.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|err| ManifestError::Io {
            source: err,
            path: path.to_path_buf(),
        })?;

        json.parse()
    }

    /// Items whose data was actually saved or verified.
    pub fn succeeded(&self) -> impl Iterator<Item = BackupItem> + '_ {
        self.backup_items
            .iter()
            .filter(|(_, record)| record.succeeded())
            .map(|(item, _)| *item)
    }
}

impl std::fmt::Display for BackupManifest {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?;
        fmt.write_str(&json)
    }
}

impl FromStr for BackupManifest {
    type Err = ManifestError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data).map_err(ManifestError::Deserialize)
    }
}

/// Per-item record of backup manifest.
///
/// Verification items like `git_repos` carry `verified`, every other item
/// carries `saved`. Both reflect what actually happened, while `selected`
/// records what the operator asked for.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ItemRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,

    pub selected: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ItemRecord {
    /// Record target outcome of target item.
    pub fn new(item: BackupItem, outcome: &ItemOutcome) -> Self {
        let mut record = Self {
            selected: !matches!(outcome, ItemOutcome::NotSelected),
            ..Self::default()
        };

        match outcome {
            ItemOutcome::NotSelected => {}
            ItemOutcome::Saved { location, count } => {
                record.location = location.clone();
                record.count = *count;
            }
            ItemOutcome::Verified { count } => record.count = Some(*count),
            ItemOutcome::Skipped { reason } | ItemOutcome::Failed { reason } => {
                record.reason = Some(reason.clone())
            }
        }

        if item.is_verification() {
            record.verified = Some(outcome.succeeded());
        } else {
            record.saved = Some(outcome.succeeded());
        }

        record
    }

    /// Was data saved or verified?
    pub fn succeeded(&self) -> bool {
        self.saved.or(self.verified).unwrap_or(false)
    }
}

/// Identity of machine backup was taken on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MachineInfo {
    pub hostname: String,
    pub macos_version: String,
    pub chip: String,
}

impl MachineInfo {
    /// Ask the operating system who we are.
    ///
    /// Every field that cannot be determined becomes `"unknown"`.
    pub fn probe(shell: &impl Shell) -> Self {
        let hostname = query(shell, Syscall::new("scutil").args(["--get", "ComputerName"]))
            .or_else(|| query(shell, Syscall::new("hostname")))
            .unwrap_or_else(|| UNKNOWN.into());
        let macos_version = query(shell, Syscall::new("sw_vers").arg("-productVersion"))
            .unwrap_or_else(|| UNKNOWN.into());
        let chip = query(
            shell,
            Syscall::new("sysctl").args(["-n", "machdep.cpu.brand_string"]),
        )
        .unwrap_or_else(|| UNKNOWN.into());

        Self {
            hostname,
            macos_version,
            chip,
        }
    }
}

fn query(shell: &impl Shell, syscall: Syscall) -> Option<String> {
    if !shell.is_available(syscall.program()) {
        return None;
    }

    match shell.output(&syscall) {
        Ok(output) => Some(output.trim().to_string()).filter(|value| !value.is_empty()),
        Err(error) => {
            debug!("{error}");
            None
        }
    }
}

/// Manifest error types.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Manifest file could not be parsed.
    #[error(transparent)]
    Deserialize(#[from] serde_json::Error),

    /// Manifest file could not be read or written.
    #[error("failed to access manifest {}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ManifestError> = std::result::Result<T, E>;
