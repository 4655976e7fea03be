// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup items.
//!
//! A __backup item__ is a named, operator-toggleable unit of work. The set of
//! backup items is closed. Nothing ever adds or removes items at runtime, the
//! selection menu only toggles them on or off.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// A unit of backup work.
///
/// Variant order is display order and execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupItem {
    Brewfile,
    GitRepos,
    SshKeys,
    GpgKeys,
    Configs,
    Claude,
    MacosDefaults,
    Documents,
}

impl BackupItem {
    /// Every backup item in display and execution order.
    pub const ALL: [BackupItem; 8] = [
        BackupItem::Brewfile,
        BackupItem::GitRepos,
        BackupItem::SshKeys,
        BackupItem::GpgKeys,
        BackupItem::Configs,
        BackupItem::Claude,
        BackupItem::MacosDefaults,
        BackupItem::Documents,
    ];

    /// Stable identifier used as manifest key.
    pub fn key(self) -> &'static str {
        match self {
            Self::Brewfile => "brewfile",
            Self::GitRepos => "git_repos",
            Self::SshKeys => "ssh_keys",
            Self::GpgKeys => "gpg_keys",
            Self::Configs => "configs",
            Self::Claude => "claude",
            Self::MacosDefaults => "macos_defaults",
            Self::Documents => "documents",
        }
    }

    /// Human-readable description shown in the selection menu.
    pub fn label(self) -> &'static str {
        match self {
            Self::Brewfile => "Homebrew package list (Brewfile dump)",
            Self::GitRepos => "Verify git repositories are committed and pushed",
            Self::SshKeys => "SSH keys (password-protected zip to iCloud)",
            Self::GpgKeys => "GPG secret keys (password-protected zip to iCloud)",
            Self::Configs => "Shell, git and editor configs into the dotfiles repo",
            Self::Claude => "Claude assistant configuration into the dotfiles repo",
            Self::MacosDefaults => "macOS preference domains exported as plists",
            Self::Documents => "Incremental rsync of personal folders to iCloud",
        }
    }

    /// One-based position in the menu.
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|item| *item == self)
            .map(|pos| pos + 1)
            .unwrap_or_default()
    }

    /// Look up item by one-based menu position.
    pub fn from_index(index: usize) -> Option<Self> {
        index
            .checked_sub(1)
            .and_then(|pos| Self::ALL.get(pos))
            .copied()
    }

    /// Backup item named by target key.
    pub fn from_key(key: &str) -> Option<Self> {
        key.parse().ok()
    }

    /// Does this item only verify state instead of saving anything?
    pub fn is_verification(self) -> bool {
        matches!(self, Self::GitRepos)
    }
}

impl Display for BackupItem {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.key())
    }
}

impl FromStr for BackupItem {
    type Err = UnknownItem;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|item| item.key() == key)
            .ok_or_else(|| UnknownItem(key.to_string()))
    }
}

/// Key does not name any backup item.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown backup item {0:?}")]
pub struct UnknownItem(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case(BackupItem::Brewfile, "Homebrew package list (Brewfile dump)"; "brewfile")]
    #[test_case(BackupItem::SshKeys, "SSH keys (password-protected zip to iCloud)"; "ssh keys")]
    #[test_case(BackupItem::Claude, "Claude assistant configuration into the dotfiles repo"; "claude")]
    #[test_case(BackupItem::Documents, "Incremental rsync of personal folders to iCloud"; "documents")]
    #[test]
    fn label_describes_item(item: BackupItem, expect: &str) {
        use pretty_assertions::assert_eq;

        assert_eq!(item.label(), expect);
    }

    #[test]
    fn all_items_have_unique_keys_in_order() {
        let keys = BackupItem::ALL.map(BackupItem::key);
        assert_eq!(
            keys,
            [
                "brewfile",
                "git_repos",
                "ssh_keys",
                "gpg_keys",
                "configs",
                "claude",
                "macos_defaults",
                "documents",
            ]
        );
    }

    #[test]
    fn index_and_from_index_agree() {
        for (pos, item) in BackupItem::ALL.into_iter().enumerate() {
            assert_eq!(item.index(), pos + 1);
            assert_eq!(BackupItem::from_index(pos + 1), Some(item));
        }
    }

    #[test_case(0; "zero")]
    #[test_case(9; "one past the end")]
    #[test_case(usize::MAX; "huge")]
    #[test]
    fn from_index_rejects_out_of_range(index: usize) {
        use pretty_assertions::assert_eq;

        assert_eq!(BackupItem::from_index(index), None);
    }

    #[test]
    fn key_parses_back_into_item() {
        assert_eq!("macos_defaults".parse(), Ok(BackupItem::MacosDefaults));
        assert_eq!(
            "dropbox".parse::<BackupItem>(),
            Err(UnknownItem("dropbox".into()))
        );
        assert_eq!(BackupItem::from_key("ssh_keys"), Some(BackupItem::SshKeys));
        assert_eq!(BackupItem::from_key("SSH_KEYS"), None);
    }

    #[test]
    fn serde_uses_item_keys() -> anyhow::Result<()> {
        for item in BackupItem::ALL {
            assert_eq!(serde_json::to_string(&item)?, format!("\"{}\"", item.key()));
        }

        Ok(())
    }
}
