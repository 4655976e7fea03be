// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the configuration file that dotvault uses to
//! simplify the process of serialization and deserialization. File I/O is left
//! to the caller to figure out.
//!
//! # General Layout
//!
//! The configuration file is composed of two basic parts: settings and
//! sources. The settings section defines where backups go, i.e., the dotfiles
//! repository and the cloud-synced backup directory. The sources section
//! defines what gets backed up by the handlers that copy or sync personal data.
//!
//! Every field of the configuration file is optional. Missing fields fall back
//! to the defaults provided by [`Config::default`].

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Component, Path, PathBuf},
    str::FromStr,
};

/// Configuration layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Where backups are written to.
    pub settings: VaultSettings,

    /// What gets backed up.
    pub sources: BackupSources,
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every absolute path field.
        let settings = &mut config.settings;
        settings.dotfiles_dir = expand_path(&settings.dotfiles_dir)?;
        settings.icloud_backup_dir = expand_path(&settings.icloud_backup_dir)?;
        settings.projects_dir = expand_path(&settings.projects_dir)?;

        let sources = &mut config.sources;

        // INVARIANT: Config paths stay inside the home directory.
        if let Some(path) = sources.configs.iter().find(|path| !is_home_relative(path)) {
            return Err(ConfigError::ConfigOutsideHome(path.clone()));
        }

        sources.claude_dir = expand_path(&sources.claude_dir)?;
        sources.documents = sources
            .documents
            .iter()
            .map(expand_path)
            .collect::<Result<Vec<_>>>()?;

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Backup destination settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Local clone of the dotfiles repository.
    pub dotfiles_dir: PathBuf,

    /// Remote URL of the dotfiles repository recorded in each manifest.
    ///
    /// Left empty to use the URL of the configured remote.
    pub dotfiles_repo: String,

    /// Cloud-synced directory that receives archives and synced folders.
    pub icloud_backup_dir: PathBuf,

    /// Directory whose git repositories are verified before a reset.
    pub projects_dir: PathBuf,

    /// Remote of the dotfiles repository to push to.
    pub remote: String,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            dotfiles_dir: "~/.dotfiles".into(),
            dotfiles_repo: String::new(),
            icloud_backup_dir: "~/Library/Mobile Documents/com~apple~CloudDocs/Backups/dotvault"
                .into(),
            projects_dir: "~/Projects".into(),
            remote: "origin".into(),
        }
    }
}

/// Sources of personal data to back up.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupSources {
    /// Configuration files and directories relative to the home directory.
    pub configs: Vec<PathBuf>,

    /// Claude assistant configuration directory.
    pub claude_dir: PathBuf,

    /// Preference domains exported through `defaults export`.
    pub defaults_domains: Vec<String>,

    /// Personal folders synced to the cloud backup directory.
    pub documents: Vec<PathBuf>,
}

impl Default for BackupSources {
    fn default() -> Self {
        Self {
            configs: [
                ".zshrc",
                ".zprofile",
                ".gitconfig",
                ".config/nvim",
                ".config/ghostty",
                ".config/starship.toml",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
            claude_dir: "~/.claude".into(),
            defaults_domains: [
                "NSGlobalDomain",
                "com.apple.dock",
                "com.apple.finder",
                "com.apple.screencapture",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            documents: vec!["~/Documents".into(), "~/Desktop".into()],
        }
    }
}

fn is_home_relative(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn expand_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.as_ref().to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Config source is absolute, or escapes the home directory.
    #[error("config source {0:?} must be relative to the home directory")]
    ConfigOutsideHome(PathBuf),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
