// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotvault::{
    backup::{BackupManifest, SystemHandler},
    config::Config,
    path::{default_config_path, home_dir},
    prompt::InquirePrompter,
    syscall::SystemShell,
    workflow::{history, open_dotfiles, scan},
    RunOutcome, Workflow,
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::{fs, io::ErrorKind, path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  dotvault [options] [<dotvault-command>]",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config = load_config(self.config)?;
        match self.command.unwrap_or(Command::Backup) {
            Command::Backup => run_backup(config),
            Command::Scan => run_scan(config),
            Command::History => run_history(config),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Inventory, select, back up, and record (default).
    #[command(override_usage = "dotvault backup [options]")]
    Backup,

    /// Only show what could be backed up.
    #[command(override_usage = "dotvault scan [options]")]
    Scan,

    /// List manifests of previous backups, newest first.
    #[command(override_usage = "dotvault history [options]")]
    History,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = Cli::parse().run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("no configuration at {}, using defaults", path.display());
            Config::default().to_string()
        }
        Err(err) => {
            return Err(err).with_context(|| format!("cannot read {}", path.display()));
        }
    };

    data.parse()
        .with_context(|| format!("invalid configuration {}", path.display()))
}

fn run_backup(config: Config) -> Result<()> {
    let home = home_dir()?;
    let now = Local::now();
    let shell = SystemShell::new().with_spinner();
    let handler = SystemHandler::new(config.clone(), &home, now.date_naive(), shell.clone());
    let mut prompter = InquirePrompter::new();

    let outcome = Workflow::new(&config, &home, now, &handler, &mut prompter, &shell).run()?;
    match outcome {
        RunOutcome::NothingSelected | RunOutcome::Cancelled | RunOutcome::Aborted => {}
        RunOutcome::Completed {
            manifest,
            commit,
            failures,
        } => {
            match commit {
                Some(oid) => info!("backup recorded in {} ({oid})", manifest.display()),
                None => info!("backup recorded in {}", manifest.display()),
            }

            if !failures.is_empty() {
                warn!("{} item(s) need another look", failures.len());
            }
        }
    }

    Ok(())
}

fn run_scan(config: Config) -> Result<()> {
    let home = home_dir()?;
    let report = scan(&config, &home, &SystemShell::new());
    println!("{report}");

    Ok(())
}

fn run_history(config: Config) -> Result<()> {
    open_dotfiles(&config)?;
    let manifests = history(&config)?;
    if manifests.is_empty() {
        info!("no backups recorded yet");
        return Ok(());
    }

    for path in manifests {
        let name = path.file_stem().unwrap_or_default().to_string_lossy();
        match BackupManifest::load(&path) {
            Ok(manifest) => {
                let saved: Vec<_> = manifest.succeeded().map(|item| item.key()).collect();
                println!("{name}  {}  {}", manifest.machine.hostname, saved.join(", "));
            }
            Err(error) => warn!("{name}: {error}"),
        }
    }

    Ok(())
}
