// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{BareShell, RepoFixture, RepoKind};

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use dotvault::{
    backup::{BackupItem, BackupManifest, ItemRecord, SystemHandler},
    config::{BackupSources, Config, VaultSettings},
    path::manifest_dir,
    prompt::ScriptedPrompter,
    RunOutcome, Workflow,
};
use git2::{DiffOptions, Repository};
use pretty_assertions::assert_eq;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

struct Sandbox {
    home: TempDir,
    dotfiles: RepoFixture,
    remote: RepoFixture,
    config: Config,
    now: DateTime<Local>,
}

impl Sandbox {
    fn new() -> Result<Self> {
        let home = TempDir::new()?;
        let dotfiles_dir = home.path().join(".dotfiles");
        let remote_dir = home.path().join("remote.git");

        let remote = RepoFixture::new(&remote_dir, RepoKind::Bare)?;
        let dotfiles = RepoFixture::new(&dotfiles_dir, RepoKind::Normal)?;
        dotfiles.write_and_commit("README.md", "my dotfiles\n")?;
        dotfiles
            .repo
            .remote("origin", &remote_dir.to_string_lossy())?;

        for (path, contents) in [
            (".zshrc", "export EDITOR=nvim\n"),
            (".config/nvim/init.lua", "require('plugins')\n"),
            (".claude/CLAUDE.md", "be terse\n"),
            (".claude/settings.json", "{}\n"),
            (".claude/commands/review.md", "review the diff\n"),
            (".claude/projects/cache.jsonl", "junk\n"),
        ] {
            let path = home.path().join(path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
        }

        let config = Config {
            settings: VaultSettings {
                dotfiles_dir,
                dotfiles_repo: String::new(),
                icloud_backup_dir: home.path().join("icloud"),
                projects_dir: home.path().join("Projects"),
                remote: "origin".into(),
            },
            sources: BackupSources {
                configs: vec![".zshrc".into(), ".config/nvim".into(), ".gitconfig".into()],
                claude_dir: home.path().join(".claude"),
                defaults_domains: vec!["com.apple.dock".into(), "com.apple.finder".into()],
                documents: vec![home.path().join("Documents")],
            },
        };

        let now = Local
            .with_ymd_and_hms(2026, 10, 19, 9, 30, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("ambiguous local time"))?;

        Ok(Self {
            home,
            dotfiles,
            remote,
            config,
            now,
        })
    }

    fn run(&self, shell: &BareShell, prompter: &mut ScriptedPrompter) -> Result<RunOutcome> {
        let handler = SystemHandler::new(
            self.config.clone(),
            self.home.path(),
            self.now.date_naive(),
            shell.clone(),
        );
        let outcome = Workflow::new(
            &self.config,
            self.home.path(),
            self.now,
            &handler,
            prompter,
            shell,
        )
        .run()?;

        Ok(outcome)
    }

    fn manifest_path(&self) -> PathBuf {
        manifest_dir(&self.config.settings.dotfiles_dir).join("2026-10-19.json")
    }
}

fn changed_paths(repo: &Repository, commit: git2::Oid) -> Result<Vec<String>> {
    let commit = repo.find_commit(commit)?;
    let parent = commit.parent(0)?;
    let diff = repo.diff_tree_to_tree(
        Some(&parent.tree()?),
        Some(&commit.tree()?),
        Some(&mut DiffOptions::new()),
    )?;

    let mut paths: Vec<String> = diff
        .deltas()
        .filter_map(|delta| delta.new_file().path().map(|path| path.display().to_string()))
        .collect();
    paths.sort();

    Ok(paths)
}

#[test]
fn backup_configs_and_claude_only() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let mut prompter = ScriptedPrompter::new(["n", "5", "6", ""], [true, true]);

    let outcome = sandbox.run(&BareShell::default(), &mut prompter)?;

    let (manifest, commit, failures) = match outcome {
        RunOutcome::Completed {
            manifest,
            commit,
            failures,
        } => (manifest, commit, failures),
        other => anyhow::bail!("backup did not complete: {other:?}"),
    };
    assert_eq!(manifest, sandbox.manifest_path());
    assert!(failures.is_empty());
    assert_eq!(
        prompter.questions,
        vec![
            "Back up 2 selected item(s)?".to_string(),
            "Commit and push the backup?".to_string(),
        ]
    );

    let record = BackupManifest::load(&manifest)?;
    assert_eq!(record.schema_version, "1.0");
    assert_eq!(record.machine.hostname, "unknown");
    assert_eq!(record.icloud_backup_dir, sandbox.config.settings.icloud_backup_dir);
    assert_eq!(
        record.dotfiles_repo,
        sandbox.home.path().join("remote.git").to_string_lossy()
    );
    for item in BackupItem::ALL {
        let entry = &record.backup_items[&item];
        let picked = matches!(item, BackupItem::Configs | BackupItem::Claude);
        assert_eq!(entry.selected, picked, "{item} selected");
        assert_eq!(entry.succeeded(), picked, "{item} saved");
    }
    assert_eq!(
        record.backup_items[&BackupItem::Configs],
        ItemRecord {
            saved: Some(true),
            selected: true,
            location: Some(sandbox.config.settings.dotfiles_dir.join("config")),
            count: Some(2),
            ..ItemRecord::default()
        }
    );
    assert_eq!(record.backup_items[&BackupItem::Claude].count, Some(3));
    assert_eq!(record.backup_items[&BackupItem::GitRepos].verified, Some(false));

    let commit = commit.ok_or_else(|| anyhow::anyhow!("nothing committed"))?;
    let repo = &sandbox.dotfiles.repo;
    assert_eq!(sandbox.dotfiles.head()?, commit);
    assert_eq!(
        repo.find_commit(commit)?.message(),
        Some("backup: 2026-10-19")
    );
    assert_eq!(
        changed_paths(repo, commit)?,
        vec![
            "backups/2026-10-19.json",
            "claude/CLAUDE.md",
            "claude/commands/review.md",
            "claude/settings.json",
            "config/.config/nvim/init.lua",
            "config/.zshrc",
        ]
    );
    assert_eq!(
        sandbox.remote.repo.refname_to_id("refs/heads/main")?,
        commit
    );

    Ok(())
}

#[test]
fn empty_selection_touches_nothing() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let before = sandbox.dotfiles.head()?;
    let mut prompter = ScriptedPrompter::new(["n", ""], Vec::<bool>::new());

    let outcome = sandbox.run(&BareShell::default(), &mut prompter)?;

    assert_eq!(outcome, RunOutcome::NothingSelected);
    assert!(prompter.questions.is_empty());
    assert!(!sandbox.manifest_path().exists());
    assert!(!sandbox.config.settings.dotfiles_dir.join("config").exists());
    assert_eq!(sandbox.dotfiles.head()?, before);

    Ok(())
}

#[test]
fn failing_handler_does_not_stop_later_ones() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let before = sandbox.dotfiles.head()?;
    let shell = BareShell {
        tools: vec!["defaults", "brew"],
    };
    let mut prompter = ScriptedPrompter::new(["n", "1", "6", "7", ""], [true, false]);

    let outcome = sandbox.run(&shell, &mut prompter)?;

    let (manifest, commit, failures) = match outcome {
        RunOutcome::Completed {
            manifest,
            commit,
            failures,
        } => (manifest, commit, failures),
        other => anyhow::bail!("backup did not complete: {other:?}"),
    };
    assert_eq!(failures, vec![BackupItem::Brewfile, BackupItem::MacosDefaults]);
    assert_eq!(commit, None);
    assert_eq!(sandbox.dotfiles.head()?, before);

    let record = BackupManifest::load(manifest)?;
    assert_eq!(
        record.succeeded().collect::<Vec<_>>(),
        vec![BackupItem::Claude]
    );
    assert_eq!(
        record.backup_items[&BackupItem::MacosDefaults],
        ItemRecord {
            saved: Some(false),
            selected: true,
            reason: Some("no preference domain could be exported".into()),
            ..ItemRecord::default()
        }
    );
    assert!(record.backup_items[&BackupItem::Brewfile].selected);
    assert!(sandbox
        .config
        .settings
        .dotfiles_dir
        .join("claude/CLAUDE.md")
        .is_file());

    Ok(())
}

#[test]
fn missing_tools_are_skipped() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let mut prompter = ScriptedPrompter::new(["n", "3", "4", "8", ""], [true, false]);

    let outcome = sandbox.run(&BareShell::default(), &mut prompter)?;

    let manifest = match outcome {
        RunOutcome::Completed { manifest, .. } => manifest,
        other => anyhow::bail!("backup did not complete: {other:?}"),
    };
    let record = BackupManifest::load(manifest)?;
    for item in [BackupItem::SshKeys, BackupItem::GpgKeys, BackupItem::Documents] {
        let entry = &record.backup_items[&item];
        assert!(entry.selected);
        assert_eq!(entry.saved, Some(false));
        assert!(entry
            .reason
            .as_deref()
            .is_some_and(|reason| reason.contains("not found on PATH")));
    }

    Ok(())
}

#[test]
fn unsynced_project_aborts_without_manifest() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let project = RepoFixture::new(sandbox.config.settings.projects_dir.join("wip"), RepoKind::Normal)?;
    project.write_and_commit("main.rs", "fn main() {}\n")?;
    fs::write(sandbox.config.settings.projects_dir.join("wip/notes.txt"), "todo\n")?;
    let mut prompter = ScriptedPrompter::new(["n", "2", "5", ""], [true, true]);

    let outcome = sandbox.run(&BareShell::default(), &mut prompter)?;

    assert_eq!(outcome, RunOutcome::Aborted);
    assert_eq!(prompter.questions.len(), 2);
    assert!(prompter.questions[1].ends_with("Abort the backup?"));
    assert!(!sandbox.manifest_path().exists());
    assert!(!sandbox.config.settings.dotfiles_dir.join("config").exists());

    Ok(())
}

#[test]
fn push_failure_keeps_local_commit() -> Result<()> {
    let mut sandbox = Sandbox::new()?;
    sandbox.config.settings.remote = "nowhere".into();
    let mut prompter = ScriptedPrompter::new(["n", "5", ""], [true, true]);

    let outcome = sandbox.run(&BareShell::default(), &mut prompter)?;

    let (manifest, commit) = match outcome {
        RunOutcome::Completed {
            manifest, commit, ..
        } => (manifest, commit),
        other => anyhow::bail!("backup did not complete: {other:?}"),
    };
    assert!(manifest.is_file());
    let commit = commit.ok_or_else(|| anyhow::anyhow!("nothing committed"))?;
    assert_eq!(sandbox.dotfiles.head()?, commit);
    assert!(sandbox.remote.repo.refname_to_id("refs/heads/main").is_err());

    Ok(())
}

#[test]
fn commit_failure_leaves_changes_staged() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let before = sandbox.dotfiles.head()?;
    sandbox
        .dotfiles
        .repo
        .config()?
        .set_str("user.name", "John <Doe>")?;
    let mut prompter = ScriptedPrompter::new(["n", "5", ""], [true, true]);

    let outcome = sandbox.run(&BareShell::default(), &mut prompter)?;

    let (manifest, commit) = match outcome {
        RunOutcome::Completed {
            manifest, commit, ..
        } => (manifest, commit),
        other => anyhow::bail!("backup did not complete: {other:?}"),
    };
    assert_eq!(commit, None);
    assert!(manifest.is_file());
    assert_eq!(sandbox.dotfiles.head()?, before);
    let index = Repository::open(&sandbox.config.settings.dotfiles_dir)?.index()?;
    assert!(index.get_path(Path::new("backups/2026-10-19.json"), 0).is_some());
    assert!(sandbox.remote.repo.refname_to_id("refs/heads/main").is_err());

    Ok(())
}
