// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

mod integration;

use anyhow::Result;
use dotvault::syscall::{Shell, Syscall, SyscallError};
use git2::{Oid, Repository, RepositoryInitOptions};
use std::{fs, path::Path};

pub(crate) struct RepoFixture {
    pub(crate) repo: Repository,
}

impl RepoFixture {
    pub(crate) fn new(path: impl AsRef<Path>, kind: RepoKind) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.bare(kind.is_bare());
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self { repo })
    }

    /// Write file into work tree, then commit it.
    pub(crate) fn write_and_commit(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<Oid> {
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| anyhow::anyhow!("bare repository has no work tree"))?;
        let path = workdir.join(filename.as_ref());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents.as_ref())?;

        // INVARIANT: Always use new tree produced by index after staging new entry.
        let mut index = self.repo.index()?;
        index.add_path(filename.as_ref())?;
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        // INVARIANT: Always determine latest parent commits to append to.
        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Ok(head) = self.repo.head() {
            parents.push(head.peel_to_commit()?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        // INVARIANT: Commit to HEAD by appending to obtained parent commits.
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            format!("chore: add {:?}", filename.as_ref()).as_ref(),
            &tree,
            &parents,
        )?;

        Ok(oid)
    }

    pub(crate) fn head(&self) -> Result<Oid> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) enum RepoKind {
    #[default]
    Normal,

    Bare,
}

impl RepoKind {
    pub(crate) fn is_bare(&self) -> bool {
        match self {
            Self::Bare => true,
            Self::Normal => false,
        }
    }
}

/// Shell of a machine with only the named tools installed, every one of which
/// fails when run.
#[derive(Debug, Default, Clone)]
pub(crate) struct BareShell {
    pub(crate) tools: Vec<&'static str>,
}

impl Shell for BareShell {
    fn is_available(&self, program: &str) -> bool {
        self.tools.contains(&program)
    }

    fn output(&self, syscall: &Syscall) -> dotvault::syscall::Result<String> {
        Err(SyscallError::Failed {
            command: syscall.to_string(),
            message: format!("{} is broken", syscall.program()),
        })
    }

    fn interactive(&self, syscall: &Syscall) -> dotvault::syscall::Result<()> {
        self.output(syscall).map(|_| ())
    }
}
