// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Interactive backup of a macOS workstation.
//!
//! Inventories what could be backed up, lets the operator pick what should be
//! backed up, runs one handler per picked item, and records the result as a
//! JSON manifest committed into the operator's dotfiles repository.

pub mod backup;
pub mod config;
pub mod path;
pub mod prompt;
pub mod repo;
pub mod syscall;
pub mod workflow;

pub use workflow::{RunOutcome, Workflow, WorkflowError};
