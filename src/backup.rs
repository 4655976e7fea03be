// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup pipeline.
//!
//! A backup run moves through four phases, strictly in order, exactly once:
//!
//! 1. __Inventory__: probe the system and report what could be backed up.
//! 2. __Selection__: let the operator pick backup items from a checklist.
//! 3. __Execution__: run the handler of every selected backup item.
//! 4. __Manifest__: record what happened, then commit it into the dotfiles
//!    repository.
//!
//! There is no branching back into an earlier phase.

pub mod dispatch;
pub mod files;
pub mod handler;
pub mod inventory;
pub mod item;
pub mod manifest;
pub mod menu;

pub use dispatch::{dispatch, DispatchError, DispatchReport, ItemOutcome};
pub use handler::{BackupHandler, HandlerError, SystemHandler};
pub use inventory::{InventoryReport, InventoryScanner, Probe};
pub use item::BackupItem;
pub use manifest::{BackupManifest, ItemRecord, MachineInfo, ManifestError};
pub use menu::{render, run_menu, Menu, MenuCommand, MenuPhase, Selection};
