// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Selection menu.
//!
//! Terminal checklist over the fixed set of [`BackupItem`]s. The menu is split
//! into three layers:
//!
//! 1. [`Menu::transition`], a pure `(state, input) -> state` function.
//! 2. [`render`], a pure function that draws the current state.
//! 3. [`run_menu`], a thin loop that feeds operator input from a [`Prompter`]
//!    into the transition function until a terminal phase is reached.
//!
//! # State Machine
//!
//! ```text
//! Displaying --(toggle | all | none | invalid)--> Displaying
//! Displaying --(submit, nothing selected)-------> Empty
//! Displaying --(submit)-------------------------> Confirming
//! Confirming --(no)-----------------------------> Cancelled
//! Confirming --(anything else)------------------> Proceed
//! ```

use crate::{
    backup::item::BackupItem,
    prompt::{PromptError, Prompter},
};

use std::fmt::Write;
use tracing::{debug, instrument};

/// Selection state of every backup item.
///
/// # Invariant
///
/// - Always holds every item of [`BackupItem::ALL`] in its original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    entries: [(BackupItem, bool); 8],
}

impl Selection {
    /// Construct selection with every item selected.
    pub fn all() -> Self {
        Self {
            entries: BackupItem::ALL.map(|item| (item, true)),
        }
    }

    /// Construct selection with no item selected.
    pub fn none() -> Self {
        Self {
            entries: BackupItem::ALL.map(|item| (item, false)),
        }
    }

    /// Construct selection where only the given items are selected.
    pub fn only(items: impl IntoIterator<Item = BackupItem>) -> Self {
        let mut selection = Self::none();
        for item in items {
            selection.set(item, true);
        }

        selection
    }

    /// Toggle item at one-based menu position.
    ///
    /// Returns false without touching anything if the position is out of
    /// range.
    pub fn toggle(&mut self, index: usize) -> bool {
        match index.checked_sub(1).and_then(|pos| self.entries.get_mut(pos)) {
            Some((_, selected)) => {
                *selected = !*selected;
                true
            }
            None => false,
        }
    }

    pub fn select_all(&mut self) {
        self.entries.iter_mut().for_each(|(_, selected)| *selected = true);
    }

    pub fn select_none(&mut self) {
        self.entries.iter_mut().for_each(|(_, selected)| *selected = false);
    }

    pub fn set(&mut self, item: BackupItem, selected: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|(entry, _)| *entry == item) {
            entry.1 = selected;
        }
    }

    pub fn is_selected(&self, item: BackupItem) -> bool {
        self.entries
            .iter()
            .any(|(entry, selected)| *entry == item && *selected)
    }

    /// Iterate over every item with its selection state, in menu order.
    pub fn iter(&self) -> impl Iterator<Item = (BackupItem, bool)> + '_ {
        self.entries.iter().copied()
    }

    /// Iterate over selected items, in menu order.
    pub fn selected(&self) -> impl Iterator<Item = BackupItem> + '_ {
        self.iter()
            .filter_map(|(item, selected)| selected.then_some(item))
    }

    pub fn count(&self) -> usize {
        self.selected().count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::all()
    }
}

/// One parsed line of operator input while the menu is displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    Toggle(usize),
    SelectAll,
    SelectNone,
    Submit,
    Invalid(String),
}

impl MenuCommand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input {
            "" => Self::Submit,
            "a" | "A" => Self::SelectAll,
            "n" | "N" => Self::SelectNone,
            _ => match input.parse::<usize>() {
                Ok(index) if BackupItem::from_index(index).is_some() => Self::Toggle(index),
                _ => Self::Invalid(input.to_string()),
            },
        }
    }
}

/// Phase of the selection menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuPhase {
    /// Showing the checklist and accepting commands.
    Displaying,

    /// Waiting for the final "proceed?" answer.
    Confirming,

    /// Operator confirmed the selection.
    Proceed,

    /// Operator declined at the confirmation prompt.
    Cancelled,

    /// Operator submitted with nothing selected.
    Empty,
}

impl MenuPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Proceed | Self::Cancelled | Self::Empty)
    }
}

/// Selection menu state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub selection: Selection,
    pub phase: MenuPhase,
    pub notice: Option<String>,
}

impl Menu {
    /// Construct new menu displaying target selection.
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            phase: MenuPhase::Displaying,
            notice: None,
        }
    }

    /// Apply one line of operator input.
    ///
    /// Terminal phases absorb all input.
    pub fn transition(mut self, input: &str) -> Self {
        self.notice = None;
        match self.phase {
            MenuPhase::Displaying => self.apply(MenuCommand::parse(input)),
            MenuPhase::Confirming => {
                let declined = matches!(input.trim().to_lowercase().as_str(), "n" | "no");
                self.answer(!declined)
            }
            _ => self,
        }
    }

    /// Apply parsed menu command.
    pub fn apply(mut self, command: MenuCommand) -> Self {
        if self.phase != MenuPhase::Displaying {
            return self;
        }

        match command {
            MenuCommand::Toggle(index) => {
                self.selection.toggle(index);
            }
            MenuCommand::SelectAll => self.selection.select_all(),
            MenuCommand::SelectNone => self.selection.select_none(),
            MenuCommand::Submit if self.selection.is_empty() => self.phase = MenuPhase::Empty,
            MenuCommand::Submit => self.phase = MenuPhase::Confirming,
            MenuCommand::Invalid(input) => {
                self.notice = Some(format!("invalid choice {input:?}"));
            }
        }

        self
    }

    /// Answer the final confirmation prompt.
    pub fn answer(mut self, proceed: bool) -> Self {
        if self.phase == MenuPhase::Confirming {
            self.phase = if proceed {
                MenuPhase::Proceed
            } else {
                MenuPhase::Cancelled
            };
        }

        self
    }

    /// Question asked while confirming.
    pub fn confirmation_message(&self) -> String {
        format!("Back up {} selected item(s)?", self.selection.count())
    }
}

/// Draw the checklist for current menu state.
pub fn render(menu: &Menu) -> String {
    let mut out = String::from("Select what to back up:\n\n");
    for (item, selected) in menu.selection.iter() {
        let mark = if selected { 'x' } else { ' ' };
        let _ = writeln!(out, "  [{mark}] {}. {}", item.index(), item.label());
    }

    let _ = writeln!(
        out,
        "\n{} of {} selected",
        menu.selection.count(),
        BackupItem::ALL.len()
    );
    let _ = write!(
        out,
        "toggle with 1-{}, 'a' selects all, 'n' selects none, enter continues",
        BackupItem::ALL.len()
    );

    if let Some(notice) = &menu.notice {
        let _ = write!(out, "\n{notice}");
    }

    out
}

/// Drive menu through prompter until a terminal phase is reached.
///
/// Operator canceling a prompt, e.g., pressing escape, cancels the menu.
///
/// # Errors
///
/// - Return [`PromptError::Inquire`] if the terminal cannot be prompted.
#[instrument(skip_all, level = "debug")]
pub fn run_menu(prompter: &mut impl Prompter, mut menu: Menu) -> Result<Menu, PromptError> {
    while !menu.phase.is_terminal() {
        let answer = match menu.phase {
            MenuPhase::Confirming => prompter
                .confirm(&menu.confirmation_message(), true)
                .map(|proceed| menu.clone().answer(proceed)),
            _ => prompter
                .command(&render(&menu))
                .map(|input| menu.clone().transition(&input)),
        };

        menu = match answer {
            Ok(next) => next,
            Err(PromptError::Canceled) => {
                debug!("menu canceled at prompt");
                Menu {
                    phase: MenuPhase::Cancelled,
                    ..menu
                }
            }
            Err(error) => return Err(error),
        };
    }

    Ok(menu)
}
