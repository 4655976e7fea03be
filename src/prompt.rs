// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operator prompts.
//!
//! The backup workflow only ever asks the operator two kinds of questions: a
//! free-form menu command, or a yes/no confirmation. Both go through the
//! [`Prompter`] trait so the workflow can be driven without a terminal.

use inquire::{Confirm, InquireError, Text};
use std::collections::VecDeque;

/// Layer of indirection for talking to the operator.
pub trait Prompter {
    /// Show screen, and read one line of input.
    fn command(&mut self, screen: &str) -> Result<String>;

    /// Ask a yes/no question.
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;
}

/// Prompter backed by the terminal through inquire.
#[derive(Debug, Default, Clone)]
pub struct InquirePrompter;

impl InquirePrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for InquirePrompter {
    fn command(&mut self, screen: &str) -> Result<String> {
        println!("{screen}");
        Text::new("choice:").prompt().map_err(PromptError::from)
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        Confirm::new(message)
            .with_default(default)
            .prompt()
            .map_err(PromptError::from)
    }
}

/// Prompter that replays canned answers.
///
/// Useful for tests. Every screen shown and question asked is recorded.
/// Running out of answers is treated as the operator canceling.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    commands: VecDeque<String>,
    confirmations: VecDeque<bool>,
    pub screens: Vec<String>,
    pub questions: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(
        commands: impl IntoIterator<Item = impl Into<String>>,
        confirmations: impl IntoIterator<Item = bool>,
    ) -> Self {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            confirmations: confirmations.into_iter().collect(),
            screens: Vec::new(),
            questions: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn command(&mut self, screen: &str) -> Result<String> {
        self.screens.push(screen.to_string());
        self.commands.pop_front().ok_or(PromptError::Canceled)
    }

    fn confirm(&mut self, message: &str, _default: bool) -> Result<bool> {
        self.questions.push(message.to_string());
        self.confirmations.pop_front().ok_or(PromptError::Canceled)
    }
}

/// Prompt error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Operator pressed escape or interrupted the prompt.
    #[error("prompt canceled by operator")]
    Canceled,

    /// Terminal could not be used for prompting.
    #[error(transparent)]
    Inquire(InquireError),
}

impl From<InquireError> for PromptError {
    fn from(error: InquireError) -> Self {
        match error {
            InquireError::OperationCanceled | InquireError::OperationInterrupted => Self::Canceled,
            other => Self::Inquire(other),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
