use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};

/// Source of interactive answers.
///
/// Workflows never read stdin directly so they can run against a script.
pub trait Prompter: Send + Sync {
    /// Free-text answer, trimmed. An empty answer yields `default` when given.
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String>;

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
}

/// Terminal prompts through `dialoguer`.
#[derive(Default)]
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Prompter for TerminalPrompter {
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(d) = default {
            input = input.default(d.to_string());
        }
        let answer = input.interact_text()?;
        Ok(answer.trim().to_string())
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }
}

/// Replays canned answers in order; used for unattended runs and tests.
///
/// When the script runs dry every prompt takes its default (`""` for inputs
/// without one).
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
        }
    }

    fn next(&self) -> Option<String> {
        self.answers
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .map(|s| s.trim().to_string())
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, _prompt: &str, default: Option<&str>) -> Result<String> {
        Ok(match self.next() {
            Some(a) if !a.is_empty() => a,
            _ => default.unwrap_or_default().to_string(),
        })
    }

    fn confirm(&self, _prompt: &str, default: bool) -> Result<bool> {
        Ok(match self.next().map(|a| a.to_lowercase()) {
            Some(a) if a == "y" || a == "yes" || a == "true" => true,
            Some(a) if a == "n" || a == "no" || a == "false" => false,
            _ => default,
        })
    }
}
