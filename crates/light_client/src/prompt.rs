//! Operator interaction.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Source of operator decisions.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask for a line of text. `None` means the operator gave nothing.
    async fn input(&self, message: &str) -> Option<String>;

    /// Ask a yes/no question.
    async fn confirm(&self, message: &str) -> bool;

    /// Show information that needs no answer.
    fn notify(&self, message: &str);
}

/// Interactive prompter on stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl StdinPrompter {
    async fn read_line(message: String) -> Option<String> {
        let read = tokio::task::spawn_blocking(move || -> io::Result<String> {
            print!("{message} ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line.trim().to_string())
        })
        .await;

        match read {
            Ok(Ok(line)) if !line.is_empty() => Some(line),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!("Failed to read from stdin: {}", e);
                None
            }
            Err(e) => {
                warn!("Stdin reader panicked: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn input(&self, message: &str) -> Option<String> {
        Self::read_line(format!("{message}:")).await
    }

    async fn confirm(&self, message: &str) -> bool {
        Self::read_line(format!("{message} [y/N]:"))
            .await
            .map(|answer| matches!(answer.to_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    }

    fn notify(&self, message: &str) {
        println!("{message}");
    }
}

/// Prompter for unattended runs: never answers, never confirms.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractivePrompter;

#[async_trait]
impl Prompter for NonInteractivePrompter {
    async fn input(&self, message: &str) -> Option<String> {
        warn!("Non-interactive mode, not answering: {}", message);
        None
    }

    async fn confirm(&self, message: &str) -> bool {
        warn!("Non-interactive mode, declining: {}", message);
        false
    }

    fn notify(&self, message: &str) {
        println!("{message}");
    }
}

/// Prompter that replays canned answers, for tests.
///
/// Once a queue runs dry, inputs answer `None` and confirmations `false`.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    inputs: Mutex<VecDeque<Option<String>>>,
    confirms: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inputs<I, S>(self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(inputs.into_iter().map(|s| Some(s.into())));
        self
    }

    pub fn with_confirms(self, confirms: impl IntoIterator<Item = bool>) -> Self {
        self.confirms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(confirms);
        self
    }

    /// Every question asked through `input` or `confirm`.
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, message: &str) {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn input(&self, message: &str) -> Option<String> {
        self.record(message);
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .flatten()
    }

    async fn confirm(&self, message: &str) -> bool {
        self.record(message);
        self.confirms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(false)
    }

    fn notify(&self, message: &str) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
