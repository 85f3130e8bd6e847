//! Command registry: the fixed, ordered menu shown on the Commands panel.
//!
//! Entries are immutable once the registry is built. Execution happens on the
//! caller's thread and never touches navigation state.

#![allow(missing_docs)]

use std::fmt;
use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::core::config::CommandConfig;
use crate::core::errors::{Result, StbError};

type Callable = Arc<dyn Fn() -> std::result::Result<(), String> + Send + Sync>;

/// What a menu entry does when triggered.
#[derive(Clone)]
pub enum CommandAction {
    /// Spawn an external program and wait for it to exit.
    Exec { program: String, args: Vec<String> },
    /// Run an in-process callable.
    Callable(Callable),
}

impl CommandAction {
    #[must_use]
    pub fn exec(program: impl Into<String>, args: &[&str]) -> Self {
        Self::Exec {
            program: program.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: Fn() -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self::Callable(Arc::new(f))
    }
}

impl fmt::Debug for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exec { program, args } => f
                .debug_struct("Exec")
                .field("program", program)
                .field("args", args)
                .finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// Immutable (label, action) pair.
#[derive(Debug, Clone)]
pub struct CommandEntry {
    label: String,
    action: CommandAction,
}

impl CommandEntry {
    #[must_use]
    pub fn new(label: impl Into<String>, action: CommandAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn action(&self) -> &CommandAction {
        &self.action
    }

    /// Run the action to completion. A non-zero exit status is a failure.
    pub fn execute(&self) -> Result<()> {
        match &self.action {
            CommandAction::Exec { program, args } => {
                let output = Command::new(program)
                    .args(args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::piped())
                    .output()
                    .map_err(|e| StbError::CommandFailed {
                        label: self.label.clone(),
                        details: format!("{program}: {e}"),
                    })?;
                if output.status.success() {
                    return Ok(());
                }
                let stderr = String::from_utf8_lossy(&output.stderr);
                let first_line = stderr.lines().next().unwrap_or("").trim();
                let details = if first_line.is_empty() {
                    format!("{program} exited with {}", output.status)
                } else {
                    first_line.to_string()
                };
                Err(StbError::CommandFailed {
                    label: self.label.clone(),
                    details,
                })
            }
            CommandAction::Callable(f) => f().map_err(|details| StbError::CommandFailed {
                label: self.label.clone(),
                details,
            }),
        }
    }
}

/// Ordered, non-empty, read-only list of command entries.
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    entries: Arc<[CommandEntry]>,
}

impl CommandRegistry {
    /// Build a registry; an empty list is rejected so index arithmetic is always defined.
    pub fn new(entries: Vec<CommandEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(StbError::InvalidConfig {
                details: "command registry must contain at least one entry".to_string(),
            });
        }
        Ok(Self {
            entries: entries.into(),
        })
    }

    pub fn from_config(commands: &[CommandConfig]) -> Result<Self> {
        let entries = commands
            .iter()
            .map(|c| {
                CommandEntry::new(
                    c.label.clone(),
                    CommandAction::Exec {
                        program: c.program.clone(),
                        args: c.args.clone(),
                    },
                )
            })
            .collect();
        Self::new(entries)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CommandEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(CommandEntry::label)
    }
}
