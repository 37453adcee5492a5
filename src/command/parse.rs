use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::error::ErrorKind;

static COMMAND_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?P<role>[A-Za-z0-9_-]+)::(?P<command>[A-Za-z0-9_-]+)(?:\((?P<args>[^)]*)\))?$")
        .expect("command pattern is valid")
});

/// A parsed `/<role>::<command>(<args>)` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub role: String,
    pub command: String,
    pub args: Vec<String>,
    /// Input text after trimming.
    pub raw: String,
}

impl Command {
    /// Positional argument, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|s| s.as_str())
    }

    /// True when any argument equals `flag` (e.g. `dry-run`).
    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Arguments that are not `flag`, in order.
    pub fn args_without(&self, flag: &str) -> Vec<&str> {
        self.args
            .iter()
            .filter(|a| a.as_str() != flag)
            .map(|a| a.as_str())
            .collect()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}::{}", self.role, self.command)?;
        if !self.args.is_empty() {
            write!(f, "({})", self.args.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed command: '{input}' (expected /<role>::<command>(<args>))")]
    MalformedCommand { input: String },
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedCommand
    }
}

/// Parse a command line.
///
/// Arguments are split on commas and trimmed; surrounding quotes are
/// stripped and empty tokens dropped, so `()` yields no arguments.
///
/// # Examples
/// ```
/// use convoy::command::parse;
/// let cmd = parse("/integrator::apply_ready(integration/2026-01-10, dry-run)").unwrap();
/// assert_eq!(cmd.role, "integrator");
/// assert_eq!(cmd.args, vec!["integration/2026-01-10", "dry-run"]);
/// ```
pub fn parse(text: &str) -> Result<Command, ParseError> {
    let trimmed = text.trim();
    let caps = COMMAND_PATTERN
        .captures(trimmed)
        .ok_or_else(|| ParseError::MalformedCommand {
            input: trimmed.to_string(),
        })?;

    let args = caps
        .name("args")
        .map(|m| split_args(m.as_str()))
        .unwrap_or_default();

    Ok(Command {
        role: caps["role"].to_string(),
        command: caps["command"].to_string(),
        args,
        raw: trimmed.to_string(),
    })
}

/// Cheap syntactic check without building a `Command`.
pub fn is_command(text: &str) -> bool {
    COMMAND_PATTERN.is_match(text.trim())
}

fn split_args(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|arg| arg.trim().trim_matches(|c| c == '"' || c == '\''))
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(str::to_string)
        .collect()
}
