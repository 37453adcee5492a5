use std::collections::BTreeMap;

use thiserror::Error;

use super::parse::Command;
use crate::error::ErrorKind;

/// Accepted argument range for one `(role, command)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSchema {
    pub role: String,
    pub command: String,
    pub min_args: usize,
    /// `None` means variadic.
    pub max_args: Option<usize>,
    /// Argument synopsis shown by `list`, e.g. `[target][, dry-run]`.
    pub usage: String,
}

impl CommandSchema {
    pub fn new(role: &str, command: &str, min_args: usize, max_args: Option<usize>) -> Self {
        Self {
            role: role.to_string(),
            command: command.to_string(),
            min_args,
            max_args,
            usage: String::new(),
        }
    }

    pub fn with_usage(mut self, usage: &str) -> Self {
        self.usage = usage.to_string();
        self
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Human-readable arity, e.g. `exactly 1`, `0-2`, `at least 1`.
    pub fn expected(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => format!("exactly {}", max),
            Some(max) => format!("{}-{}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }

    /// `/<role>::<command>(<usage>)` line for listings.
    pub fn synopsis(&self) -> String {
        if self.usage.is_empty() {
            format!("/{}::{}", self.role, self.command)
        } else {
            format!("/{}::{}({})", self.role, self.command, self.usage)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown role: '{role}'")]
    UnknownRole { role: String },
    #[error("unknown command for role '{role}': '{command}'")]
    UnknownCommand { role: String, command: String },
    #[error("/{role}::{command} takes {expected} args, got {got}")]
    ArgCountMismatch {
        role: String,
        command: String,
        expected: String,
        got: usize,
    },
    #[error("schema already registered for /{role}::{command}")]
    DuplicateSchema { role: String, command: String },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownRole { .. } => ErrorKind::UnknownRole,
            Self::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            Self::ArgCountMismatch { .. } => ErrorKind::ArgCountMismatch,
            Self::DuplicateSchema { .. } => ErrorKind::DuplicateHandler,
        }
    }
}

/// Table of known commands. Built explicitly and handed to the dispatcher.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<(String, String), CommandSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: CommandSchema) -> Result<(), ValidationError> {
        let key = (schema.role.clone(), schema.command.clone());
        if self.schemas.contains_key(&key) {
            return Err(ValidationError::DuplicateSchema {
                role: schema.role,
                command: schema.command,
            });
        }
        self.schemas.insert(key, schema);
        Ok(())
    }

    pub fn get(&self, role: &str, command: &str) -> Option<&CommandSchema> {
        self.schemas.get(&(role.to_string(), command.to_string()))
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.schemas.keys().any(|(r, _)| r == role)
    }

    /// Check a command against its schema without executing anything.
    pub fn validate(&self, cmd: &Command) -> Result<&CommandSchema, ValidationError> {
        if !self.has_role(&cmd.role) {
            return Err(ValidationError::UnknownRole {
                role: cmd.role.clone(),
            });
        }
        let schema = self
            .get(&cmd.role, &cmd.command)
            .ok_or_else(|| ValidationError::UnknownCommand {
                role: cmd.role.clone(),
                command: cmd.command.clone(),
            })?;
        if !schema.accepts(cmd.args.len()) {
            return Err(ValidationError::ArgCountMismatch {
                role: cmd.role.clone(),
                command: cmd.command.clone(),
                expected: schema.expected(),
                got: cmd.args.len(),
            });
        }
        Ok(schema)
    }

    /// Schemas ordered by role then command, optionally for one role.
    pub fn schemas(&self, role: Option<&str>) -> Vec<&CommandSchema> {
        self.schemas
            .values()
            .filter(|s| role.map_or(true, |r| s.role == r))
            .collect()
    }

    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self.schemas.keys().map(|(r, _)| r.as_str()).collect();
        roles.dedup();
        roles
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
