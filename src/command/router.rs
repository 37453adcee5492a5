use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use super::parse::Command;
use super::result::CommandResult;
use crate::context::Context;
use crate::error::ErrorKind;

/// A registered command handler. Failures are returned as results.
pub type Handler = Box<dyn Fn(&Command, &Context) -> CommandResult>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("handler already registered for /{role}::{command}")]
    DuplicateHandler { role: String, command: String },
}

impl RouterError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::DuplicateHandler
    }
}

/// Maps `(role, command)` to exactly one handler.
#[derive(Default)]
pub struct CommandRouter {
    handlers: BTreeMap<(String, String), Handler>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, role: &str, command: &str, handler: F) -> Result<(), RouterError>
    where
        F: Fn(&Command, &Context) -> CommandResult + 'static,
    {
        let key = (role.to_string(), command.to_string());
        if self.handlers.contains_key(&key) {
            return Err(RouterError::DuplicateHandler {
                role: role.to_string(),
                command: command.to_string(),
            });
        }
        self.handlers.insert(key, Box::new(handler));
        Ok(())
    }

    pub fn has_handler(&self, role: &str, command: &str) -> bool {
        self.handlers
            .contains_key(&(role.to_string(), command.to_string()))
    }

    /// Invoke the handler for `cmd`. A missing handler is a failed result,
    /// not an error.
    pub fn route(&self, cmd: &Command, ctx: &Context) -> CommandResult {
        let key = (cmd.role.clone(), cmd.command.clone());
        match self.handlers.get(&key) {
            Some(handler) => {
                debug!(role = %cmd.role, command = %cmd.command, "routing command");
                handler(cmd, ctx)
            }
            None => CommandResult::failure(
                ErrorKind::UnknownCommand,
                format!("No handler registered for /{}::{}", cmd.role, cmd.command),
            ),
        }
    }

    /// Registered `(role, command)` pairs sorted by role then command.
    pub fn list_commands(&self, role: Option<&str>) -> Vec<(String, String)> {
        self.handlers
            .keys()
            .filter(|(r, _)| role.map_or(true, |want| r == want))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
