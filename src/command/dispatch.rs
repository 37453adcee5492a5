use tracing::{info, warn};

use super::parse::{parse, Command};
use super::result::CommandResult;
use super::router::{CommandRouter, RouterError};
use super::schema::{CommandSchema, SchemaRegistry, ValidationError};
use crate::context::Context;
use crate::journal;

/// Parse, validate and route in one place. Every failure comes back as a
/// `CommandResult`, so an interactive session never has to stop.
#[derive(Debug, Default)]
pub struct Dispatcher {
    schemas: SchemaRegistry,
    router: CommandRouter,
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error(transparent)]
    Schema(#[from] ValidationError),
    #[error(transparent)]
    Router(#[from] RouterError),
}

impl RegisterError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        match self {
            Self::Schema(e) => e.kind(),
            Self::Router(e) => e.kind(),
        }
    }
}

impl Dispatcher {
    pub fn new(schemas: SchemaRegistry, router: CommandRouter) -> Self {
        Self { schemas, router }
    }

    /// Register a schema and its handler together.
    pub fn register<F>(&mut self, schema: CommandSchema, handler: F) -> Result<(), RegisterError>
    where
        F: Fn(&Command, &Context) -> CommandResult + 'static,
    {
        let role = schema.role.clone();
        let command = schema.command.clone();
        if self.router.has_handler(&role, &command) {
            return Err(RouterError::DuplicateHandler { role, command }.into());
        }
        self.schemas.register(schema)?;
        self.router.register(&role, &command, handler)?;
        Ok(())
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Parse and validate only.
    pub fn check(&self, text: &str) -> Result<Command, CommandResult> {
        let cmd = parse(text).map_err(|e| CommandResult::failure(e.kind(), e.to_string()))?;
        self.schemas
            .validate(&cmd)
            .map_err(|e| CommandResult::failure(e.kind(), e.to_string()))?;
        Ok(cmd)
    }

    /// Run one command line end to end.
    pub fn dispatch(&self, text: &str, ctx: &Context) -> CommandResult {
        let cmd = match self.check(text) {
            Ok(cmd) => cmd,
            Err(result) => {
                info!(input = text.trim(), error = ?result.error, "command rejected");
                return result;
            }
        };

        let result = self.router.route(&cmd, ctx);
        info!(command = %cmd, success = result.success, "command dispatched");

        if let Some(path) = ctx.journal_path() {
            if let Err(e) = journal::record_dispatch(&path, &cmd, &result) {
                warn!(path = %path.display(), "failed to write journal: {}", e);
            }
        }
        result
    }
}
