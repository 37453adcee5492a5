//! Command protocol: `/<role>::<command>(<args>)`.
//!
//! Text is parsed into a [`Command`], checked against a [`SchemaRegistry`]
//! and handed to the handler registered in a [`CommandRouter`]. The
//! [`Dispatcher`] strings the three together.

mod dispatch;
mod parse;
mod result;
mod router;
mod schema;

pub use dispatch::{Dispatcher, RegisterError};
pub use parse::{is_command, parse, Command, ParseError};
pub use result::CommandResult;
pub use router::{CommandRouter, Handler, RouterError};
pub use schema::{CommandSchema, SchemaRegistry, ValidationError};

#[cfg(test)]
mod tests;
