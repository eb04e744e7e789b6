//! sigledger CLI module
//!
//! Command-line interface over a configured [`Registry`](crate::Registry).
//!
//! # Commands
//!
//! - `owner` - Show the registry owner
//! - `payload` - Payload registry (log, get)
//! - `presentation` - Presentation ledger (log, history)
//! - `events` - List emitted `PayloadLogged` events
//! - `verify` - Verify the commit chain
//! - `config` - Configuration (show, validate, init)

pub mod commands;
pub mod context;
pub mod output;

pub use context::CliContext;
pub use output::{OutputFormat, OutputFormatter};

use crate::config::ConfigError;
use crate::error::{KeyParseError, RegistryError};
use thiserror::Error;

/// Errors surfaced by CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid {what}: {source}")]
    Key {
        what: &'static str,
        #[source]
        source: KeyParseError,
    },

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("{0}")]
    Usage(String),
}

pub type CliResult<T> = Result<T, CliError>;
