//! Error types for the registry
//!
//! Every defined failure is caller-recoverable: a rejected write leaves the
//! registry, the presentation ledger, the commit chain and the event journal
//! exactly as they were.

use crate::types::{ContentKey, Identity};
use thiserror::Error;

/// Failure of the single-writer gate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Only the registry owner can call this (caller: {caller})")]
    Unauthorized { caller: Identity },
}

/// Registry operation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Only the registry owner can call this (caller: {caller})")]
    Unauthorized { caller: Identity },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Payload already logged: {key}")]
    AlreadyLogged { key: ContentKey },

    #[error("Registry owner mismatch: store belongs to {stored}, requested {requested}")]
    OwnerMismatch {
        stored: Identity,
        requested: Identity,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

impl From<AuthError> for RegistryError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized { caller } => RegistryError::Unauthorized { caller },
        }
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(e: rusqlite::Error) -> Self {
        RegistryError::Storage(e.to_string())
    }
}

/// Errors raised while parsing hex-encoded keys and signatures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

impl From<hex::FromHexError> for KeyParseError {
    fn from(e: hex::FromHexError) -> Self {
        KeyParseError::InvalidHex(e.to_string())
    }
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
