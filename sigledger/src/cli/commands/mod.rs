//! CLI commands module

pub mod audit;
pub mod config;
pub mod payload;
pub mod presentation;

use crate::cli::{CliError, CliResult};
use crate::types::ContentKey;

/// Resolve a content key from either a hex literal or text to hash.
pub(crate) fn resolve_key(
    hex_key: Option<&str>,
    text: Option<&str>,
    text_flag: &str,
) -> CliResult<ContentKey> {
    match (hex_key, text) {
        (Some(raw), None) => raw.parse().map_err(|source| CliError::Key {
            what: "content key",
            source,
        }),
        (None, Some(text)) => Ok(ContentKey::digest(text.as_bytes())),
        (Some(_), Some(_)) => Err(CliError::Usage(format!(
            "Pass either a key or {}, not both",
            text_flag
        ))),
        (None, None) => Err(CliError::Usage(format!(
            "A key or {} is required",
            text_flag
        ))),
    }
}
