//! Payload command - write-once signature records

use super::resolve_key;
use crate::cli::{CliContext, CliError, CliResult, OutputFormat, OutputFormatter};
use crate::types::{ContentKey, Signature};
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum PayloadCommand {
    /// Log a signature under a content key (once per key)
    Log {
        /// 32-byte content key as hex
        #[arg(required_unless_present = "content")]
        key: Option<String>,

        /// Signature bytes as hex
        #[arg(long, short)]
        signature: String,

        /// Derive the key by hashing this text with SHA-256
        #[arg(long, conflicts_with = "key")]
        content: Option<String>,
    },

    /// Show the record logged under a key
    Get {
        /// 32-byte content key as hex
        #[arg(required_unless_present = "content")]
        key: Option<String>,

        /// Derive the key by hashing this text with SHA-256
        #[arg(long, conflicts_with = "key")]
        content: Option<String>,
    },
}

pub fn execute(ctx: &CliContext, command: PayloadCommand) -> CliResult<()> {
    let formatter = ctx.formatter();

    match &command {
        PayloadCommand::Log {
            key,
            signature,
            content,
        } => {
            let key = resolve_key(key.as_deref(), content.as_deref(), "--content")?;
            command.log(ctx, key, signature, &formatter)
        }
        PayloadCommand::Get { key, content } => {
            let key = resolve_key(key.as_deref(), content.as_deref(), "--content")?;
            command.get(ctx, &key, &formatter)
        }
    }
}

impl PayloadCommand {
    fn log(
        &self,
        ctx: &CliContext,
        key: ContentKey,
        signature: &str,
        formatter: &OutputFormatter,
    ) -> CliResult<()> {
        let signature: Signature = signature.parse().map_err(|source| CliError::Key {
            what: "signature",
            source,
        })?;

        let mut registry = ctx.open_registry()?;
        let call = ctx.call_context(&registry);
        registry.log_payload(&call, key, signature)?;

        let record = registry.get_payload_info(&key);
        if ctx.output_format == OutputFormat::Json {
            formatter.payload(&key, record);
        } else {
            ctx.status(&format!("Payload logged under {}", key));
            if ctx.verbose {
                formatter.payload(&key, record);
            }
        }
        Ok(())
    }

    fn get(&self, ctx: &CliContext, key: &ContentKey, formatter: &OutputFormatter) -> CliResult<()> {
        let registry = ctx.open_registry()?;
        formatter.payload(key, registry.get_payload_info(key));
        Ok(())
    }
}
