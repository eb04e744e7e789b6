//! Presentation command - append-only revision history

use super::resolve_key;
use crate::cli::{CliContext, CliResult, OutputFormat, OutputFormatter};
use crate::types::ContentKey;
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum PresentationCommand {
    /// Append a revision to a presentation's history
    Log {
        /// 32-byte presentation key as hex
        #[arg(required_unless_present = "name")]
        key: Option<String>,

        /// Presentation content (stored verbatim)
        #[arg(long, short)]
        json: String,

        /// Derive the key by hashing this name with SHA-256
        #[arg(long, conflicts_with = "key")]
        name: Option<String>,
    },

    /// Show every revision logged under a key, oldest first
    History {
        /// 32-byte presentation key as hex
        #[arg(required_unless_present = "name")]
        key: Option<String>,

        /// Derive the key by hashing this name with SHA-256
        #[arg(long, conflicts_with = "key")]
        name: Option<String>,
    },
}

pub fn execute(ctx: &CliContext, command: PresentationCommand) -> CliResult<()> {
    let formatter = ctx.formatter();

    match &command {
        PresentationCommand::Log { key, json, name } => {
            let key = resolve_key(key.as_deref(), name.as_deref(), "--name")?;
            command.log(ctx, key, json, &formatter)
        }
        PresentationCommand::History { key, name } => {
            let key = resolve_key(key.as_deref(), name.as_deref(), "--name")?;
            command.history(ctx, &key, &formatter)
        }
    }
}

impl PresentationCommand {
    fn log(
        &self,
        ctx: &CliContext,
        key: ContentKey,
        json: &str,
        formatter: &OutputFormatter,
    ) -> CliResult<()> {
        let mut registry = ctx.open_registry()?;
        let call = ctx.call_context(&registry);
        registry.log_presentation(&call, key, json)?;

        let history = registry.get_presentation_history(&key);
        if ctx.output_format == OutputFormat::Json {
            formatter.presentation_history(&key, history);
        } else {
            ctx.status(&format!(
                "Presentation revision #{} logged under {}",
                history.len().saturating_sub(1),
                key
            ));
            if ctx.verbose {
                formatter.presentation_history(&key, history);
            }
        }
        Ok(())
    }

    fn history(
        &self,
        ctx: &CliContext,
        key: &ContentKey,
        formatter: &OutputFormatter,
    ) -> CliResult<()> {
        let registry = ctx.open_registry()?;
        formatter.presentation_history(key, registry.get_presentation_history(key));
        Ok(())
    }
}
