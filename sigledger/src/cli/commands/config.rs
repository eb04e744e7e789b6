//! Config command - configuration management

use crate::cli::{CliContext, CliError, CliResult, OutputFormat, OutputFormatter};
use crate::config::{ConfigError, RegistryConfig, StorageConfig};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show only a specific section (storage, logging, events)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate,

    /// Initialize a new configuration file
    Init {
        /// Registry owner identity
        #[arg(long)]
        owner: String,

        /// SQLite database path recorded in the file
        #[arg(long, default_value = "sigledger.db")]
        db: PathBuf,

        /// Output path for the configuration file
        #[arg(long, default_value = "sigledger.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },
}

pub fn execute(ctx: &CliContext, command: ConfigCommand) -> CliResult<()> {
    let formatter = ctx.formatter();

    match &command {
        ConfigCommand::Show { section } => command.show_config(ctx, section.as_deref(), &formatter),
        ConfigCommand::Validate => command.validate_config(ctx, &formatter),
        ConfigCommand::Init {
            owner,
            db,
            output,
            force,
        } => command.init_config(ctx, owner, db, output, *force, &formatter),
    }
}

impl ConfigCommand {
    fn show_config(
        &self,
        ctx: &CliContext,
        section: Option<&str>,
        formatter: &OutputFormatter,
    ) -> CliResult<()> {
        let config = &ctx.config;
        let value = match section {
            None => serde_json::to_value(config),
            Some("storage") => serde_json::to_value(&config.storage),
            Some("logging") => serde_json::to_value(&config.logging),
            Some("events") => serde_json::to_value(&config.events),
            Some(other) => {
                return Err(CliError::Usage(format!(
                    "Unknown section '{}'. Valid sections: storage, logging, events",
                    other
                )))
            }
        }
        .map_err(|e| CliError::Usage(format!("Failed to render configuration: {}", e)))?;

        if ctx.output_format == OutputFormat::Json {
            formatter.json(&value);
            return Ok(());
        }

        formatter.section(&format!("Configuration ({})", ctx.config_path.display()));
        if section.is_none() {
            formatter.kv("owner", &config.owner);
            formatter.kv(
                "caller",
                config.caller.as_deref().unwrap_or("(owner)"),
            );
        }
        if matches!(section, None | Some("storage")) {
            formatter.kv(
                "storage.db_path",
                &config
                    .storage
                    .db_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(in-memory)".to_string()),
            );
        }
        if matches!(section, None | Some("logging")) {
            formatter.kv("logging.filter", &config.logging.filter);
        }
        if matches!(section, None | Some("events")) {
            formatter.kv("events.trace", &config.events.trace.to_string());
        }
        Ok(())
    }

    fn validate_config(&self, ctx: &CliContext, formatter: &OutputFormatter) -> CliResult<()> {
        if !ctx.config_path.exists() {
            formatter.warning(&format!(
                "Config file not found: {} (using defaults)",
                ctx.config_path.display()
            ));
        }

        let warnings = ctx.config.validate();
        if ctx.output_format == OutputFormat::Json {
            formatter.json(&serde_json::json!({
                "path": ctx.config_path,
                "valid": ctx.config.owner_identity().is_ok(),
                "warnings": warnings,
            }));
        } else {
            for warning in &warnings {
                formatter.warning(warning);
            }
            if warnings.is_empty() {
                formatter.success("Configuration is valid");
            }
        }

        ctx.config.owner_identity()?;
        Ok(())
    }

    fn init_config(
        &self,
        ctx: &CliContext,
        owner: &str,
        db: &Path,
        output: &Path,
        force: bool,
        formatter: &OutputFormatter,
    ) -> CliResult<()> {
        if output.exists() && !force {
            return Err(CliError::Usage(format!(
                "File already exists: {}. Use --force to overwrite.",
                output.display()
            )));
        }

        let config = RegistryConfig {
            owner: owner.to_string(),
            storage: StorageConfig {
                db_path: Some(db.to_path_buf()),
            },
            ..Default::default()
        };
        config.owner_identity()?;

        let text = config.to_toml_string()?;
        std::fs::write(output, text).map_err(|source| ConfigError::Io {
            path: output.to_path_buf(),
            source,
        })?;

        if ctx.output_format == OutputFormat::Json {
            formatter.json(&serde_json::json!({ "written": output, "config": config }));
        } else {
            formatter.success(&format!("Configuration written to {}", output.display()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ctx() -> CliContext {
        CliContext::from_parts(PathBuf::from("sigledger.toml"), RegistryConfig::default())
            .with_output_format(OutputFormat::Plain)
    }

    #[test]
    fn init_writes_loadable_config() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("sigledger.toml");
        let command = ConfigCommand::Init {
            owner: "0xOwner".into(),
            db: PathBuf::from("reg.db"),
            output: output.clone(),
            force: false,
        };
        execute(&ctx(), command).unwrap();

        let loaded = RegistryConfig::load(&output).unwrap();
        assert_eq!(loaded.owner, "0xOwner");
        assert_eq!(loaded.storage.db_path, Some(PathBuf::from("reg.db")));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("sigledger.toml");
        std::fs::write(&output, "owner = \"0xa\"").unwrap();
        let command = ConfigCommand::Init {
            owner: "0xb".into(),
            db: PathBuf::from("reg.db"),
            output: output.clone(),
            force: false,
        };
        assert!(matches!(execute(&ctx(), command), Err(CliError::Usage(_))));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "owner = \"0xa\"");
    }

    #[test]
    fn init_rejects_empty_owner() {
        let dir = tempdir().unwrap();
        let command = ConfigCommand::Init {
            owner: "  ".into(),
            db: PathBuf::from("reg.db"),
            output: dir.path().join("sigledger.toml"),
            force: false,
        };
        assert!(matches!(
            execute(&ctx(), command),
            Err(CliError::Config(ConfigError::MissingOwner))
        ));
    }

    #[test]
    fn show_rejects_unknown_section() {
        let command = ConfigCommand::Show {
            section: Some("llm".into()),
        };
        assert!(matches!(execute(&ctx(), command), Err(CliError::Usage(_))));
    }
}
