//! sigledger - command-line interface for the signature registry
//!
//! # Usage
//!
//! ```bash
//! # Write a configuration file
//! sigledger config init --owner 0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266
//!
//! # Log a signature, keyed by the hash of some content
//! sigledger payload log --content 0x1234 --signature 0xabcdef...
//!
//! # Append to and read a presentation history
//! sigledger presentation log --name presentationKey --json '{"v":1}'
//! sigledger presentation history --name presentationKey
//!
//! # Audit
//! sigledger events
//! sigledger verify
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use sigledger::cli::commands::{
    self, config::ConfigCommand, payload::PayloadCommand, presentation::PresentationCommand,
};
use sigledger::cli::{CliContext, OutputFormat, OutputFormatter};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sigledger")]
#[command(version)]
#[command(about = "Owner-gated signature registry with append-only presentation history", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides storage.db_path)
    #[arg(long, global = true, value_name = "FILE", env = "SIGLEDGER_DB")]
    db: Option<PathBuf>,

    /// Registry owner (overrides the configured owner)
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Identity to write as (defaults to the configured caller, then owner)
    #[arg(long, global = true, env = "SIGLEDGER_CALLER")]
    caller: Option<String>,

    /// Output format (table, json, plain)
    #[arg(short, long, global = true, default_value = "table")]
    output_format: String,

    /// Suppress status messages
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the registry owner
    Owner,

    /// Write-once signature records
    Payload {
        #[command(subcommand)]
        command: PayloadCommand,
    },

    /// Append-only presentation histories
    Presentation {
        #[command(subcommand)]
        command: PresentationCommand,
    },

    /// List PayloadLogged events in emission order
    Events,

    /// Verify the commit chain against stored records
    Verify,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

fn init_logging(default_filter: &str, verbose: bool) {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if verbose {
        if let Ok(directive) = "sigledger=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn run(cli: Cli, format: OutputFormat) -> anyhow::Result<()> {
    let ctx = CliContext::discover(cli.config.as_deref())
        .context("Error loading configuration")?
        .with_output_format(format)
        .with_quiet(cli.quiet)
        .with_verbose(cli.verbose)
        .with_db_path(cli.db)
        .with_owner(cli.owner)
        .with_caller(cli.caller);

    init_logging(&ctx.config.logging.filter, ctx.verbose);
    debug!(config = %ctx.config_path.display(), format = %format, "configuration loaded");

    match cli.command {
        Commands::Owner => commands::audit::owner(&ctx)?,
        Commands::Payload { command } => commands::payload::execute(&ctx, command)?,
        Commands::Presentation { command } => commands::presentation::execute(&ctx, command)?,
        Commands::Events => commands::audit::events(&ctx)?,
        Commands::Verify => commands::audit::verify(&ctx)?,
        Commands::Config { command } => commands::config::execute(&ctx, command)?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let format: OutputFormat = cli.output_format.parse().unwrap_or_else(|e| {
        eprintln!("Warning: {}. Using table format.", e);
        OutputFormat::Table
    });

    if let Err(e) = run(cli, format) {
        OutputFormatter::new(format).error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
