//! CLI context - configuration and registry access shared by all commands

use super::{CliError, CliResult, OutputFormat, OutputFormatter};
use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::registry::Registry;
use crate::types::{CallContext, Identity};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Shared context for CLI commands
pub struct CliContext {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Loaded registry configuration, with command-line overrides applied
    pub config: RegistryConfig,
    /// Output format preference
    pub output_format: OutputFormat,
    /// Quiet mode (suppress status messages)
    pub quiet: bool,
    /// Verbose mode (extra detail)
    pub verbose: bool,
    /// Caller identity from the command line
    caller_override: Option<Identity>,
}

impl CliContext {
    /// Create a context from an explicit configuration path
    pub fn new(config_path: PathBuf) -> CliResult<Self> {
        let config = RegistryConfig::load(&config_path)?;
        Ok(Self::from_parts(config_path, config))
    }

    /// Locate the configuration (explicit path, `SIGLEDGER_CONFIG`, then the
    /// default search paths) and load it. A missing file yields defaults.
    pub fn discover(explicit: Option<&Path>) -> CliResult<Self> {
        let (config_path, config) = RegistryConfig::discover(explicit)?;
        debug!(path = %config_path.display(), "configuration resolved");
        Ok(Self::from_parts(config_path, config))
    }

    pub fn from_parts(config_path: PathBuf, config: RegistryConfig) -> Self {
        Self {
            config_path,
            config,
            output_format: OutputFormat::Table,
            quiet: false,
            verbose: false,
            caller_override: None,
        }
    }

    /// Set output format
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set quiet mode
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Set verbose mode
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Use `path` as the database instead of `storage.db_path`.
    pub fn with_db_path(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.config.storage.db_path = path;
        }
        self
    }

    /// Override the owner from the configuration file.
    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        if let Some(owner) = owner {
            self.config.owner = owner;
        }
        self
    }

    pub fn with_caller(mut self, caller: Option<String>) -> Self {
        self.caller_override = caller.map(Identity::new).filter(|c| !c.is_empty());
        self
    }

    /// Identity used for writes: `--caller`, then `caller`, then `owner`.
    pub fn caller(&self) -> Identity {
        self.caller_override
            .clone()
            .unwrap_or_else(|| self.config.default_caller())
    }

    /// Open the registry described by the configuration.
    pub fn open_registry(&self) -> CliResult<Registry> {
        if self.config.owner.trim().is_empty() {
            return Err(CliError::Usage(format!(
                "No registry owner configured; set `owner` in {} or pass --owner",
                self.config_path.display()
            )));
        }
        Ok(Registry::from_config(&self.config)?)
    }

    /// Call context for the current caller at wall-clock time.
    pub fn call_context(&self, registry: &Registry) -> CallContext {
        self.call_context_with(registry, &SystemClock)
    }

    pub fn call_context_with(&self, registry: &Registry, clock: &dyn Clock) -> CallContext {
        registry.call_context(self.caller(), clock)
    }

    /// Formatter for the selected output format
    pub fn formatter(&self) -> OutputFormatter {
        OutputFormatter::new(self.output_format)
    }

    /// Print a status message unless quiet or emitting JSON
    pub fn status(&self, message: &str) {
        if !self.quiet && self.output_format != OutputFormat::Json {
            self.formatter().success(message);
        }
    }
}
