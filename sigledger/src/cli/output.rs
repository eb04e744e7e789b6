//! Output formatting for CLI commands

use crate::chain::IntegrityReport;
use crate::events::RegistryEvent;
use crate::types::{ContentKey, PayloadRecord, PresentationEntry, Timestamp};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::fmt::Display;

/// Supported output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text (minimal formatting)
    Plain,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "plain" => Ok(OutputFormat::Plain),
            _ => Err(format!(
                "Unknown output format '{}'. Valid options: table, json, plain",
                s
            )),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Plain => write!(f, "plain"),
        }
    }
}

/// Render a commit timestamp as RFC 3339 next to the raw seconds.
pub fn format_timestamp(ts: Timestamp) -> String {
    match DateTime::<Utc>::from_timestamp(ts as i64, 0) {
        Some(dt) => format!("{} ({})", ts, dt.to_rfc3339()),
        None => ts.to_string(),
    }
}

/// Output formatter for consistent CLI output
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Plain => println!("{}", message),
            OutputFormat::Table => println!("{} {}", "✓".green(), message),
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({"status": "error", "message": message})
                );
            }
            OutputFormat::Plain => eprintln!("error: {}", message),
            OutputFormat::Table => eprintln!("{} {}", "✗".red(), message),
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({"status": "warning", "message": message})
                );
            }
            OutputFormat::Plain => eprintln!("warning: {}", message),
            OutputFormat::Table => eprintln!("{} {}", "⚠".yellow(), message),
        }
    }

    /// Print data as JSON
    pub fn json<T: Serialize>(&self, data: &T) {
        match serde_json::to_string_pretty(data) {
            Ok(json) => println!("{}", json),
            Err(e) => self.error(&format!("Failed to serialize to JSON: {}", e)),
        }
    }

    /// Print a simple key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::json!({ key: value })),
            OutputFormat::Table => println!("{}: {}", key.cyan(), value),
            OutputFormat::Plain => println!("{}: {}", key, value),
        }
    }

    /// Print a section title
    pub fn section(&self, title: &str) {
        match self.format {
            OutputFormat::Table => {
                println!();
                println!("{}", title.bold().underline());
                println!();
            }
            OutputFormat::Plain => {
                println!();
                println!("{}", title);
                println!();
            }
            OutputFormat::Json => {}
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        match self.format {
            OutputFormat::Table => println!("  {} {}", "•".cyan(), item),
            _ => println!("  - {}", item),
        }
    }

    pub fn payload(&self, key: &ContentKey, record: Option<&PayloadRecord>) {
        if self.format == OutputFormat::Json {
            // Absent records render as the empty record so callers can test
            // the timestamp field.
            let empty = PayloadRecord::default();
            self.json(&serde_json::json!({
                "key": key,
                "found": record.is_some(),
                "record": record.unwrap_or(&empty),
            }));
            return;
        }
        match record {
            Some(record) => {
                self.section("Payload");
                self.kv("Key", &record.key.to_hex());
                self.kv("Signature", &record.signature.to_hex());
                self.kv("Logged at", &format_timestamp(record.logged_at));
            }
            None => self.warning(&format!("No payload logged under {}", key)),
        }
    }

    pub fn presentation_history(&self, key: &ContentKey, history: &[PresentationEntry]) {
        if self.format == OutputFormat::Json {
            self.json(&serde_json::json!({ "key": key, "entries": history }));
            return;
        }
        self.section(&format!("Presentation {}", key));
        if history.is_empty() {
            self.list_item("(no entries)");
        }
        for (i, entry) in history.iter().enumerate() {
            self.list_item(&format!(
                "#{} at {}: {}",
                i,
                format_timestamp(entry.timestamp),
                entry.json_string
            ));
        }
    }

    pub fn events(&self, events: &[RegistryEvent]) {
        if self.format == OutputFormat::Json {
            self.json(&events);
            return;
        }
        self.section("Events");
        if events.is_empty() {
            self.list_item("(no events)");
        }
        for event in events {
            self.list_item(&format!(
                "{} {} at {}",
                event.name(),
                event.key(),
                format_timestamp(event.timestamp())
            ));
        }
    }

    pub fn integrity(&self, report: &IntegrityReport, head: Option<&str>) {
        if self.format == OutputFormat::Json {
            self.json(&serde_json::json!({ "report": report, "head": head }));
            return;
        }
        self.kv("Links checked", &report.links_checked.to_string());
        self.kv("Chain head", head.unwrap_or("(empty)"));
        if report.ok {
            self.success("Commit chain intact");
        } else {
            let at = report
                .first_broken
                .map(|s| format!(" at link {}", s))
                .unwrap_or_default();
            self.error(&format!(
                "Commit chain broken{}: {}",
                at,
                report.reason.as_deref().unwrap_or("unknown reason")
            ));
        }
    }
}
