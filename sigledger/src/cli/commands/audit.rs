//! Read-only commands over the whole registry: owner, events and verify

use crate::cli::{CliContext, CliError, CliResult, OutputFormat};

pub fn owner(ctx: &CliContext) -> CliResult<()> {
    let registry = ctx.open_registry()?;
    let formatter = ctx.formatter();

    match ctx.output_format {
        OutputFormat::Json => formatter.json(&serde_json::json!({
            "owner": registry.owner(),
            "stats": registry.stats(),
        })),
        OutputFormat::Plain if !ctx.verbose => println!("{}", registry.owner()),
        _ => {
            let stats = registry.stats();
            formatter.kv("Owner", registry.owner().as_str());
            if ctx.verbose {
                formatter.kv("Payloads", &stats.payloads.to_string());
                formatter.kv("Presentation keys", &stats.presentation_keys.to_string());
                formatter.kv(
                    "Presentation entries",
                    &stats.presentation_entries.to_string(),
                );
                formatter.kv("Chain length", &stats.chain_length.to_string());
                formatter.kv("Durable", &stats.durable.to_string());
            }
        }
    }
    Ok(())
}

pub fn events(ctx: &CliContext) -> CliResult<()> {
    let registry = ctx.open_registry()?;
    ctx.formatter().events(registry.events());
    Ok(())
}

/// Verify the commit chain. A broken chain is reported and returned as an
/// error so the process exits non-zero.
pub fn verify(ctx: &CliContext) -> CliResult<()> {
    let registry = ctx.open_registry()?;
    let report = registry.verify_integrity();
    ctx.formatter().integrity(&report, registry.chain_head());

    if report.ok {
        Ok(())
    } else {
        Err(CliError::Integrity(
            report
                .reason
                .unwrap_or_else(|| "unknown reason".to_string()),
        ))
    }
}
