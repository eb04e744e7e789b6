//! Append-only presentation histories.
//!
//! Each presentation key owns an ordered list of revisions. Entries are never
//! removed or reordered. No input validation beyond authorization is applied
//! to presentation writes.

use crate::access::AccessGate;
use crate::error::RegistryResult;
use crate::types::{CallContext, ContentKey, PresentationEntry};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Default)]
pub struct PresentationLedger {
    histories: HashMap<ContentKey, Vec<PresentationEntry>>,
}

impl PresentationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the entry a write would append. Nothing is mutated.
    pub fn prepare(
        &self,
        gate: &AccessGate,
        ctx: &CallContext,
        json_string: String,
    ) -> RegistryResult<PresentationEntry> {
        gate.authorize(&ctx.caller)?;
        Ok(PresentationEntry {
            json_string,
            timestamp: ctx.timestamp,
        })
    }

    /// Position the next entry for `key` will occupy.
    pub fn next_index(&self, key: &ContentKey) -> usize {
        self.histories.get(key).map_or(0, Vec::len)
    }

    /// Append and return the entry's position in the history.
    pub(crate) fn append(&mut self, key: ContentKey, entry: PresentationEntry) -> usize {
        let history = self.histories.entry(key).or_default();
        if let Some(last) = history.last() {
            if entry.timestamp < last.timestamp {
                warn!(
                    key = %key,
                    previous = last.timestamp,
                    timestamp = entry.timestamp,
                    "presentation commit time went backwards"
                );
            }
        }
        history.push(entry);
        history.len() - 1
    }

    /// Full history for `key`; empty when the key was never written.
    pub fn history(&self, key: &ContentKey) -> &[PresentationEntry] {
        self.histories.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn key_count(&self) -> usize {
        self.histories.len()
    }

    pub fn entry_count(&self) -> usize {
        self.histories.values().map(Vec::len).sum()
    }
}
