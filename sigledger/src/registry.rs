//! The registry: one access gate over a payload store and a presentation
//! ledger, with the commit chain, event emitter and optional durable store.
//!
//! All mutation goes through [`Registry::log_payload`] and
//! [`Registry::log_presentation`]. Each write runs in three steps:
//!
//! 1. prepare: authorize and validate against current state, mutating nothing;
//! 2. persist: write the rows to SQLite in one transaction (durable mode only);
//! 3. apply: update the in-memory tables, extend the chain, emit the event.
//!
//! A failure in step 1 or 2 leaves every table untouched. In durable mode the
//! view is refreshed from the database before step 1, and step 2 reports a
//! stale view if another handle committed in between; the write is then
//! prepared again against the reloaded state.

use crate::access::AccessGate;
use crate::chain::{
    payload_entry_hash, presentation_entry_hash, ChainLink, CommitChain, CommitKind,
    IntegrityReport,
};
use crate::clock::Clock;
use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::events::{EventEmitter, RegistryEvent, RegistryEventSink, TracingEventSink};
use crate::payload::PayloadRegistry;
use crate::presentation::PresentationLedger;
use crate::store::{CommitOutcome, SqliteStore, StoredState};
use crate::types::{
    CallContext, ContentKey, Identity, PayloadRecord, PresentationEntry, Signature, Timestamp,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Commit attempts before giving up when other handles keep extending the
/// stored chain.
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Counters over the registry's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub payloads: usize,
    pub presentation_keys: usize,
    pub presentation_entries: usize,
    pub events: usize,
    pub chain_length: usize,
    pub durable: bool,
}

#[derive(Debug)]
pub struct Registry {
    gate: AccessGate,
    payloads: PayloadRegistry,
    presentations: PresentationLedger,
    emitter: EventEmitter,
    chain: CommitChain,
    store: Option<SqliteStore>,
}

impl Registry {
    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    /// Pure in-memory registry owned by `owner`.
    pub fn new(owner: Identity) -> Self {
        Self {
            gate: AccessGate::new(owner),
            payloads: PayloadRegistry::new(),
            presentations: PresentationLedger::new(),
            emitter: EventEmitter::new(),
            chain: CommitChain::new(),
            store: None,
        }
    }

    /// Open (or create) a SQLite-backed registry at `path`.
    ///
    /// A fresh database records `owner`; an existing one must already belong
    /// to `owner`, otherwise [`RegistryError::OwnerMismatch`] is returned.
    /// Persisted state is loaded into memory. Events are restored into the
    /// journal without being re-delivered to sinks.
    pub fn open_db(path: &Path, owner: Identity) -> RegistryResult<Self> {
        let store = SqliteStore::open(path)?;
        store.claim_owner(&owner)?;
        let state = store.load()?;

        let mut registry = Self::new(owner);
        registry.apply_state(state)?;
        registry.store = Some(store);

        let report = registry.verify_integrity();
        if !report.ok {
            warn!(
                path = %path.display(),
                first_broken = ?report.first_broken,
                reason = report.reason.as_deref().unwrap_or(""),
                "registry database failed integrity verification"
            );
        }

        info!(
            path = %path.display(),
            payloads = registry.payloads.len(),
            presentations = registry.presentations.entry_count(),
            chain_length = registry.chain.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    /// Build a registry from configuration: owner, optional database and
    /// the tracing event sink.
    pub fn from_config(config: &RegistryConfig) -> RegistryResult<Self> {
        let owner = config
            .owner_identity()
            .map_err(|e| RegistryError::InvalidInput(e.to_string()))?;

        let mut registry = match config.storage.db_path.as_deref() {
            Some(path) => Self::open_db(path, owner)?,
            None => Self::new(owner),
        };

        if config.events.trace {
            registry.register_event_sink(Arc::new(TracingEventSink));
        }
        Ok(registry)
    }

    /// Replace the in-memory view with `state`. Sinks are kept; restored
    /// events are not re-delivered.
    fn apply_state(&mut self, state: StoredState) -> RegistryResult<()> {
        let mut payloads = PayloadRegistry::new();
        for record in state.payloads {
            payloads.insert(record)?;
        }
        let mut presentations = PresentationLedger::new();
        for (key, position, entry) in state.presentations {
            let index = presentations.append(key, entry);
            if index as u64 != position {
                return Err(RegistryError::Corrupted(format!(
                    "presentation {} has a gap at position {}",
                    key, index
                )));
            }
        }
        let mut chain = CommitChain::new();
        for link in state.links {
            chain.push(link);
        }

        self.payloads = payloads;
        self.presentations = presentations;
        self.chain = chain;
        self.emitter.restore(state.events);
        Ok(())
    }

    /// Reload from the database if another handle has committed since this
    /// view was loaded. Returns whether a reload happened. In-memory
    /// registries never reload.
    pub fn refresh(&mut self) -> RegistryResult<bool> {
        let state = match &self.store {
            Some(store) => {
                let tail = store.chain_tail()?;
                let current = self
                    .chain
                    .links()
                    .last()
                    .map(|link| (link.sequence, link.chain_hash.clone()));
                if tail == current {
                    return Ok(false);
                }
                store.load()?
            }
            None => return Ok(false),
        };

        self.apply_state(state)?;
        debug!(chain_length = self.chain.len(), "registry view reloaded");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    pub fn owner(&self) -> &Identity {
        self.gate.owner()
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn register_event_sink(&mut self, sink: Arc<dyn RegistryEventSink>) {
        self.emitter.register_sink(sink);
    }

    /// Context for `caller` at the clock's current time, never earlier than
    /// the last commit.
    pub fn call_context(&self, caller: impl Into<Identity>, clock: &dyn Clock) -> CallContext {
        CallContext::from_clock(caller, clock, self.last_commit_at())
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Log `signature` under `key`. Fails with `Unauthorized`, `InvalidInput`
    /// (all-zero key) or `AlreadyLogged`, checked in that order.
    ///
    /// On success emits exactly one `PayloadLogged` carrying the stored
    /// `logged_at`.
    pub fn log_payload(
        &mut self,
        ctx: &CallContext,
        key: ContentKey,
        signature: Signature,
    ) -> RegistryResult<()> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            if self.gate.is_owner(&ctx.caller) {
                self.refresh()?;
            }

            let record = self
                .payloads
                .prepare(&self.gate, ctx, key, signature.clone())
                .map_err(|e| {
                    warn!(key = %key, caller = %ctx.caller, error = %e, "payload write rejected");
                    e
                })?;

            let link = self.chain.next_link(
                CommitKind::Payload,
                record.key,
                0,
                record.logged_at,
                payload_entry_hash(&record),
            );
            let event = RegistryEvent::PayloadLogged {
                key: record.key,
                timestamp: record.logged_at,
            };

            if let Some(store) = &self.store {
                if store.commit_payload(&record, &link, self.chain.head(), &event)?
                    == CommitOutcome::Stale
                {
                    debug!(key = %key, "registry view is stale, retrying payload write");
                    continue;
                }
            }

            self.payloads.insert(record)?;
            self.chain.push(link);
            info!(key = %key, timestamp = ctx.timestamp, "payload logged");
            self.emitter.emit(event);
            return Ok(());
        }
        Err(stale_error())
    }

    /// Append `json_string` to the history of `key`. Only authorization is
    /// checked; no event is emitted.
    pub fn log_presentation(
        &mut self,
        ctx: &CallContext,
        key: ContentKey,
        json_string: impl Into<String>,
    ) -> RegistryResult<()> {
        let json_string = json_string.into();
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            if self.gate.is_owner(&ctx.caller) {
                self.refresh()?;
            }

            let entry = self
                .presentations
                .prepare(&self.gate, ctx, json_string.clone())
                .map_err(|e| {
                    warn!(key = %key, caller = %ctx.caller, error = %e, "presentation write rejected");
                    e
                })?;

            let index = self.presentations.next_index(&key) as u64;
            let link = self.chain.next_link(
                CommitKind::Presentation,
                key,
                index,
                entry.timestamp,
                presentation_entry_hash(&key, index, &entry),
            );

            if let Some(store) = &self.store {
                if store.commit_presentation(&key, index, &entry, &link, self.chain.head())?
                    == CommitOutcome::Stale
                {
                    debug!(key = %key, "registry view is stale, retrying presentation write");
                    continue;
                }
            }

            self.presentations.append(key, entry);
            self.chain.push(link);
            debug!(key = %key, index, timestamp = ctx.timestamp, "presentation appended");
            return Ok(());
        }
        Err(stale_error())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Stored record for `key`, `None` if it was never logged.
    pub fn get_payload_info(&self, key: &ContentKey) -> Option<&PayloadRecord> {
        self.payloads.get(key)
    }

    /// Ordered history for `key`; empty if it was never written.
    pub fn get_presentation_history(&self, key: &ContentKey) -> &[PresentationEntry] {
        self.presentations.history(key)
    }

    /// Every `PayloadLogged` event in commit order.
    pub fn events(&self) -> &[RegistryEvent] {
        self.emitter.journal()
    }

    pub fn chain_links(&self) -> &[ChainLink] {
        self.chain.links()
    }

    pub fn chain_head(&self) -> Option<&str> {
        self.chain.head()
    }

    pub fn last_commit_at(&self) -> Option<Timestamp> {
        self.chain.last_timestamp()
    }

    pub fn is_durable(&self) -> bool {
        self.store.is_some()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            payloads: self.payloads.len(),
            presentation_keys: self.presentations.key_count(),
            presentation_entries: self.presentations.entry_count(),
            events: self.emitter.journal().len(),
            chain_length: self.chain.len(),
            durable: self.is_durable(),
        }
    }

    /// Recompute the commit chain from the stored records.
    ///
    /// Also fails when records exist that no link covers, which is what a row
    /// inserted behind the registry's back looks like, and when the event
    /// journal does not match the payload commits one to one.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let report = self.chain.verify(|link| match link.kind {
            CommitKind::Payload => self
                .payloads
                .get(&link.key)
                .map(payload_entry_hash),
            CommitKind::Presentation => self
                .presentations
                .history(&link.key)
                .get(link.index as usize)
                .map(|entry| presentation_entry_hash(&link.key, link.index, entry)),
        });
        if !report.ok {
            return report;
        }

        if let Some(report) = self.verify_event_journal(report.links_checked) {
            return report;
        }

        let records = self.payloads.len() + self.presentations.entry_count();
        if records != self.chain.len() {
            return IntegrityReport::broken(
                report.links_checked,
                None,
                format!(
                    "{} records but {} chain links",
                    records,
                    self.chain.len()
                ),
            );
        }
        report
    }

    /// One `PayloadLogged` per payload link, in link order, carrying the
    /// stored record's key and `logged_at`.
    fn verify_event_journal(&self, links_checked: usize) -> Option<IntegrityReport> {
        let expected: Vec<(u64, RegistryEvent)> = self
            .chain
            .links()
            .iter()
            .filter(|link| link.kind == CommitKind::Payload)
            .filter_map(|link| {
                self.payloads.get(&link.key).map(|record| {
                    (
                        link.sequence,
                        RegistryEvent::PayloadLogged {
                            key: record.key,
                            timestamp: record.logged_at,
                        },
                    )
                })
            })
            .collect();
        let journal = self.emitter.journal();

        for (i, (sequence, event)) in expected.iter().enumerate() {
            match journal.get(i) {
                Some(found) if found == event => {}
                Some(found) => {
                    return Some(IntegrityReport::broken(
                        links_checked,
                        Some(*sequence),
                        format!(
                            "event {} is {} at {}, expected {} at {}",
                            i,
                            found.key(),
                            found.timestamp(),
                            event.key(),
                            event.timestamp()
                        ),
                    ))
                }
                None => {
                    return Some(IntegrityReport::broken(
                        links_checked,
                        Some(*sequence),
                        format!("event {} for {} is missing", i, event.key()),
                    ))
                }
            }
        }
        if journal.len() > expected.len() {
            return Some(IntegrityReport::broken(
                links_checked,
                None,
                format!(
                    "{} events but {} payload commits",
                    journal.len(),
                    expected.len()
                ),
            ));
        }
        None
    }
}

fn stale_error() -> RegistryError {
    RegistryError::Storage(format!(
        "registry database kept changing during {} commit attempts",
        MAX_COMMIT_ATTEMPTS
    ))
}
