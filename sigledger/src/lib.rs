// sigledger Library
// Owner-gated signature registry with append-only presentation history

//! A tamper-evident registry of signatures and presentation payloads.
//!
//! - [`PayloadRegistry`]: write-once signature records keyed by content hash.
//! - [`PresentationLedger`]: append-only revision history per presentation key.
//! - [`AccessGate`]: the single owner allowed to write.
//! - [`EventEmitter`]: `PayloadLogged` notifications for every payload write.
//!
//! [`Registry`] composes them, chains every commit for tamper evidence and
//! optionally persists to SQLite.

pub mod access;
pub mod chain;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod payload;
pub mod presentation;
pub mod registry;
pub mod store;
pub mod types;

pub use crate::access::AccessGate;
pub use crate::chain::{ChainLink, CommitKind, IntegrityReport};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{ConfigError, RegistryConfig};
pub use crate::error::{AuthError, KeyParseError, RegistryError, RegistryResult};
pub use crate::events::{
    EventEmitter, EventLog, RegistryEvent, RegistryEventSink, TracingEventSink,
};
pub use crate::payload::PayloadRegistry;
pub use crate::presentation::PresentationLedger;
pub use crate::registry::{Registry, RegistryStats};
pub use crate::types::{
    CallContext, ContentKey, Identity, PayloadRecord, PresentationEntry, Signature, Timestamp,
};
