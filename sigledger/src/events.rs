//! Write notifications.
//!
//! Every successful payload write produces one [`RegistryEvent`], delivered
//! synchronously after commit to each registered sink and appended to the
//! emitter's journal. The journal is what external consumers replay to
//! reconstruct write history without querying the stores.

use crate::types::{ContentKey, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RegistryEvent {
    PayloadLogged { key: ContentKey, timestamp: Timestamp },
}

impl RegistryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::PayloadLogged { .. } => "PayloadLogged",
        }
    }

    pub fn key(&self) -> &ContentKey {
        match self {
            RegistryEvent::PayloadLogged { key, .. } => key,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            RegistryEvent::PayloadLogged { timestamp, .. } => *timestamp,
        }
    }
}

/// Observer of committed writes.
pub trait RegistryEventSink: Send + Sync + Debug {
    fn on_event(&self, event: &RegistryEvent);
}

/// Shared in-memory capture of events. Clones observe the same buffer.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    inner: Arc<Mutex<Vec<RegistryEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<RegistryEvent> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RegistryEventSink for EventLog {
    fn on_event(&self, event: &RegistryEvent) {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Emits one structured `tracing` line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl RegistryEventSink for TracingEventSink {
    fn on_event(&self, event: &RegistryEvent) {
        info!(
            event = event.name(),
            key = %event.key(),
            timestamp = event.timestamp(),
            "registry event"
        );
    }
}

#[derive(Debug, Default)]
pub struct EventEmitter {
    sinks: Vec<Arc<dyn RegistryEventSink>>,
    journal: Vec<RegistryEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_sink(&mut self, sink: Arc<dyn RegistryEventSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Journal the event and notify sinks in registration order.
    pub(crate) fn emit(&mut self, event: RegistryEvent) {
        for sink in &self.sinks {
            sink.on_event(&event);
        }
        self.journal.push(event);
    }

    /// Refill the journal from durable storage without notifying sinks.
    pub(crate) fn restore(&mut self, events: Vec<RegistryEvent>) {
        self.journal = events;
    }

    pub fn journal(&self) -> &[RegistryEvent] {
        &self.journal
    }
}
