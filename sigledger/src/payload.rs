//! Write-once signature store keyed by content hash.

use crate::access::AccessGate;
use crate::error::{RegistryError, RegistryResult};
use crate::types::{CallContext, ContentKey, PayloadRecord, Signature};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct PayloadRegistry {
    records: HashMap<ContentKey, PayloadRecord>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every precondition of a payload write and build the record that
    /// would be committed. Nothing is mutated.
    ///
    /// Checks run in order: owner, reserved zero key, duplicate key.
    pub fn prepare(
        &self,
        gate: &AccessGate,
        ctx: &CallContext,
        key: ContentKey,
        signature: Signature,
    ) -> RegistryResult<PayloadRecord> {
        gate.authorize(&ctx.caller)?;

        if key.is_zero() {
            return Err(RegistryError::InvalidInput(
                "payload key must not be the all-zero identifier".to_string(),
            ));
        }

        if self.records.contains_key(&key) {
            return Err(RegistryError::AlreadyLogged { key });
        }

        Ok(PayloadRecord {
            key,
            signature,
            logged_at: ctx.timestamp,
        })
    }

    /// Store a prepared record. Refuses to replace an existing one.
    pub(crate) fn insert(&mut self, record: PayloadRecord) -> RegistryResult<()> {
        if self.records.contains_key(&record.key) {
            return Err(RegistryError::AlreadyLogged { key: record.key });
        }
        self.records.insert(record.key, record);
        Ok(())
    }

    pub fn get(&self, key: &ContentKey) -> Option<&PayloadRecord> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &ContentKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
