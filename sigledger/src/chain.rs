//! Commit chain: tamper evidence over every committed write.
//!
//! Each commit appends a [`ChainLink`] whose `chain_hash` covers the previous
//! link and a digest of the committed record. Verification recomputes both
//! from the stored records, so any edit to a stored signature, timestamp or
//! presentation body breaks the chain at that link.

use crate::types::{ContentKey, PayloadRecord, PresentationEntry, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitKind {
    Payload,
    Presentation,
}

impl CommitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitKind::Payload => "payload",
            CommitKind::Presentation => "presentation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payload" => Some(CommitKind::Payload),
            "presentation" => Some(CommitKind::Presentation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub sequence: u64,
    pub kind: CommitKind,
    pub key: ContentKey,
    /// Position within the presentation history; always 0 for payloads.
    pub index: u64,
    pub timestamp: Timestamp,
    pub entry_hash: String,
    pub chain_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub ok: bool,
    pub links_checked: usize,
    pub first_broken: Option<u64>,
    pub reason: Option<String>,
}

impl IntegrityReport {
    fn intact(links_checked: usize) -> Self {
        Self {
            ok: true,
            links_checked,
            first_broken: None,
            reason: None,
        }
    }

    pub(crate) fn broken(links_checked: usize, at: Option<u64>, reason: String) -> Self {
        Self {
            ok: false,
            links_checked,
            first_broken: at,
            reason: Some(reason),
        }
    }
}

pub fn payload_entry_hash(record: &PayloadRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(CommitKind::Payload.as_str().as_bytes());
    hasher.update(record.key.as_bytes());
    hasher.update((record.signature.len() as u64).to_be_bytes());
    hasher.update(record.signature.as_bytes());
    hasher.update(record.logged_at.to_be_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn presentation_entry_hash(key: &ContentKey, index: u64, entry: &PresentationEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(CommitKind::Presentation.as_str().as_bytes());
    hasher.update(key.as_bytes());
    hasher.update(index.to_be_bytes());
    hasher.update((entry.json_string.len() as u64).to_be_bytes());
    hasher.update(entry.json_string.as_bytes());
    hasher.update(entry.timestamp.to_be_bytes());
    format!("{:x}", hasher.finalize())
}

fn link_hash(prev: Option<&str>, entry_hash: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev {
        hasher.update(prev.as_bytes());
    }
    hasher.update(entry_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
pub struct CommitChain {
    links: Vec<ChainLink>,
}

impl CommitChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the link the next commit would append. Nothing is mutated.
    pub fn next_link(
        &self,
        kind: CommitKind,
        key: ContentKey,
        index: u64,
        timestamp: Timestamp,
        entry_hash: String,
    ) -> ChainLink {
        let chain_hash = link_hash(self.head(), &entry_hash);
        ChainLink {
            sequence: self.links.len() as u64,
            kind,
            key,
            index,
            timestamp,
            entry_hash,
            chain_hash,
        }
    }

    pub(crate) fn push(&mut self, link: ChainLink) {
        self.links.push(link);
    }

    pub fn head(&self) -> Option<&str> {
        self.links.last().map(|l| l.chain_hash.as_str())
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.links.last().map(|l| l.timestamp)
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Walk the chain, recomputing each entry hash with `resolve`.
    ///
    /// `resolve` returns `None` when the record a link points at no longer
    /// exists.
    pub fn verify<F>(&self, resolve: F) -> IntegrityReport
    where
        F: Fn(&ChainLink) -> Option<String>,
    {
        let mut prev: Option<&str> = None;
        for (i, link) in self.links.iter().enumerate() {
            if link.sequence != i as u64 {
                return IntegrityReport::broken(
                    i,
                    Some(i as u64),
                    format!("sequence {} found at position {}", link.sequence, i),
                );
            }
            let recomputed = match resolve(link) {
                Some(hash) => hash,
                None => {
                    return IntegrityReport::broken(
                        i,
                        Some(link.sequence),
                        format!("{} record {} is missing", link.kind.as_str(), link.key),
                    )
                }
            };
            if recomputed != link.entry_hash {
                return IntegrityReport::broken(
                    i,
                    Some(link.sequence),
                    format!("{} record {} does not match its digest", link.kind.as_str(), link.key),
                );
            }
            if link_hash(prev, &link.entry_hash) != link.chain_hash {
                return IntegrityReport::broken(
                    i,
                    Some(link.sequence),
                    "chain hash does not cover the previous link".to_string(),
                );
            }
            prev = Some(link.chain_hash.as_str());
        }
        IntegrityReport::intact(self.links.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signature;
    use std::collections::HashMap;

    fn record(n: u8, ts: Timestamp) -> PayloadRecord {
        PayloadRecord {
            key: ContentKey::from_bytes([n; 32]),
            signature: Signature::new(vec![n; 65]),
            logged_at: ts,
        }
    }

    fn build(records: &[PayloadRecord]) -> CommitChain {
        let mut chain = CommitChain::new();
        for r in records {
            let link = chain.next_link(
                CommitKind::Payload,
                r.key,
                0,
                r.logged_at,
                payload_entry_hash(r),
            );
            chain.push(link);
        }
        chain
    }

    fn resolver(records: &[PayloadRecord]) -> impl Fn(&ChainLink) -> Option<String> {
        let by_key: HashMap<ContentKey, PayloadRecord> =
            records.iter().map(|r| (r.key, r.clone())).collect();
        move |link| by_key.get(&link.key).map(payload_entry_hash)
    }

    #[test]
    fn intact_chain_verifies() {
        let records = vec![record(1, 10), record(2, 11), record(3, 11)];
        let chain = build(&records);
        let report = chain.verify(resolver(&records));
        assert!(report.ok);
        assert_eq!(report.links_checked, 3);
        assert_eq!(chain.last_timestamp(), Some(11));
        assert_eq!(chain.head(), chain.links().last().map(|l| l.chain_hash.as_str()));
    }

    #[test]
    fn tampered_record_breaks_chain_at_its_link() {
        let records = vec![record(1, 10), record(2, 11), record(3, 12)];
        let chain = build(&records);

        let mut tampered = records.clone();
        tampered[1].signature = Signature::new(vec![0xff; 65]);
        let report = chain.verify(resolver(&tampered));
        assert!(!report.ok);
        assert_eq!(report.first_broken, Some(1));
        assert_eq!(report.links_checked, 1);
    }

    #[test]
    fn missing_record_is_reported() {
        let records = vec![record(1, 10), record(2, 11)];
        let chain = build(&records);
        let report = chain.verify(resolver(&records[..1]));
        assert_eq!(report.first_broken, Some(1));
        assert!(report.reason.unwrap().contains("missing"));
    }

    #[test]
    fn presentation_hash_depends_on_position() {
        let key = ContentKey::digest("p");
        let entry = PresentationEntry {
            json_string: "{}".into(),
            timestamp: 1,
        };
        assert_ne!(
            presentation_entry_hash(&key, 0, &entry),
            presentation_entry_hash(&key, 1, &entry)
        );
    }

    #[test]
    fn commit_kind_roundtrips_as_str() {
        for kind in [CommitKind::Payload, CommitKind::Presentation] {
            assert_eq!(CommitKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(CommitKind::parse("other"), None);
    }
}
