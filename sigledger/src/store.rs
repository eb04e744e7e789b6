//! SQLite-backed durable state.
//!
//! The registry keeps its working set in memory; this store is the copy that
//! survives restarts. Every commit writes its rows (record, chain link and,
//! for payloads, the event) inside a single transaction, so a failed write
//! leaves no partial state behind.

use crate::chain::{ChainLink, CommitKind};
use crate::error::{RegistryError, RegistryResult};
use crate::events::RegistryEvent;
use crate::types::{ContentKey, Identity, PayloadRecord, PresentationEntry, Signature};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

// ---------------------------------------------------------------------------
// SQLite helpers
// ---------------------------------------------------------------------------

/// `rusqlite::Connection` is `Send` but not `Sync`; the mutex makes the store
/// (and therefore the registry) shareable behind an `RwLock`.
struct DbConn(Mutex<Connection>);

impl std::fmt::Debug for DbConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbConn(<sqlite>)")
    }
}

const CREATE_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS registry_meta (
    name        TEXT PRIMARY KEY,
    value       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS payloads (
    key         TEXT    PRIMARY KEY,
    signature   BLOB    NOT NULL,
    logged_at   INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS presentations (
    key         TEXT    NOT NULL,
    position    INTEGER NOT NULL,
    json_string TEXT    NOT NULL,
    timestamp   INTEGER NOT NULL,
    PRIMARY KEY (key, position)
);
CREATE TABLE IF NOT EXISTS commit_chain (
    sequence    INTEGER PRIMARY KEY,
    kind        TEXT    NOT NULL,
    key         TEXT    NOT NULL,
    position    INTEGER NOT NULL,
    timestamp   INTEGER NOT NULL,
    entry_hash  TEXT    NOT NULL,
    chain_hash  TEXT    NOT NULL
);
CREATE TABLE IF NOT EXISTS payload_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    event       TEXT    NOT NULL,
    key         TEXT    NOT NULL,
    timestamp   INTEGER NOT NULL
);
";

const OWNER_META: &str = "owner";

fn decode_key(raw: &str) -> RegistryResult<ContentKey> {
    raw.parse()
        .map_err(|e| RegistryError::Corrupted(format!("stored key '{}': {}", raw, e)))
}

fn lock_err<E: std::fmt::Display>(e: E) -> RegistryError {
    RegistryError::Storage(format!("Failed to acquire SQLite lock: {}", e))
}

/// Everything persisted, in commit order where order matters.
#[derive(Debug, Default)]
pub struct StoredState {
    pub payloads: Vec<PayloadRecord>,
    /// `(key, position, entry)` ordered by key then position.
    pub presentations: Vec<(ContentKey, u64, PresentationEntry)>,
    pub links: Vec<ChainLink>,
    pub events: Vec<RegistryEvent>,
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Result of a commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Another handle extended the chain since this view was loaded. Nothing
    /// was written.
    Stale,
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: DbConn,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> RegistryResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RegistryError::Storage(format!("Failed to create registry db dir: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch(CREATE_SCHEMA_SQL)?;

        info!(path = %path.display(), "opened registry database");

        Ok(Self {
            conn: DbConn(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stored_owner(&self) -> RegistryResult<Option<Identity>> {
        let conn = self.conn.0.lock().map_err(lock_err)?;
        let owner: Option<String> = conn
            .query_row(
                "SELECT value FROM registry_meta WHERE name = ?1",
                params![OWNER_META],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner.map(Identity::from))
    }

    /// Record `owner` for a fresh database, or confirm it matches the owner
    /// already stored.
    pub fn claim_owner(&self, owner: &Identity) -> RegistryResult<()> {
        match self.stored_owner()? {
            Some(stored) if stored == *owner => Ok(()),
            Some(stored) => Err(RegistryError::OwnerMismatch {
                stored,
                requested: owner.clone(),
            }),
            None => {
                let conn = self.conn.0.lock().map_err(lock_err)?;
                conn.execute(
                    "INSERT INTO registry_meta (name, value) VALUES (?1, ?2)",
                    params![OWNER_META, owner.as_str()],
                )?;
                Ok(())
            }
        }
    }

    pub fn load(&self) -> RegistryResult<StoredState> {
        let conn = self.conn.0.lock().map_err(lock_err)?;
        Ok(StoredState {
            payloads: load_payloads(&conn)?,
            presentations: load_presentations(&conn)?,
            links: load_links(&conn)?,
            events: load_events(&conn)?,
        })
    }

    /// Sequence and chain hash of the last stored link.
    pub fn chain_tail(&self) -> RegistryResult<Option<(u64, String)>> {
        let conn = self.conn.0.lock().map_err(lock_err)?;
        read_tail(&conn)
    }

    /// Write a payload record, its chain link and its event in one
    /// `IMMEDIATE` transaction.
    ///
    /// `expected_head` is the chain hash `link` was computed against. If the
    /// stored tail differs, nothing is written and [`CommitOutcome::Stale`]
    /// is returned. A stored row for the key fails with `AlreadyLogged`.
    pub fn commit_payload(
        &self,
        record: &PayloadRecord,
        link: &ChainLink,
        expected_head: Option<&str>,
        event: &RegistryEvent,
    ) -> RegistryResult<CommitOutcome> {
        let mut conn = self.conn.0.lock().map_err(lock_err)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !tail_matches(&tx, link, expected_head)? {
            return Ok(CommitOutcome::Stale);
        }

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM payloads WHERE key = ?1)",
            params![record.key.to_hex()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(RegistryError::AlreadyLogged { key: record.key });
        }

        tx.execute(
            "INSERT INTO payloads (key, signature, logged_at) VALUES (?1, ?2, ?3)",
            params![
                record.key.to_hex(),
                record.signature.as_bytes(),
                record.logged_at as i64
            ],
        )?;
        insert_link(&tx, link)?;
        tx.execute(
            "INSERT INTO payload_events (event, key, timestamp) VALUES (?1, ?2, ?3)",
            params![
                event.name(),
                event.key().to_hex(),
                event.timestamp() as i64
            ],
        )?;
        tx.commit()?;
        Ok(CommitOutcome::Committed)
    }

    /// Append a presentation entry and its chain link in one `IMMEDIATE`
    /// transaction. Staleness is detected as in
    /// [`commit_payload`](Self::commit_payload).
    pub fn commit_presentation(
        &self,
        key: &ContentKey,
        position: u64,
        entry: &PresentationEntry,
        link: &ChainLink,
        expected_head: Option<&str>,
    ) -> RegistryResult<CommitOutcome> {
        let mut conn = self.conn.0.lock().map_err(lock_err)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !tail_matches(&tx, link, expected_head)? {
            return Ok(CommitOutcome::Stale);
        }

        tx.execute(
            "INSERT INTO presentations (key, position, json_string, timestamp) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key.to_hex(),
                position as i64,
                entry.json_string,
                entry.timestamp as i64
            ],
        )?;
        insert_link(&tx, link)?;
        tx.commit()?;
        Ok(CommitOutcome::Committed)
    }
}

fn read_tail(conn: &Connection) -> RegistryResult<Option<(u64, String)>> {
    let tail = conn
        .query_row(
            "SELECT sequence, chain_hash FROM commit_chain ORDER BY sequence DESC LIMIT 1",
            [],
            |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?)),
        )
        .optional()?;
    Ok(tail)
}

/// Whether `link` extends the stored chain directly.
fn tail_matches(
    conn: &Connection,
    link: &ChainLink,
    expected_head: Option<&str>,
) -> RegistryResult<bool> {
    Ok(match read_tail(conn)? {
        None => link.sequence == 0 && expected_head.is_none(),
        Some((sequence, hash)) => {
            sequence + 1 == link.sequence && expected_head == Some(hash.as_str())
        }
    })
}

fn insert_link(conn: &Connection, link: &ChainLink) -> RegistryResult<()> {
    conn.execute(
        "INSERT INTO commit_chain \
         (sequence, kind, key, position, timestamp, entry_hash, chain_hash) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            link.sequence as i64,
            link.kind.as_str(),
            link.key.to_hex(),
            link.index as i64,
            link.timestamp as i64,
            link.entry_hash,
            link.chain_hash,
        ],
    )?;
    Ok(())
}

fn load_payloads(conn: &Connection) -> RegistryResult<Vec<PayloadRecord>> {
    let mut stmt = conn.prepare("SELECT key, signature, logged_at FROM payloads")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .and_then(|mapped| mapped.collect::<Result<Vec<_>, _>>())?;

    rows.into_iter()
        .map(|(key, signature, logged_at)| -> RegistryResult<PayloadRecord> {
            Ok(PayloadRecord {
                key: decode_key(&key)?,
                signature: Signature::new(signature),
                logged_at: logged_at as u64,
            })
        })
        .collect()
}

fn load_presentations(
    conn: &Connection,
) -> RegistryResult<Vec<(ContentKey, u64, PresentationEntry)>> {
    let mut stmt = conn.prepare(
        "SELECT key, position, json_string, timestamp FROM presentations \
         ORDER BY key ASC, position ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .and_then(|mapped| mapped.collect::<Result<Vec<_>, _>>())?;

    rows.into_iter()
        .map(
            |(key, position, json_string, timestamp)| -> RegistryResult<(ContentKey, u64, PresentationEntry)> {
                Ok((
                    decode_key(&key)?,
                    position as u64,
                    PresentationEntry {
                        json_string,
                        timestamp: timestamp as u64,
                    },
                ))
            },
        )
        .collect()
}

fn load_links(conn: &Connection) -> RegistryResult<Vec<ChainLink>> {
    let mut stmt = conn.prepare(
        "SELECT sequence, kind, key, position, timestamp, entry_hash, chain_hash \
         FROM commit_chain ORDER BY sequence ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .and_then(|mapped| mapped.collect::<Result<Vec<_>, _>>())?;

    rows.into_iter()
        .map(
            |(sequence, kind, key, position, timestamp, entry_hash, chain_hash)| -> RegistryResult<ChainLink> {
                let kind = CommitKind::parse(&kind).ok_or_else(|| {
                    RegistryError::Corrupted(format!("unknown commit kind '{}'", kind))
                })?;
                Ok(ChainLink {
                    sequence: sequence as u64,
                    kind,
                    key: decode_key(&key)?,
                    index: position as u64,
                    timestamp: timestamp as u64,
                    entry_hash,
                    chain_hash,
                })
            },
        )
        .collect()
}

fn load_events(conn: &Connection) -> RegistryResult<Vec<RegistryEvent>> {
    let mut stmt =
        conn.prepare("SELECT event, key, timestamp FROM payload_events ORDER BY id ASC")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .and_then(|mapped| mapped.collect::<Result<Vec<_>, _>>())?;

    rows.into_iter()
        .map(|(event, key, timestamp)| -> RegistryResult<RegistryEvent> {
            match event.as_str() {
                "PayloadLogged" => Ok(RegistryEvent::PayloadLogged {
                    key: decode_key(&key)?,
                    timestamp: timestamp as u64,
                }),
                other => Err(RegistryError::Corrupted(format!("unknown event '{}'", other))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{payload_entry_hash, CommitChain};
    use tempfile::tempdir;

    #[test]
    fn owner_is_claimed_once() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("reg.db")).unwrap();
        assert_eq!(store.stored_owner().unwrap(), None);

        let owner = Identity::from("0xowner");
        store.claim_owner(&owner).unwrap();
        store.claim_owner(&owner).unwrap();

        let err = store.claim_owner(&Identity::from("0xother")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::OwnerMismatch {
                stored: owner,
                requested: Identity::from("0xother"),
            }
        );
    }

    #[test]
    fn committed_payload_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("reg.db");
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), path.as_path());

        let record = PayloadRecord {
            key: ContentKey::digest(b"payload"),
            signature: Signature::new(vec![0xab; 65]),
            logged_at: 1_700_000_000,
        };
        let link = CommitChain::new().next_link(
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
        assert_eq!(
            store.commit_payload(&record, &link, None, &event).unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(
            store.chain_tail().unwrap(),
            Some((0, link.chain_hash.clone()))
        );

        let state = store.load().unwrap();
        assert_eq!(state.payloads, vec![record]);
        assert_eq!(state.links, vec![link]);
        assert_eq!(state.events, vec![event]);
        assert!(state.presentations.is_empty());
    }

    #[test]
    fn duplicate_payload_row_is_already_logged() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("reg.db")).unwrap();
        let record = PayloadRecord {
            key: ContentKey::digest(b"payload"),
            signature: Signature::new(vec![1]),
            logged_at: 5,
        };
        let mut chain = CommitChain::new();
        let link = chain.next_link(CommitKind::Payload, record.key, 0, 5, payload_entry_hash(&record));
        let event = RegistryEvent::PayloadLogged {
            key: record.key,
            timestamp: 5,
        };
        store.commit_payload(&record, &link, None, &event).unwrap();
        chain.push(link);

        let second = chain.next_link(CommitKind::Payload, record.key, 0, 6, payload_entry_hash(&record));
        assert_eq!(
            store.commit_payload(&record, &second, chain.head(), &event),
            Err(RegistryError::AlreadyLogged { key: record.key })
        );

        let state = store.load().unwrap();
        assert_eq!(state.links.len(), 1);
        assert_eq!(state.events.len(), 1);
    }

    #[test]
    fn commit_against_an_old_head_is_stale() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("reg.db")).unwrap();
        let entry = PresentationEntry {
            json_string: "{}".into(),
            timestamp: 1,
        };
        let key = ContentKey::digest(b"p");
        let chain = CommitChain::new();
        let link = chain.next_link(
            CommitKind::Presentation,
            key,
            0,
            1,
            crate::chain::presentation_entry_hash(&key, 0, &entry),
        );
        store
            .commit_presentation(&key, 0, &entry, &link, None)
            .unwrap();

        // A second view that never saw the first commit.
        assert_eq!(
            store
                .commit_presentation(&key, 0, &entry, &link, None)
                .unwrap(),
            CommitOutcome::Stale
        );
        assert_eq!(store.load().unwrap().links.len(), 1);
    }
}
