//! SQLite-backed registry: persistence across reopen, owner binding and
//! tamper detection.

use pretty_assertions::assert_eq;
use rusqlite::{params, Connection};
use sigledger::config::{EventsConfig, StorageConfig};
use sigledger::{
    CallContext, ContentKey, Identity, Registry, RegistryConfig, RegistryError, RegistryEvent,
    Signature,
};
use tempfile::tempdir;

const OWNER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

fn sig(byte: u8) -> Signature {
    Signature::new(vec![byte; 65])
}

#[test]
fn state_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("registry.db");
    let payload = ContentKey::digest("0x1234");
    let presentation = ContentKey::digest("presentationKey");

    {
        let mut registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
        assert!(registry.is_durable());
        registry
            .log_payload(&CallContext::new(OWNER, 10), payload, sig(0xab))
            .unwrap();
        registry
            .log_presentation(&CallContext::new(OWNER, 11), presentation, "First")
            .unwrap();
        registry
            .log_presentation(&CallContext::new(OWNER, 12), presentation, "Second")
            .unwrap();
    }

    let registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
    assert_eq!(registry.get_payload_info(&payload).unwrap().signature, sig(0xab));
    let history: Vec<_> = registry
        .get_presentation_history(&presentation)
        .iter()
        .map(|e| (e.json_string.as_str(), e.timestamp))
        .collect();
    assert_eq!(history, vec![("First", 11), ("Second", 12)]);
    assert_eq!(
        registry.events(),
        &[RegistryEvent::PayloadLogged {
            key: payload,
            timestamp: 10
        }]
    );
    assert_eq!(registry.chain_links().len(), 3);
    assert!(registry.verify_integrity().ok);
    assert_eq!(registry.last_commit_at(), Some(12));
}

#[test]
fn duplicate_is_rejected_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let key = ContentKey::digest("once");

    {
        let mut registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
        registry
            .log_payload(&CallContext::new(OWNER, 1), key, sig(1))
            .unwrap();
    }

    let mut registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
    let err = registry
        .log_payload(&CallContext::new(OWNER, 2), key, sig(2))
        .unwrap_err();
    assert_eq!(err, RegistryError::AlreadyLogged { key });
    assert_eq!(registry.events().len(), 1);
}

#[test]
fn reopening_with_another_owner_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.db");
    drop(Registry::open_db(&path, Identity::from(OWNER)).unwrap());

    let err = Registry::open_db(&path, Identity::from("0xsomeoneelse")).unwrap_err();
    assert_eq!(
        err,
        RegistryError::OwnerMismatch {
            stored: Identity::from(OWNER),
            requested: Identity::from("0xsomeoneelse"),
        }
    );

    // Case differences in the owner are not a mismatch.
    assert!(Registry::open_db(&path, Identity::from(&OWNER.to_uppercase()[..])).is_ok());
}

#[test]
fn edited_row_is_detected_on_verify() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let key = ContentKey::digest("presentationKey");

    {
        let mut registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
        registry
            .log_presentation(&CallContext::new(OWNER, 1), key, "First")
            .unwrap();
        registry
            .log_presentation(&CallContext::new(OWNER, 2), key, "Second")
            .unwrap();
    }

    {
        let conn = Connection::open(&path).unwrap();
        let changed = conn
            .execute(
                "UPDATE presentations SET json_string = ?1 WHERE key = ?2 AND position = 0",
                params!["Forged", key.to_hex()],
            )
            .unwrap();
        assert_eq!(changed, 1);
    }

    // The registry still opens so the damage can be inspected.
    let registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
    assert_eq!(registry.get_presentation_history(&key)[0].json_string, "Forged");
    let report = registry.verify_integrity();
    assert!(!report.ok);
    assert_eq!(report.first_broken, Some(0));
}

#[test]
fn edited_event_timestamp_is_detected_on_verify() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let key = ContentKey::digest("a");

    {
        let mut registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
        registry
            .log_payload(&CallContext::new(OWNER, 10), key, sig(1))
            .unwrap();
    }

    {
        let conn = Connection::open(&path).unwrap();
        conn.execute("UPDATE payload_events SET timestamp = 999", [])
            .unwrap();
    }

    let registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
    assert_eq!(registry.get_payload_info(&key).unwrap().logged_at, 10);
    let report = registry.verify_integrity();
    assert!(!report.ok);
    assert_eq!(report.first_broken, Some(0));
}

#[test]
fn forged_event_row_is_detected_on_verify() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.db");

    {
        let mut registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
        registry
            .log_payload(&CallContext::new(OWNER, 10), ContentKey::digest("a"), sig(1))
            .unwrap();
    }

    {
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO payload_events (event, key, timestamp) VALUES (?1, ?2, ?3)",
            params!["PayloadLogged", ContentKey::digest("forged").to_hex(), 5i64],
        )
        .unwrap();
    }

    let registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
    assert_eq!(registry.events().len(), 2);
    let report = registry.verify_integrity();
    assert!(!report.ok);
    assert!(report.reason.unwrap().contains("2 events but 1 payload commits"));
}

#[test]
fn stale_handle_sees_duplicates_and_keeps_writing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let mut first = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
    let mut second = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
    let key = ContentKey::digest("shared");

    first
        .log_payload(&CallContext::new(OWNER, 1), key, sig(1))
        .unwrap();

    let err = second
        .log_payload(&CallContext::new(OWNER, 2), key, sig(2))
        .unwrap_err();
    assert_eq!(err, RegistryError::AlreadyLogged { key });
    assert_eq!(second.get_payload_info(&key).unwrap().signature, sig(1));

    let fresh = ContentKey::digest("fresh");
    second
        .log_payload(&CallContext::new(OWNER, 3), fresh, sig(3))
        .unwrap();
    second
        .log_presentation(&CallContext::new(OWNER, 4), fresh, "{}")
        .unwrap();

    // The first handle picks up the other writes before its next commit.
    first
        .log_presentation(&CallContext::new(OWNER, 5), fresh, "{\"v\":2}")
        .unwrap();
    assert_eq!(first.get_presentation_history(&fresh).len(), 2);
    assert_eq!(first.chain_links().len(), 4);
    assert!(first.verify_integrity().ok);

    drop((first, second));
    let reopened = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
    assert_eq!(reopened.events().len(), 2);
    assert!(reopened.verify_integrity().ok);
}

#[test]
fn refresh_reports_whether_anything_changed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let mut reader = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
    let mut writer = Registry::open_db(&path, Identity::from(OWNER)).unwrap();

    assert!(!reader.refresh().unwrap());
    writer
        .log_payload(&CallContext::new(OWNER, 1), ContentKey::digest("k"), sig(1))
        .unwrap();
    assert!(reader.refresh().unwrap());
    assert!(reader.get_payload_info(&ContentKey::digest("k")).is_some());
    assert!(!Registry::new(Identity::from(OWNER)).refresh().unwrap());
}

#[test]
fn row_inserted_behind_the_registry_is_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("registry.db");

    {
        let mut registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
        registry
            .log_payload(&CallContext::new(OWNER, 1), ContentKey::digest("a"), sig(1))
            .unwrap();
    }

    {
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO payloads (key, signature, logged_at) VALUES (?1, ?2, ?3)",
            params![ContentKey::digest("b").to_hex(), vec![2u8; 65], 2i64],
        )
        .unwrap();
    }

    let registry = Registry::open_db(&path, Identity::from(OWNER)).unwrap();
    assert!(!registry.verify_integrity().ok);
}

#[test]
fn from_config_opens_configured_database() {
    let dir = tempdir().unwrap();
    let config = RegistryConfig {
        owner: OWNER.into(),
        storage: StorageConfig {
            db_path: Some(dir.path().join("configured.db")),
        },
        events: EventsConfig { trace: false },
        ..Default::default()
    };

    let mut registry = Registry::from_config(&config).unwrap();
    assert!(registry.is_durable());
    registry
        .log_payload(&CallContext::new(OWNER, 3), ContentKey::digest("c"), sig(3))
        .unwrap();
    drop(registry);

    let registry = Registry::from_config(&config).unwrap();
    assert_eq!(registry.stats().payloads, 1);
}

#[test]
fn from_config_requires_owner() {
    let err = Registry::from_config(&RegistryConfig::default()).unwrap_err();
    assert!(matches!(err, RegistryError::InvalidInput(_)));
}
