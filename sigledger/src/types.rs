//! Core value types: identities, content keys, signatures and stored records.

use crate::error::KeyParseError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Seconds since the Unix epoch, as assigned by the environment at commit time.
pub type Timestamp = u64;

/// Width of a content key in bytes.
pub const KEY_LEN: usize = 32;

fn strip_hex_prefix(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

fn is_hex_address(s: &str) -> bool {
    match s.get(..2) {
        Some("0x") | Some("0X") => {
            s.len() > 2 && s[2..].bytes().all(|b| b.is_ascii_hexdigit())
        }
        _ => false,
    }
}

/// Caller or owner identity.
///
/// Identities are opaque to the registry and compared exactly after trimming.
/// `0x`-prefixed hex addresses are the one exception: they are lowercased so
/// that checksummed and plain forms of the same address compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        if is_hex_address(raw) {
            Self(raw.to_ascii_lowercase())
        } else {
            Self(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ContentKey
// ---------------------------------------------------------------------------

/// Fixed-width content identifier used as the key of both stores.
///
/// The all-zero key is representable (it is what `Default` yields) but is
/// reserved: payload writes reject it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ContentKey([u8; KEY_LEN]);

impl ContentKey {
    pub const ZERO: ContentKey = ContentKey([0u8; KEY_LEN]);

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive a key from arbitrary content with SHA-256.
    pub fn digest(data: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data.as_ref());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for ContentKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(strip_hex_prefix(s))?;
        let arr: [u8; KEY_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| KeyParseError::WrongLength {
                    expected: KEY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }
}

impl TryFrom<String> for ContentKey {
    type Error = KeyParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ContentKey> for String {
    fn from(key: ContentKey) -> Self {
        key.to_hex()
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Variable-length signature blob. The registry never interprets its bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl FromStr for Signature {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(hex::decode(strip_hex_prefix(s))?))
    }
}

impl TryFrom<String> for Signature {
    type Error = KeyParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        sig.to_hex()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A logged signature. Created once, never mutated.
///
/// `PayloadRecord::default()` is the empty view (zero key, empty signature,
/// zero timestamp) for callers that detect presence by inspecting fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadRecord {
    pub key: ContentKey,
    pub signature: Signature,
    pub logged_at: Timestamp,
}

/// One revision of a presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationEntry {
    pub json_string: String,
    pub timestamp: Timestamp,
}

/// Environment inputs for a single call: who is calling and the commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Identity,
    pub timestamp: Timestamp,
}

impl CallContext {
    pub fn new(caller: impl Into<Identity>, timestamp: Timestamp) -> Self {
        Self {
            caller: caller.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identity_is_case_insensitive() {
        let a = Identity::from("0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let b = Identity::from("  0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266 ");
        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert!(Identity::from("   ").is_empty());
    }

    #[test]
    fn non_address_identities_keep_their_case() {
        assert_ne!(Identity::from("Alice"), Identity::from("alice"));
        assert_eq!(Identity::from(" Alice ").as_str(), "Alice");
        // Not hex after the prefix, so not treated as an address.
        assert_ne!(Identity::from("0xOwner"), Identity::from("0xowner"));
        assert_eq!(Identity::from("0XABCDEF").as_str(), "0xabcdef");
    }

    #[test]
    fn content_key_parses_with_and_without_prefix() {
        let hex64 = "11".repeat(32);
        let with: ContentKey = format!("0x{}", hex64).parse().unwrap();
        let without: ContentKey = hex64.parse().unwrap();
        assert_eq!(with, without);
        assert_eq!(with.to_hex(), format!("0x{}", hex64));
    }

    #[test]
    fn content_key_rejects_wrong_width() {
        let err = "0x1234".parse::<ContentKey>().unwrap_err();
        assert_eq!(
            err,
            KeyParseError::WrongLength {
                expected: 32,
                actual: 2
            }
        );
        assert!(matches!(
            "0xzz".parse::<ContentKey>(),
            Err(KeyParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn zero_key_is_detected() {
        let zero: ContentKey = format!("0x{}", "0".repeat(64)).parse().unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, ContentKey::ZERO);
        assert_eq!(ContentKey::default(), ContentKey::ZERO);
        assert!(!ContentKey::digest(b"0x1234").is_zero());
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(
            ContentKey::digest("presentationKey"),
            ContentKey::digest("presentationKey")
        );
        assert_ne!(ContentKey::digest("a"), ContentKey::digest("b"));
    }

    #[test]
    fn signature_hex_roundtrip_through_serde() {
        let raw = format!("0x{}ab", "abcdef1234567890".repeat(8));
        let sig: Signature = raw.parse().unwrap();
        assert_eq!(sig.len(), 65);
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{}\"", raw));
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn odd_length_signature_is_rejected() {
        assert!("0xabc".parse::<Signature>().is_err());
    }
}
