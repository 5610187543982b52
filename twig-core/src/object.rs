//! Core object model for twig
//!
//! Implements content-addressable storage with Blob and Commit objects.
//! A blob's id is the SHA-256 of its bytes; a commit's id is the SHA-256 of
//! its canonical bincode encoding, which covers every field except the id.

use crate::error::{Result, TwigError};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Length of the abbreviated ids shown in merge log lines
pub const SHORT_ID_LEN: usize = 7;

/// Message of the root commit created by `init`
pub const ROOT_MESSAGE: &str = "initial commit";

/// Format of commit timestamps, e.g. `Thu Jan 1 00:00:00 1970 +0000`
pub const TIMESTAMP_FORMAT: &str = "%a %b %-d %H:%M:%S %Y %z";

/// Tracked path → blob id, ordered so encoding is deterministic
pub type Snapshot = BTreeMap<String, ObjectId>;

/// Unique identifier for any stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute ObjectId from data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hexadecimal string
    pub fn from_hex(hex_str: &str) -> std::result::Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Abbreviated hex form used in merge log lines
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_ID_LEN);
        hex
    }

    /// Whether the hex form starts with `prefix` (case-insensitive)
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for ObjectId {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        ObjectId::from_hex(&value)
    }
}

/// Object type discriminator, stored as a one-byte tag ahead of the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Blob,
    Commit,
}

impl ObjectKind {
    pub fn tag(self) -> u8 {
        match self {
            ObjectKind::Blob => b'b',
            ObjectKind::Commit => b'c',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'b' => Some(ObjectKind::Blob),
            b'c' => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

/// Format a point in time the way commit records store it
pub fn format_timestamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// The hashed part of a commit. Field order is part of the encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CommitRecord {
    message: String,
    timestamp: String,
    parent1: Option<ObjectId>,
    parent2: Option<ObjectId>,
    snapshot: Snapshot,
}

/// Immutable snapshot record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    id: ObjectId,
    record: CommitRecord,
}

impl Commit {
    /// Create a commit; the id is computed here and never again
    pub fn new(
        message: String,
        timestamp: String,
        parent1: Option<ObjectId>,
        parent2: Option<ObjectId>,
        snapshot: Snapshot,
    ) -> Result<Self> {
        let record = CommitRecord {
            message,
            timestamp,
            parent1,
            parent2,
            snapshot,
        };
        let id = ObjectId::from_data(&bincode::serialize(&record)?);
        Ok(Self { id, record })
    }

    /// The root commit. Its timestamp is the UTC epoch so every repository
    /// starts from the same id.
    pub fn root() -> Result<Self> {
        Self::new(
            ROOT_MESSAGE.to_string(),
            format_timestamp(&DateTime::<Utc>::UNIX_EPOCH),
            None,
            None,
            Snapshot::new(),
        )
    }

    /// A commit stamped with the local wall clock
    pub fn now(
        message: String,
        parent1: ObjectId,
        parent2: Option<ObjectId>,
        snapshot: Snapshot,
    ) -> Result<Self> {
        Self::new(
            message,
            format_timestamp(&Local::now()),
            Some(parent1),
            parent2,
            snapshot,
        )
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn message(&self) -> &str {
        &self.record.message
    }

    pub fn timestamp(&self) -> &str {
        &self.record.timestamp
    }

    pub fn parent1(&self) -> Option<ObjectId> {
        self.record.parent1
    }

    pub fn parent2(&self) -> Option<ObjectId> {
        self.record.parent2
    }

    /// Both parents, first parent first
    pub fn parents(&self) -> impl Iterator<Item = ObjectId> + use<> {
        self.record.parent1.into_iter().chain(self.record.parent2)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.record.snapshot
    }

    /// Blob id tracked for `path`, if any
    pub fn blob_for(&self, path: &str) -> Option<ObjectId> {
        self.record.snapshot.get(path).copied()
    }

    pub fn tracks(&self, path: &str) -> bool {
        self.record.snapshot.contains_key(path)
    }

    pub fn is_root(&self) -> bool {
        self.record.parent1.is_none()
    }

    pub fn is_merge(&self) -> bool {
        self.record.parent1.is_some() && self.record.parent2.is_some()
    }

    /// Canonical encoding; hashing these bytes yields `id()`
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.record)?)
    }

    /// Decode a stored record. The id is recomputed from the bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let record: CommitRecord = bincode::deserialize(data)?;
        Ok(Self {
            id: ObjectId::from_data(data),
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(entries: &[(&str, &[u8])]) -> Snapshot {
        entries
            .iter()
            .map(|(path, data)| (path.to_string(), ObjectId::from_data(data)))
            .collect()
    }

    #[test]
    fn test_object_id_roundtrip() {
        let id = ObjectId::new([42u8; 32]);
        let id2 = ObjectId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, id2);
        assert_eq!(id.short().len(), SHORT_ID_LEN);
        assert!(id.has_prefix("2a2A"));
        assert!(!id.has_prefix("2b"));
    }

    #[test]
    fn test_object_id_json_is_hex() {
        let id = ObjectId::from_data(b"hello world");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_root_commit_is_stable() {
        let a = Commit::root().unwrap();
        let b = Commit::root().unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.timestamp(), "Thu Jan 1 00:00:00 1970 +0000");
        assert_eq!(a.message(), ROOT_MESSAGE);
        assert!(a.is_root());
        assert!(!a.is_merge());
        assert!(a.snapshot().is_empty());
    }

    #[test]
    fn test_commit_bytes_roundtrip_keeps_id() {
        let root = Commit::root().unwrap();
        let commit = Commit::new(
            "add files".into(),
            "Mon Mar 4 10:00:00 2024 +0000".into(),
            Some(root.id()),
            None,
            snapshot(&[("a.txt", b"a"), ("b.txt", b"b")]),
        )
        .unwrap();
        let bytes = commit.to_bytes().unwrap();
        assert_eq!(ObjectId::from_data(&bytes), commit.id());
        let decoded = Commit::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, commit);
    }

    #[test]
    fn test_second_parent_changes_id() {
        let root = Commit::root().unwrap();
        let other = ObjectId::from_data(b"other");
        let make = |p2| {
            Commit::new("m".into(), "t".into(), Some(root.id()), p2, Snapshot::new()).unwrap()
        };
        let single = make(None);
        let merge = make(Some(other));
        assert_ne!(single.id(), merge.id());
        assert!(merge.is_merge());
        assert_eq!(merge.parents().collect::<Vec<_>>(), vec![root.id(), other]);
    }

    proptest! {
        #[test]
        fn prop_hash_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(ObjectId::from_data(&data), ObjectId::from_data(&data.clone()));
        }

        #[test]
        fn prop_identical_commits_collide(
            message in ".{0,40}",
            paths in proptest::collection::btree_set("[a-z]{1,8}", 0..8),
        ) {
            let snap: Snapshot = paths
                .iter()
                .map(|p| (p.clone(), ObjectId::from_data(p.as_bytes())))
                .collect();
            let a = Commit::new(message.clone(), "t".into(), None, None, snap.clone()).unwrap();
            let b = Commit::new(message, "t".into(), None, None, snap).unwrap();
            prop_assert_eq!(a.id(), b.id());
        }
    }
}
