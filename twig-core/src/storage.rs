//! Object storage for twig
//!
//! Blobs and commits share one content-addressed namespace. Each stored
//! object is a one-byte [`ObjectKind`] tag followed by the payload; the tag
//! is not hashed.

use crate::error::{Result, TwigError};
use crate::object::{Commit, ObjectId, ObjectKind};
use lru::LruCache;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default number of decoded commits kept in memory by [`DiskStore`]
pub const DEFAULT_COMMIT_CACHE_SIZE: usize = 256;

/// Generic object store interface
///
/// Implementors provide raw tagged storage; the typed blob/commit API is
/// layered on top as provided methods.
pub trait ObjectStore {
    /// Store a payload under `id`. Must be a no-op if `id` already exists.
    fn put_raw(&self, kind: ObjectKind, id: ObjectId, payload: &[u8]) -> Result<()>;

    /// Load a payload and its kind
    fn get_raw(&self, id: ObjectId) -> Result<(ObjectKind, Vec<u8>)>;

    /// Check if object exists
    fn contains(&self, id: ObjectId) -> Result<bool>;

    /// All stored ids of the given kind, sorted
    fn list(&self, kind: ObjectKind) -> Result<Vec<ObjectId>>;

    /// Store file content and return its id
    fn put_blob(&self, data: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::from_data(data);
        self.put_raw(ObjectKind::Blob, id, data)?;
        Ok(id)
    }

    fn get_blob(&self, id: ObjectId) -> Result<Vec<u8>> {
        match self.get_raw(id)? {
            (ObjectKind::Blob, data) => Ok(data),
            (ObjectKind::Commit, _) => Err(TwigError::NotFound(id)),
        }
    }

    fn put_commit(&self, commit: &Commit) -> Result<()> {
        self.put_raw(ObjectKind::Commit, commit.id(), &commit.to_bytes()?)
    }

    fn get_commit(&self, id: ObjectId) -> Result<Commit> {
        match self.get_raw(id)? {
            (ObjectKind::Commit, data) => Commit::from_bytes(&data),
            (ObjectKind::Blob, _) => Err(TwigError::NotFound(id)),
        }
    }

    fn list_commits(&self) -> Result<Vec<ObjectId>> {
        self.list(ObjectKind::Commit)
    }

    /// Expand an abbreviated commit id of any length. Fails on no match and
    /// on ambiguity.
    fn resolve_short_id(&self, prefix: &str) -> Result<ObjectId> {
        let prefix = prefix.trim();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TwigError::NoSuchCommit);
        }
        let mut matches = self
            .list_commits()?
            .into_iter()
            .filter(|id| id.has_prefix(prefix));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id),
            (Some(_), Some(_)) => Err(TwigError::AmbiguousCommitId(prefix.to_string())),
            (None, _) => Err(TwigError::NoSuchCommit),
        }
    }
}

/// Content-addressed filesystem store (like git objects)
///
/// Layout: `{root}/{hash[0..2]}/{hash[2..]}`
pub struct DiskStore {
    root: PathBuf,
    commits: Mutex<LruCache<ObjectId, Commit>>,
}

impl DiskStore {
    /// Open or create a store rooted at `root`
    pub fn open(root: &Path, cache_size: usize) -> Result<Self> {
        fs::create_dir_all(root)?;
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            root: root.to_path_buf(),
            commits: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    fn read_tag(path: &Path) -> Result<Option<ObjectKind>> {
        let mut file = fs::File::open(path)?;
        let mut tag = [0u8; 1];
        file.read_exact(&mut tag)?;
        Ok(ObjectKind::from_tag(tag[0]))
    }

    /// Number of decoded commits currently cached
    pub fn cached_commits(&self) -> usize {
        self.commits.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl ObjectStore for DiskStore {
    fn put_raw(&self, kind: ObjectKind, id: ObjectId, payload: &[u8]) -> Result<()> {
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(()); // Already stored (content-addressed = idempotent)
        }
        let dir = self.root.join(&id.to_hex()[..2]);
        fs::create_dir_all(&dir)?;
        let mut data = Vec::with_capacity(payload.len() + 1);
        data.push(kind.tag());
        data.extend_from_slice(payload);
        // Write atomically via temp file
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &path)?;
        tracing::trace!(%id, ?kind, "stored object");
        Ok(())
    }

    fn get_raw(&self, id: ObjectId) -> Result<(ObjectKind, Vec<u8>)> {
        let path = self.object_path(&id);
        let mut data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Err(TwigError::NotFound(id)),
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            return Err(TwigError::corrupt(format!("object {} is empty", id)));
        }
        let kind = ObjectKind::from_tag(data[0])
            .ok_or_else(|| TwigError::corrupt(format!("object {} has an unknown tag", id)))?;
        data.remove(0);
        if ObjectId::from_data(&data) != id {
            return Err(TwigError::corrupt(format!("object {} fails its hash check", id)));
        }
        Ok((kind, data))
    }

    fn contains(&self, id: ObjectId) -> Result<bool> {
        Ok(self.object_path(&id).is_file())
    }

    fn list(&self, kind: ObjectKind) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for fan in fs::read_dir(&self.root)? {
            let fan = fan?;
            if !fan.file_type()?.is_dir() {
                continue;
            }
            let prefix = fan.file_name().to_string_lossy().into_owned();
            for entry in fs::read_dir(fan.path())? {
                let entry = entry?;
                let rest = entry.file_name().to_string_lossy().into_owned();
                let Ok(id) = ObjectId::from_hex(&format!("{}{}", prefix, rest)) else {
                    // temp files and strays
                    continue;
                };
                if Self::read_tag(&entry.path())? == Some(kind) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn get_commit(&self, id: ObjectId) -> Result<Commit> {
        {
            let mut cache = self.commits.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(commit) = cache.get(&id) {
                return Ok(commit.clone());
            }
        }
        let commit = match self.get_raw(id)? {
            (ObjectKind::Commit, data) => Commit::from_bytes(&data)?,
            (ObjectKind::Blob, _) => return Err(TwigError::NotFound(id)),
        };
        self.commits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(id, commit.clone());
        Ok(commit)
    }
}

/// In-memory store for tests and embedding
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<ObjectId, (ObjectKind, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryStore {
    fn put_raw(&self, kind: ObjectKind, id: ObjectId, payload: &[u8]) -> Result<()> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(id)
            .or_insert_with(|| (kind, payload.to_vec()));
        Ok(())
    }

    fn get_raw(&self, id: ObjectId) -> Result<(ObjectKind, Vec<u8>)> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or(TwigError::NotFound(id))
    }

    fn contains(&self, id: ObjectId) -> Result<bool> {
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&id))
    }

    fn list(&self, kind: ObjectKind) -> Result<Vec<ObjectId>> {
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, (k, _))| *k == kind)
            .map(|(id, _)| *id)
            .collect())
    }
}
