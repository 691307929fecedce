//! Filesystem loose-object store.
//!
//! Layout: `<root>/<first byte hex>/<remaining 31 bytes hex>`. Each file holds
//! the zstd-compressed framed encoding `"<kind> <len>\0" || payload`.
//!
//! Writes go to an anonymous temp file inside `<root>`, are fsynced, then
//! published with a no-clobber link, so a reader either finds nothing or the
//! complete object.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chron_crypto::ContentHasher;
use chron_types::ObjectId;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// Default zstd level for loose objects.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Content-addressed store backed by a directory of loose objects.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    level: i32,
}

impl FsObjectStore {
    /// Open (creating if needed) an object directory.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            level: DEFAULT_COMPRESSION_LEVEL,
        })
    }

    /// Override the zstd compression level.
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the object with `id` lives on disk.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let (shard, file) = id.shard_parts();
        self.root.join(shard).join(file)
    }

    fn encode(&self, object: &StoredObject) -> StoreResult<Vec<u8>> {
        zstd::encode_all(object.framed().as_slice(), self.level)
            .map_err(|e| StoreError::Compression(e.to_string()))
    }

    fn decode(id: &ObjectId, compressed: &[u8]) -> StoreResult<StoredObject> {
        let framed =
            zstd::decode_all(compressed).map_err(|e| StoreError::Compression(e.to_string()))?;
        let (tag, payload) =
            ContentHasher::split_framed(&framed).ok_or_else(|| StoreError::CorruptObject {
                id: *id,
                reason: "malformed object header".into(),
            })?;
        let kind = ObjectKind::from_tag(tag).ok_or_else(|| StoreError::CorruptObject {
            id: *id,
            reason: format!("unknown object kind {tag:?}"),
        })?;
        let object = StoredObject::new(kind, payload.to_vec());
        let computed = object.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(object)
    }

    /// Flush the directory entry of a freshly published object.
    #[cfg(unix)]
    fn sync_dir(dir: &Path) -> io::Result<()> {
        File::open(dir)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_dir(_dir: &Path) -> io::Result<()> {
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let path = self.object_path(id);
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::decode(id, &compressed).map(Some)
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        let path = self.object_path(&id);
        if path.exists() {
            debug!(id = %id.short_hex(), kind = %object.kind, "object already present");
            return Ok(id);
        }

        let encoded = self.encode(object)?;
        let shard_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&shard_dir)?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {}
            // Another writer published the same content first.
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(id = %id.short_hex(), "object published concurrently");
                return Ok(id);
            }
            Err(e) => return Err(StoreError::Io(e.error)),
        }
        Self::sync_dir(&shard_dir)?;

        debug!(
            id = %id.short_hex(),
            kind = %object.kind,
            size = object.size(),
            compressed = encoded.len(),
            "object written"
        );
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Tree, TreeEntry};
    use tempfile::TempDir;

    fn setup() -> (FsObjectStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open(dir.path().join("objects")).unwrap();
        (store, dir)
    }

    #[test]
    fn write_read_roundtrip() {
        let (store, _dir) = setup();
        let id = store.put_blob(b"hello world").unwrap();
        assert_eq!(store.get_blob(&id).unwrap(), b"hello world");

        let tree = Tree::new(vec![TreeEntry::file("a.txt", id)]);
        let tree_id = store.put_tree(&tree).unwrap();
        assert_eq!(store.get_tree(&tree_id).unwrap(), tree);
    }

    #[test]
    fn object_is_sharded_by_first_byte() {
        let (store, _dir) = setup();
        let id = store.put_blob(b"sharded").unwrap();
        let path = store.object_path(&id);
        let hex = id.to_hex();
        assert!(path.ends_with(Path::new(&hex[..2]).join(&hex[2..])));
        assert!(path.is_file());
    }

    #[test]
    fn on_disk_bytes_are_compressed_framed_encoding() {
        let (store, _dir) = setup();
        let id = store.put_blob(b"payload").unwrap();
        let raw = fs::read(store.object_path(&id)).unwrap();
        let framed = zstd::decode_all(raw.as_slice()).unwrap();
        assert_eq!(framed, b"blob 7\0payload".to_vec());
    }

    #[test]
    fn existing_object_is_not_rewritten() {
        let (store, _dir) = setup();
        let id = store.put_blob(b"write once").unwrap();
        let path = store.object_path(&id);

        // Scribble over the published object; a second put must not touch it.
        fs::write(&path, b"sentinel").unwrap();
        let again = store.put_blob(b"write once").unwrap();
        assert_eq!(again, id);
        assert_eq!(fs::read(&path).unwrap(), b"sentinel");
    }

    #[test]
    fn no_temp_files_left_behind() {
        let (store, _dir) = setup();
        store.put_blob(b"one").unwrap();
        store.put_blob(b"two").unwrap();
        let stray = fs::read_dir(store.root())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .count();
        assert_eq!(stray, 0);
    }

    #[test]
    fn missing_object_reads_none() {
        let (store, _dir) = setup();
        let id = ObjectId::from_bytes(b"never written");
        assert!(store.read(&id).unwrap().is_none());
        assert!(!store.exists(&id).unwrap());
    }

    #[test]
    fn corrupted_object_is_detected() {
        let (store, _dir) = setup();
        let id = store.put_blob(b"original").unwrap();
        let forged = zstd::encode_all(&b"blob 6\0forged"[..], 3).unwrap();
        fs::write(store.object_path(&id), forged).unwrap();
        assert!(matches!(
            store.read(&id),
            Err(StoreError::HashMismatch { .. })
        ));

        fs::write(store.object_path(&id), b"not zstd").unwrap();
        assert!(matches!(store.read(&id), Err(StoreError::Compression(_))));
    }

    #[test]
    fn reopened_store_sees_objects() {
        let (store, dir) = setup();
        let id = store.put_blob(b"durable").unwrap();
        drop(store);
        let reopened = FsObjectStore::open(dir.path().join("objects")).unwrap();
        assert_eq!(reopened.get_blob(&id).unwrap(), b"durable");
    }
}
