use chron_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, Commit, ObjectKind, StoredObject, Tree};

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same data always produces the
///   same ID.
/// - Writing an object whose ID is already present returns without writing.
/// - A written object becomes visible to readers atomically.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by its content-addressed ID.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its content-addressed ID.
    ///
    /// If the object already exists, this is a no-op (idempotent).
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read multiple objects in a batch.
    fn read_batch(&self, ids: &[ObjectId]) -> StoreResult<Vec<Option<StoredObject>>> {
        ids.iter().map(|id| self.read(id)).collect()
    }

    /// Write multiple objects in a batch and return their IDs.
    fn write_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<ObjectId>> {
        objects.iter().map(|obj| self.write(obj)).collect()
    }

    /// Read an object that must exist and must be of `kind`.
    fn read_required(&self, id: &ObjectId, kind: ObjectKind) -> StoreResult<StoredObject> {
        let obj = self.read(id)?.ok_or(StoreError::NotFound(*id))?;
        if obj.kind != kind {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: format!("expected {kind}, got {}", obj.kind),
            });
        }
        Ok(obj)
    }

    // ---- typed helpers ----

    fn put_blob(&self, data: &[u8]) -> StoreResult<ObjectId> {
        self.write(&StoredObject::new(ObjectKind::Blob, data.to_vec()))
    }

    fn get_blob(&self, id: &ObjectId) -> StoreResult<Vec<u8>> {
        let obj = self.read_required(id, ObjectKind::Blob)?;
        Ok(Blob::from_stored_object(&obj)?.data)
    }

    fn put_tree(&self, tree: &Tree) -> StoreResult<ObjectId> {
        self.write(&tree.to_stored_object()?)
    }

    fn get_tree(&self, id: &ObjectId) -> StoreResult<Tree> {
        Tree::from_stored_object(&self.read_required(id, ObjectKind::Tree)?)
    }

    fn put_commit(&self, commit: &Commit) -> StoreResult<ObjectId> {
        self.write(&commit.to_stored_object()?)
    }

    fn get_commit(&self, id: &ObjectId) -> StoreResult<Commit> {
        Commit::from_stored_object(&self.read_required(id, ObjectKind::Commit)?)
    }
}
