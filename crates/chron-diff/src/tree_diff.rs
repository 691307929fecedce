//! Tree-level diff: compare two snapshots and list the files that changed.
//!
//! Entries are matched by name at each level. Subtrees with equal ids are
//! skipped without being read. When a name switches between file and
//! directory, the file side is reported as added or deleted and every file
//! under the directory side is reported individually.

use std::collections::BTreeSet;
use std::fmt;

use chron_store::{ObjectStore, StoreError, Tree, TreeEntry};
use chron_types::ObjectId;

use crate::error::{DiffError, DiffResult};

/// The result of comparing two trees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeDiff {
    /// File-level changes, sorted by path.
    pub changes: Vec<TreeChange>,
}

impl TreeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// `(added, deleted, modified)` counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.changes
            .iter()
            .fold((0, 0, 0), |(a, d, m), change| match change {
                TreeChange::Added { .. } => (a + 1, d, m),
                TreeChange::Deleted { .. } => (a, d + 1, m),
                TreeChange::Modified { .. } => (a, d, m + 1),
            })
    }
}

/// A single file-level change between two trees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeChange {
    Added { path: String, new_id: ObjectId },
    Deleted { path: String, old_id: ObjectId },
    /// Same path, different blob.
    Modified {
        path: String,
        old_id: ObjectId,
        new_id: ObjectId,
    },
}

impl TreeChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Deleted { path, .. } | Self::Modified { path, .. } => {
                path
            }
        }
    }
}

impl fmt::Display for TreeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { path, .. } => write!(f, "A {path}"),
            Self::Deleted { path, .. } => write!(f, "D {path}"),
            Self::Modified { path, .. } => write!(f, "M {path}"),
        }
    }
}

/// Compare two stored trees and list every file that differs.
pub fn diff_trees(store: &dyn ObjectStore, old: &ObjectId, new: &ObjectId) -> DiffResult<TreeDiff> {
    let mut changes = Vec::new();
    if old != new {
        diff_level(store, old, new, "", &mut changes)?;
    }
    changes.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(TreeDiff { changes })
}

/// Whether any path exists in exactly one tree or maps to different blobs.
///
/// Returns as soon as the first difference is found.
pub fn differs(store: &dyn ObjectStore, old: &ObjectId, new: &ObjectId) -> DiffResult<bool> {
    if old == new {
        return Ok(false);
    }
    let old_tree = load_tree(store, old)?;
    let new_tree = load_tree(store, new)?;
    for name in entry_names(&old_tree, &new_tree) {
        let changed = match (old_tree.get(name), new_tree.get(name)) {
            (Some(o), Some(n)) if o.object_id == n.object_id && o.mode == n.mode => false,
            (Some(o), Some(n)) if o.mode.is_dir() && n.mode.is_dir() => {
                differs(store, &o.object_id, &n.object_id)?
            }
            (Some(entry), None) | (None, Some(entry)) if entry.mode.is_dir() => {
                has_files(store, &entry.object_id)?
            }
            _ => true,
        };
        if changed {
            return Ok(true);
        }
    }
    Ok(false)
}

fn load_tree(store: &dyn ObjectStore, id: &ObjectId) -> DiffResult<Tree> {
    store.get_tree(id).map_err(|e| match e {
        StoreError::NotFound(id) => DiffError::TreeNotFound(id),
        other => DiffError::Store(other),
    })
}

fn entry_names<'a>(old: &'a Tree, new: &'a Tree) -> BTreeSet<&'a str> {
    old.entries
        .iter()
        .chain(&new.entries)
        .map(|e| e.name.as_str())
        .collect()
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn has_files(store: &dyn ObjectStore, tree: &ObjectId) -> DiffResult<bool> {
    let tree = load_tree(store, tree)?;
    for entry in &tree.entries {
        if !entry.mode.is_dir() || has_files(store, &entry.object_id)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn diff_level(
    store: &dyn ObjectStore,
    old: &ObjectId,
    new: &ObjectId,
    prefix: &str,
    out: &mut Vec<TreeChange>,
) -> DiffResult<()> {
    let old_tree = load_tree(store, old)?;
    let new_tree = load_tree(store, new)?;
    for name in entry_names(&old_tree, &new_tree) {
        let path = join(prefix, name);
        match (old_tree.get(name), new_tree.get(name)) {
            (Some(o), Some(n)) if o.object_id == n.object_id && o.mode == n.mode => {}
            (Some(o), Some(n)) => match (o.mode.is_dir(), n.mode.is_dir()) {
                (true, true) => diff_level(store, &o.object_id, &n.object_id, &path, out)?,
                (false, false) => out.push(TreeChange::Modified {
                    path,
                    old_id: o.object_id,
                    new_id: n.object_id,
                }),
                _ => {
                    side(store, o, &path, out, false)?;
                    side(store, n, &path, out, true)?;
                }
            },
            (Some(o), None) => side(store, o, &path, out, false)?,
            (None, Some(n)) => side(store, n, &path, out, true)?,
            (None, None) => {}
        }
    }
    Ok(())
}

/// Report every file reachable from `entry` as added (or deleted).
fn side(
    store: &dyn ObjectStore,
    entry: &TreeEntry,
    path: &str,
    out: &mut Vec<TreeChange>,
    added: bool,
) -> DiffResult<()> {
    if entry.mode.is_dir() {
        let tree = load_tree(store, &entry.object_id)?;
        for child in &tree.entries {
            side(store, child, &join(path, &child.name), out, added)?;
        }
        return Ok(());
    }
    out.push(if added {
        TreeChange::Added {
            path: path.to_string(),
            new_id: entry.object_id,
        }
    } else {
        TreeChange::Deleted {
            path: path.to_string(),
            old_id: entry.object_id,
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chron_store::InMemoryObjectStore;

    fn oid(b: u8) -> ObjectId {
        ObjectId::from_hash([b; 32])
    }

    fn put(store: &InMemoryObjectStore, entries: Vec<TreeEntry>) -> ObjectId {
        store.put_tree(&Tree::new(entries)).unwrap()
    }

    #[test]
    fn identical_trees_no_changes() {
        let store = InMemoryObjectStore::new();
        let t = put(&store, vec![TreeEntry::file("file.txt", oid(1))]);
        assert!(diff_trees(&store, &t, &t).unwrap().is_empty());
        assert!(!differs(&store, &t, &t).unwrap());
    }

    #[test]
    fn equal_ids_are_not_read() {
        // Neither id exists in the store; equality alone decides.
        let store = InMemoryObjectStore::new();
        assert!(!differs(&store, &oid(9), &oid(9)).unwrap());
        assert!(matches!(
            differs(&store, &oid(8), &oid(9)),
            Err(DiffError::TreeNotFound(_))
        ));
    }

    #[test]
    fn mixed_changes_with_full_paths() {
        let store = InMemoryObjectStore::new();
        let old_sub = put(
            &store,
            vec![
                TreeEntry::file("keep.sql", oid(1)),
                TreeEntry::file("modify.sql", oid(2)),
                TreeEntry::file("delete.sql", oid(3)),
            ],
        );
        let new_sub = put(
            &store,
            vec![
                TreeEntry::file("keep.sql", oid(1)),
                TreeEntry::file("modify.sql", oid(4)),
                TreeEntry::file("added.sql", oid(5)),
            ],
        );
        let old = put(&store, vec![TreeEntry::dir("tables", old_sub)]);
        let new = put(&store, vec![TreeEntry::dir("tables", new_sub)]);

        let diff = diff_trees(&store, &old, &new).unwrap();
        assert_eq!(
            diff.changes,
            vec![
                TreeChange::Added {
                    path: "tables/added.sql".into(),
                    new_id: oid(5)
                },
                TreeChange::Deleted {
                    path: "tables/delete.sql".into(),
                    old_id: oid(3)
                },
                TreeChange::Modified {
                    path: "tables/modify.sql".into(),
                    old_id: oid(2),
                    new_id: oid(4)
                },
            ]
        );
        assert_eq!(diff.counts(), (1, 1, 1));
        assert!(differs(&store, &old, &new).unwrap());
    }

    #[test]
    fn file_replaced_by_directory() {
        let store = InMemoryObjectStore::new();
        let sub = put(&store, vec![TreeEntry::file("b", oid(2))]);
        let old = put(&store, vec![TreeEntry::file("a", oid(1))]);
        let new = put(&store, vec![TreeEntry::dir("a", sub)]);

        let diff = diff_trees(&store, &old, &new).unwrap();
        let rendered: Vec<String> = diff.changes.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["D a", "A a/b"]);
    }

    #[test]
    fn empty_subtree_does_not_count_as_change() {
        let store = InMemoryObjectStore::new();
        let empty = put(&store, vec![]);
        let old = put(&store, vec![TreeEntry::file("a", oid(1))]);
        let new = put(
            &store,
            vec![TreeEntry::file("a", oid(1)), TreeEntry::dir("hollow", empty)],
        );
        assert!(!differs(&store, &old, &new).unwrap());
        assert!(diff_trees(&store, &old, &new).unwrap().is_empty());
    }

    #[test]
    fn populated_to_empty_all_deletions() {
        let store = InMemoryObjectStore::new();
        let old = put(
            &store,
            vec![TreeEntry::file("a.txt", oid(1)), TreeEntry::file("b.txt", oid(2))],
        );
        let new = put(&store, vec![]);
        let diff = diff_trees(&store, &old, &new).unwrap();
        assert_eq!(diff.counts(), (0, 2, 0));
    }
}
