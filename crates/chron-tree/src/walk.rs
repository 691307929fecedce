//! Read-only traversal of stored trees.

use std::collections::HashSet;

use chron_store::{ObjectStore, TreeEntry};
use chron_types::ObjectId;

use crate::error::TreeResult;
use crate::op::{split_path, PathOp};

/// Resolve `path` inside the tree `root`.
///
/// Returns `None` if any segment is missing or a non-final segment names a
/// file.
pub fn lookup(store: &dyn ObjectStore, root: &ObjectId, path: &str) -> TreeResult<Option<TreeEntry>> {
    let segments = split_path(path)?;
    let mut tree = store.get_tree(root)?;
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Ok(None),
    };
    for segment in parents {
        match tree.get(segment) {
            Some(entry) if entry.mode.is_dir() => {
                let next = entry.object_id;
                tree = store.get_tree(&next)?;
            }
            _ => return Ok(None),
        }
    }
    Ok(tree.get(last).cloned())
}

/// Every file in the tree as `(full path, blob id)`, depth-first in name order.
pub fn list_files(store: &dyn ObjectStore, root: &ObjectId) -> TreeResult<Vec<(String, ObjectId)>> {
    let mut files = Vec::new();
    collect_files(store, root, "", &mut files)?;
    Ok(files)
}

fn collect_files(
    store: &dyn ObjectStore,
    tree_id: &ObjectId,
    prefix: &str,
    out: &mut Vec<(String, ObjectId)>,
) -> TreeResult<()> {
    let tree = store.get_tree(tree_id)?;
    for entry in &tree.entries {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        if entry.mode.is_dir() {
            collect_files(store, &entry.object_id, &path, out)?;
        } else {
            out.push((path, entry.object_id));
        }
    }
    Ok(())
}

/// Removals for every file in `baseline` that `explicit` does not name.
///
/// Used for clear-all change sets: the result, followed by the explicit ops,
/// replaces the whole snapshot. Paths are compared as exact strings.
pub fn tombstones(
    store: &dyn ObjectStore,
    baseline: &ObjectId,
    explicit: &[PathOp],
) -> TreeResult<Vec<PathOp>> {
    let named: HashSet<&str> = explicit.iter().map(PathOp::path).collect();
    Ok(list_files(store, baseline)?
        .into_iter()
        .filter(|(path, _)| !named.contains(path.as_str()))
        .map(|(path, _)| PathOp::remove(path))
        .collect())
}
