//! Applying path operations to a baseline tree.
//!
//! The baseline is loaded lazily: only directories on the path of some op are
//! read from the store, and untouched subtrees keep their stored id. After all
//! ops are applied the modified directories are written bottom-up. Directories
//! left empty are dropped from their parent; the top-level tree is always
//! written, so an empty result is the empty tree.

use std::collections::{BTreeMap, HashMap};

use chron_store::{ObjectStore, Tree, TreeEntry};
use chron_types::ObjectId;
use tracing::debug;

use crate::error::TreeResult;
use crate::op::{split_path, PathOp};
use crate::walk::lookup;

/// Deduplicate `ops` by path and drop removals of paths absent from `baseline`.
///
/// When a path appears more than once the last op wins; surviving ops keep
/// the relative order of their last occurrence.
pub fn filter_ops(
    store: &dyn ObjectStore,
    baseline: &ObjectId,
    ops: &[PathOp],
) -> TreeResult<Vec<PathOp>> {
    let mut last: HashMap<&str, usize> = HashMap::with_capacity(ops.len());
    for (pos, op) in ops.iter().enumerate() {
        split_path(op.path())?;
        last.insert(op.path(), pos);
    }

    let mut kept = Vec::with_capacity(last.len());
    for (pos, op) in ops.iter().enumerate() {
        if last.get(op.path()) != Some(&pos) {
            continue;
        }
        if op.is_remove() && lookup(store, baseline, op.path())?.is_none() {
            debug!(path = op.path(), "dropping removal of absent path");
            continue;
        }
        kept.push(op.clone());
    }
    debug!(requested = ops.len(), kept = kept.len(), "filtered path ops");
    Ok(kept)
}

/// Apply `ops` on top of `baseline` and return the new top-level tree id.
///
/// ```
/// use chron_store::{InMemoryObjectStore, ObjectStore, Tree};
/// use chron_tree::{apply, lookup, PathOp};
///
/// let store = InMemoryObjectStore::new();
/// let empty = store.put_tree(&Tree::empty()).unwrap();
/// let blob = store.put_blob(b"create table t (id int);").unwrap();
///
/// let root = apply(&store, &empty, &[PathOp::upsert("tables/t.sql", blob)]).unwrap();
/// assert_eq!(lookup(&store, &root, "tables/t.sql").unwrap().unwrap().object_id, blob);
/// ```
pub fn apply(store: &dyn ObjectStore, baseline: &ObjectId, ops: &[PathOp]) -> TreeResult<ObjectId> {
    let ops = filter_ops(store, baseline, ops)?;
    let mut root = Dir::from_tree(store.get_tree(baseline)?);
    for op in &ops {
        let segments = split_path(op.path())?;
        match op {
            PathOp::Upsert { blob_id, .. } => root.upsert(store, &segments, *blob_id)?,
            PathOp::Remove { .. } => root.remove(store, &segments)?,
        }
    }
    let id = match root.write(store)? {
        Some(id) => id,
        None => store.put_tree(&Tree::empty())?,
    };
    debug!(ops = ops.len(), tree = %id.short_hex(), "tree built");
    Ok(id)
}

/// A tree node during building.
enum Node {
    File(ObjectId),
    /// Unmodified subtree, still only referenced by id.
    Stored(ObjectId),
    Loaded(Dir),
}

#[derive(Default)]
struct Dir {
    children: BTreeMap<String, Node>,
}

impl Dir {
    fn from_tree(tree: Tree) -> Self {
        let children = tree
            .entries
            .into_iter()
            .map(|entry| {
                let node = if entry.mode.is_dir() {
                    Node::Stored(entry.object_id)
                } else {
                    Node::File(entry.object_id)
                };
                (entry.name, node)
            })
            .collect();
        Self { children }
    }

    /// The child directory `name`, loading it from the store if needed.
    /// A file or missing entry at `name` is replaced by an empty directory.
    fn child_dir(&mut self, store: &dyn ObjectStore, name: &str) -> TreeResult<&mut Dir> {
        let node = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| Node::Loaded(Dir::default()));
        match *node {
            Node::Loaded(_) => {}
            Node::Stored(id) => *node = Node::Loaded(Dir::from_tree(store.get_tree(&id)?)),
            Node::File(_) => *node = Node::Loaded(Dir::default()),
        }
        match node {
            Node::Loaded(dir) => Ok(dir),
            _ => unreachable!("child node was just loaded"),
        }
    }

    fn upsert(&mut self, store: &dyn ObjectStore, path: &[&str], blob: ObjectId) -> TreeResult<()> {
        match path {
            [] => Ok(()),
            [name] => {
                self.children.insert((*name).to_string(), Node::File(blob));
                Ok(())
            }
            [name, rest @ ..] => self.child_dir(store, name)?.upsert(store, rest, blob),
        }
    }

    fn remove(&mut self, store: &dyn ObjectStore, path: &[&str]) -> TreeResult<()> {
        match path {
            [] => Ok(()),
            [name] => {
                self.children.remove(*name);
                Ok(())
            }
            [name, rest @ ..] => {
                if matches!(
                    self.children.get(*name),
                    Some(Node::Stored(_) | Node::Loaded(_))
                ) {
                    self.child_dir(store, name)?.remove(store, rest)?;
                }
                Ok(())
            }
        }
    }

    /// Write this directory and any loaded descendants. `None` if empty.
    fn write(self, store: &dyn ObjectStore) -> TreeResult<Option<ObjectId>> {
        let mut entries = Vec::with_capacity(self.children.len());
        for (name, node) in self.children {
            match node {
                Node::File(id) => entries.push(TreeEntry::file(name, id)),
                Node::Stored(id) => entries.push(TreeEntry::dir(name, id)),
                Node::Loaded(dir) => {
                    if let Some(id) = dir.write(store)? {
                        entries.push(TreeEntry::dir(name, id));
                    }
                }
            }
        }
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(store.put_tree(&Tree::new(entries))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeError;
    use crate::walk::list_files;
    use chron_store::{EntryMode, InMemoryObjectStore};
    use proptest::prelude::*;

    fn empty(store: &InMemoryObjectStore) -> ObjectId {
        store.put_tree(&Tree::empty()).unwrap()
    }

    fn files(store: &InMemoryObjectStore, root: &ObjectId) -> Vec<(String, Vec<u8>)> {
        list_files(store, root)
            .unwrap()
            .into_iter()
            .map(|(p, id)| (p, store.get_blob(&id).unwrap()))
            .collect()
    }

    #[test]
    fn last_op_for_a_path_wins() {
        let store = InMemoryObjectStore::new();
        let base = empty(&store);
        let v1 = store.put_blob(b"v1").unwrap();
        let v2 = store.put_blob(b"v2").unwrap();
        let ops = vec![
            PathOp::upsert("v.sql", v1),
            PathOp::upsert("w.sql", v1),
            PathOp::upsert("v.sql", v2),
        ];
        let kept = filter_ops(&store, &base, &ops).unwrap();
        assert_eq!(kept, vec![PathOp::upsert("w.sql", v1), PathOp::upsert("v.sql", v2)]);

        let root = apply(&store, &base, &ops).unwrap();
        assert_eq!(
            files(&store, &root),
            vec![("v.sql".into(), b"v2".to_vec()), ("w.sql".into(), b"v1".to_vec())]
        );
    }

    #[test]
    fn removal_of_absent_path_is_dropped() {
        let store = InMemoryObjectStore::new();
        let base = empty(&store);
        let a = store.put_blob(b"hello").unwrap();
        let base = apply(&store, &base, &[PathOp::upsert("a.txt", a)]).unwrap();

        let ops = vec![PathOp::remove("b.txt"), PathOp::remove("a.txt/nested")];
        assert!(filter_ops(&store, &base, &ops).unwrap().is_empty());
        assert_eq!(apply(&store, &base, &ops).unwrap(), base);
    }

    #[test]
    fn upsert_then_remove_in_one_batch() {
        let store = InMemoryObjectStore::new();
        let base = empty(&store);
        let a = store.put_blob(b"a").unwrap();
        let base = apply(&store, &base, &[PathOp::upsert("a", a)]).unwrap();
        let root = apply(&store, &base, &[PathOp::upsert("a", a), PathOp::remove("a")]).unwrap();
        assert_eq!(root, empty(&store));
    }

    #[test]
    fn nested_paths_create_subtrees() {
        let store = InMemoryObjectStore::new();
        let base = empty(&store);
        let blob = store.put_blob(b"ddl").unwrap();
        let root = apply(
            &store,
            &base,
            &[
                PathOp::upsert("schema/tables/users.sql", blob),
                PathOp::upsert("schema/views/active.sql", blob),
            ],
        )
        .unwrap();
        let top = store.get_tree(&root).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top.get("schema").unwrap().mode, EntryMode::Directory);
        assert_eq!(
            list_files(&store, &root).unwrap(),
            vec![
                ("schema/tables/users.sql".to_string(), blob),
                ("schema/views/active.sql".to_string(), blob),
            ]
        );
    }

    #[test]
    fn emptied_subtrees_collapse() {
        let store = InMemoryObjectStore::new();
        let base = empty(&store);
        let blob = store.put_blob(b"x").unwrap();
        let base = apply(
            &store,
            &base,
            &[PathOp::upsert("keep.txt", blob), PathOp::upsert("a/b/c.txt", blob)],
        )
        .unwrap();
        let root = apply(&store, &base, &[PathOp::remove("a/b/c.txt")]).unwrap();
        let top = store.get_tree(&root).unwrap();
        assert!(top.get("a").is_none());
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn untouched_subtrees_keep_their_id() {
        let store = InMemoryObjectStore::new();
        let base = empty(&store);
        let blob = store.put_blob(b"x").unwrap();
        let base = apply(
            &store,
            &base,
            &[PathOp::upsert("left/f", blob), PathOp::upsert("right/f", blob)],
        )
        .unwrap();
        let left_before = lookup(&store, &base, "left").unwrap().unwrap().object_id;
        let other = store.put_blob(b"y").unwrap();
        let root = apply(&store, &base, &[PathOp::upsert("right/g", other)]).unwrap();
        let left_after = lookup(&store, &root, "left").unwrap().unwrap().object_id;
        assert_eq!(left_before, left_after);
    }

    #[test]
    fn file_and_directory_replace_each_other() {
        let store = InMemoryObjectStore::new();
        let base = empty(&store);
        let blob = store.put_blob(b"x").unwrap();
        let base = apply(&store, &base, &[PathOp::upsert("a", blob)]).unwrap();

        let as_dir = apply(&store, &base, &[PathOp::upsert("a/b", blob)]).unwrap();
        assert_eq!(
            lookup(&store, &as_dir, "a").unwrap().unwrap().mode,
            EntryMode::Directory
        );

        let as_file = apply(&store, &as_dir, &[PathOp::upsert("a", blob)]).unwrap();
        assert_eq!(as_file, base);
    }

    #[test]
    fn remove_directory_path_drops_whole_subtree() {
        let store = InMemoryObjectStore::new();
        let base = empty(&store);
        let blob = store.put_blob(b"x").unwrap();
        let base = apply(
            &store,
            &base,
            &[PathOp::upsert("dir/a", blob), PathOp::upsert("dir/b", blob)],
        )
        .unwrap();
        let root = apply(&store, &base, &[PathOp::remove("dir")]).unwrap();
        assert_eq!(root, empty(&store));
    }

    #[test]
    fn invalid_path_is_rejected() {
        let store = InMemoryObjectStore::new();
        let base = empty(&store);
        let blob = store.put_blob(b"x").unwrap();
        assert!(matches!(
            apply(&store, &base, &[PathOp::upsert("a//b", blob)]),
            Err(TreeError::InvalidPath(_))
        ));
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-c]", 1..4).prop_map(|segments| segments.join("/"))
    }

    proptest! {
        #[test]
        fn same_final_contents_same_tree_id(
            paths in prop::collection::btree_set(path_strategy(), 1..12)
        ) {
            let store = InMemoryObjectStore::new();
            let base = empty(&store);
            // Keep only paths that are not a prefix directory of another.
            let paths: Vec<String> = paths
                .iter()
                .filter(|p| !paths.iter().any(|q| q.starts_with(&format!("{p}/"))))
                .cloned()
                .collect();
            let ops: Vec<PathOp> = paths
                .iter()
                .map(|p| PathOp::upsert(p.clone(), store.put_blob(p.as_bytes()).unwrap()))
                .collect();
            let mut reversed = ops.clone();
            reversed.reverse();

            let forward = apply(&store, &base, &ops).unwrap();
            let backward = apply(&store, &base, &reversed).unwrap();
            prop_assert_eq!(forward, backward);

            let listed: Vec<String> = list_files(&store, &forward)
                .unwrap()
                .into_iter()
                .map(|(p, _)| p)
                .collect();
            prop_assert_eq!(listed, paths);
        }

        #[test]
        fn removing_absent_paths_never_changes_tree(
            present in prop::collection::btree_set("[a-c]", 1..3),
            absent in prop::collection::vec("[x-z](/[a-c])?", 1..5)
        ) {
            let store = InMemoryObjectStore::new();
            let base = empty(&store);
            let ops: Vec<PathOp> = present
                .iter()
                .map(|p| PathOp::upsert(p.clone(), store.put_blob(b"v").unwrap()))
                .collect();
            let base = apply(&store, &base, &ops).unwrap();
            let removes: Vec<PathOp> = absent.into_iter().map(PathOp::remove).collect();
            prop_assert_eq!(apply(&store, &base, &removes).unwrap(), base);
        }
    }
}
