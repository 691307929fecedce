//! Materialise the checked-out branch into the working tree.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use chron_crypto::ContentHasher;
use chron_store::ObjectStore;
use chron_tree::{list_files, split_path};
use chron_types::ObjectId;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{RepositoryStateError, SyncResult};
use crate::repository::{Repository, METADATA_DIR};

/// Files touched by a checkout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckoutStats {
    pub written: usize,
    pub removed: usize,
}

impl Repository {
    /// Write the commit HEAD's branch points at into the working tree.
    ///
    /// Files tracked by the previous staging snapshot but absent from the new
    /// tree are deleted, and the staging snapshot becomes the new tree. Without
    /// `force`, a tracked file whose content differs from the staging snapshot
    /// aborts the checkout before anything is written. With `force`, every
    /// file is rewritten.
    ///
    /// Does nothing if HEAD is detached or its branch has no commits.
    pub fn checkout_head(&self, force: bool) -> SyncResult<CheckoutStats> {
        let workdir = self.workdir().ok_or(RepositoryStateError::NoWorkdir)?;
        let Some(branch) = self.refs().head_branch()? else {
            return Ok(CheckoutStats::default());
        };
        let Some(head) = self.branch_head(&branch)? else {
            return Ok(CheckoutStats::default());
        };
        let tree = self.load_commit(&head, &branch)?.tree;

        let store = self.objects();
        let previous: HashMap<String, ObjectId> = match self.staged_tree()? {
            Some(old) => list_files(store, &old)?.into_iter().collect(),
            None => HashMap::new(),
        };
        let next = list_files(store, &tree)?;

        for (path, _) in &next {
            guard_path(path)?;
        }
        if !force {
            for (path, staged) in &previous {
                if is_modified(workdir, path, staged)? {
                    return Err(RepositoryStateError::DirtyWorktree(path.clone()).into());
                }
            }
        }

        let mut stats = CheckoutStats::default();
        let keep: HashSet<&str> = next.iter().map(|(p, _)| p.as_str()).collect();
        for path in previous.keys() {
            if keep.contains(path.as_str()) {
                continue;
            }
            match fs::remove_file(workdir.join(path)) {
                Ok(()) => stats.removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            prune_empty_parents(workdir, path);
        }

        for (path, blob) in &next {
            if !force && previous.get(path) == Some(blob) && workdir.join(path).is_file() {
                continue;
            }
            write_file(workdir, path, &store.get_blob(blob)?)?;
            stats.written += 1;
        }

        self.set_staged_tree(&tree)?;
        info!(
            branch = %branch,
            commit = %head.short_hex(),
            written = stats.written,
            removed = stats.removed,
            "working tree checked out"
        );
        Ok(stats)
    }
}

/// Refuse paths that would land in the metadata directory of a working tree.
pub(crate) fn guard_path(path: &str) -> SyncResult<()> {
    let segments = split_path(path)?;
    if segments.first() == Some(&METADATA_DIR) {
        return Err(RepositoryStateError::UnsafePath(path.to_string()).into());
    }
    Ok(())
}

fn is_modified(workdir: &Path, path: &str, staged: &ObjectId) -> SyncResult<bool> {
    match fs::read(workdir.join(path)) {
        Ok(bytes) => Ok(ContentHasher::BLOB.hash(&bytes) != *staged),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn write_file(workdir: &Path, path: &str, content: &[u8]) -> SyncResult<()> {
    let target = workdir.join(path);
    let parent = target.parent().unwrap_or(workdir);
    if parent.is_file() {
        fs::remove_file(parent)?;
    }
    if target.is_dir() {
        fs::remove_dir_all(&target)?;
    }
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&target).map_err(|e| e.error)?;
    debug!(path, bytes = content.len(), "file written");
    Ok(())
}

/// Remove directories left empty by a deletion, stopping at the working tree.
fn prune_empty_parents(workdir: &Path, path: &str) {
    let mut dir = workdir.join(path);
    while dir.pop() && dir.as_path() != workdir && dir.starts_with(workdir) {
        if fs::remove_dir(&dir).is_err() {
            break;
        }
    }
}
