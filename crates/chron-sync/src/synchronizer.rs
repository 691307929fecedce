//! Apply a [`ChangeSet`] to a branch as at most one commit.
//!
//! A branch is either headless (no ref yet) or headed at a commit, and one
//! function handles both:
//!
//! - **Headless**: the baseline is the staging snapshot, or the empty tree.
//!   `clear_all` is ignored. If no op survives filtering nothing is written;
//!   otherwise a root commit is created and the ref is force-created.
//! - **Headed**: the baseline is the head commit's tree. `clear_all` adds a
//!   removal for every baseline file the change set does not name. If the new
//!   tree has the same content as the baseline nothing is written; otherwise
//!   a commit on top of the head is created and the ref is moved from the
//!   head with compare-and-swap.

use chron_diff::{diff_trees, differs};
use chron_refs::RefError;
use chron_store::{Commit, ObjectStore, Tree};
use chron_tree::{apply, filter_ops, tombstones, PathOp};
use chron_types::{ObjectId, Signature};
use tracing::{debug, info};

use crate::change::{ChangeSet, SyncOutcome};
use crate::checkout::guard_path;
use crate::error::{RepositoryStateError, SyncError, SyncResult};
use crate::repository::Repository;

/// Apply `change_set` to its target branch in `repo`.
pub fn synchronize(repo: &Repository, change_set: &ChangeSet) -> SyncResult<SyncOutcome> {
    let branch = change_set.effective_branch(repo.branch());
    let head = repo.branch_head(branch)?;
    let store = repo.objects();

    if !repo.is_bare() {
        for update in &change_set.updates {
            guard_path(&update.path)?;
        }
    }

    let mut ops = Vec::with_capacity(change_set.updates.len());
    for update in &change_set.updates {
        ops.push(match &update.content {
            Some(bytes) => PathOp::upsert(update.path.clone(), store.put_blob(bytes)?),
            None => PathOp::remove(update.path.clone()),
        });
    }

    let baseline = match head {
        None => match repo.staged_tree()? {
            Some(tree) => tree,
            None => store.put_tree(&Tree::empty())?,
        },
        Some(parent) => repo.load_commit(&parent, branch)?.tree,
    };

    if head.is_some() && change_set.clear_all {
        let mut reconciled = tombstones(store, &baseline, &ops)?;
        debug!(branch, tombstones = reconciled.len(), "clear-all reconciliation");
        reconciled.append(&mut ops);
        ops = reconciled;
    }

    let ops = filter_ops(store, &baseline, &ops)?;
    if head.is_none() && ops.is_empty() {
        debug!(branch, "nothing to bootstrap");
        return Ok(SyncOutcome::NoOp);
    }

    let tree = apply(store, &baseline, &ops)?;
    if head.is_some() && !differs(store, &baseline, &tree)? {
        debug!(branch, tree = %tree.short_hex(), "snapshot unchanged");
        return Ok(SyncOutcome::NoOp);
    }

    let signature = match change_set.timestamp {
        Some(when) => Signature::at(change_set.author.clone(), when),
        None => Signature::now(change_set.author.clone()),
    };
    let commit = Commit {
        tree,
        parent: head,
        author: signature.clone(),
        committer: signature.clone(),
        message: change_set.description.clone(),
    };
    let commit_id = store.put_commit(&commit)?;

    match head {
        None => repo.refs().create_branch(
            branch,
            &commit_id,
            true,
            &signature,
            &change_set.description,
        )?,
        Some(parent) => repo
            .refs()
            .update_branch(branch, &parent, &commit_id, &signature, &change_set.description)
            .map_err(|e| ref_moved(branch, e))?,
    }

    let (added, deleted, modified) = diff_trees(store, &baseline, &tree)?.counts();
    info!(
        branch,
        commit = %commit_id.short_hex(),
        parent = %head.map(|p| p.short_hex()).unwrap_or_default(),
        added,
        deleted,
        modified,
        "change set committed"
    );

    Ok(SyncOutcome::Applied {
        commit: commit_id,
        tree,
        parent: head,
    })
}

fn ref_moved(branch: &str, err: RefError) -> SyncError {
    match err {
        RefError::Conflict {
            expected, actual, ..
        } => RepositoryStateError::RefMoved {
            branch: branch.to_string(),
            expected,
            actual,
        }
        .into(),
        other => other.into(),
    }
}

/// Commits reachable from `branch`, newest first.
pub fn history(
    repo: &Repository,
    branch: &str,
    limit: Option<usize>,
) -> SyncResult<Vec<(ObjectId, Commit)>> {
    let mut out = Vec::new();
    let mut next = repo.branch_head(branch)?;
    let mut referrer = branch.to_string();
    while let Some(id) = next {
        if limit.is_some_and(|n| out.len() >= n) {
            break;
        }
        let commit = repo.load_commit(&id, &referrer)?;
        next = commit.parent;
        referrer = id.to_hex();
        out.push((id, commit));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::FileUpdate;
    use chron_tree::{list_files, lookup};
    use chron_types::Identity;

    fn author() -> Identity {
        Identity::new("Dana", "dana@example.com")
    }

    fn change(description: &str) -> ChangeSet {
        ChangeSet::new(author(), description)
    }

    fn read(repo: &Repository, tree: &ObjectId, path: &str) -> Option<Vec<u8>> {
        lookup(repo.objects(), tree, path)
            .unwrap()
            .map(|entry| repo.objects().get_blob(&entry.object_id).unwrap())
    }

    fn paths(repo: &Repository, tree: &ObjectId) -> Vec<String> {
        list_files(repo.objects(), tree)
            .unwrap()
            .into_iter()
            .map(|(p, _)| p)
            .collect()
    }

    fn applied(outcome: SyncOutcome) -> (ObjectId, ObjectId, Option<ObjectId>) {
        match outcome {
            SyncOutcome::Applied {
                commit,
                tree,
                parent,
            } => (commit, tree, parent),
            SyncOutcome::NoOp => panic!("expected a commit"),
        }
    }

    #[test]
    fn bootstrap_creates_root_commit_and_branch() {
        let repo = Repository::in_memory("main").unwrap();
        let cs = change("first").upsert("a.txt", "hello");
        let (commit, tree, parent) = applied(synchronize(&repo, &cs).unwrap());

        assert!(parent.is_none());
        assert_eq!(repo.branch_head("main").unwrap(), Some(commit));
        assert_eq!(paths(&repo, &tree), vec!["a.txt"]);
        assert_eq!(read(&repo, &tree, "a.txt").unwrap(), b"hello");

        let stored = repo.objects().get_commit(&commit).unwrap();
        assert_eq!(stored.parent_count(), 0);
        assert_eq!(stored.message, "first");
        assert_eq!(stored.author.identity, author());

        let log = repo.refs().reflog("main").unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].old, None);
        assert_eq!(log[0].message, "first");
    }

    #[test]
    fn identical_change_set_commits_once() {
        let repo = Repository::in_memory("main").unwrap();
        let cs = change("same").upsert("a.txt", "hello");
        let first = synchronize(&repo, &cs).unwrap();
        assert!(!first.is_noop());
        let second = synchronize(&repo, &cs).unwrap();
        assert!(second.is_noop());
        assert_eq!(history(&repo, "main", None).unwrap().len(), 1);
        assert_eq!(repo.refs().reflog("main").unwrap().len(), 1);
    }

    #[test]
    fn fast_forward_ignores_absent_removal() {
        let repo = Repository::in_memory("main").unwrap();
        let (first, _, _) =
            applied(synchronize(&repo, &change("one").upsert("a.txt", "hello")).unwrap());

        let cs = change("two").upsert("a.txt", "world").delete("b.txt");
        let (second, tree, parent) = applied(synchronize(&repo, &cs).unwrap());
        assert_eq!(parent, Some(first));
        assert_eq!(paths(&repo, &tree), vec!["a.txt"]);
        assert_eq!(read(&repo, &tree, "a.txt").unwrap(), b"world");
        assert_eq!(repo.objects().get_commit(&second).unwrap().parent, Some(first));
        assert_eq!(repo.branch_head("main").unwrap(), Some(second));
    }

    #[test]
    fn clear_all_keeps_explicit_upserts() {
        let repo = Repository::in_memory("main").unwrap();
        synchronize(
            &repo,
            &change("base").upsert("a.txt", "a").upsert("c.txt", "c"),
        )
        .unwrap();

        let cs = change("replace").clearing_all().upsert("a.txt", "x");
        let (_, tree, _) = applied(synchronize(&repo, &cs).unwrap());
        assert_eq!(paths(&repo, &tree), vec!["a.txt"]);
        assert_eq!(read(&repo, &tree, "a.txt").unwrap(), b"x");
    }

    #[test]
    fn clear_all_with_identical_content_is_noop() {
        let repo = Repository::in_memory("main").unwrap();
        synchronize(&repo, &change("base").upsert("dir/a.txt", "a")).unwrap();
        let cs = change("again").clearing_all().upsert("dir/a.txt", "a");
        assert!(synchronize(&repo, &cs).unwrap().is_noop());
    }

    #[test]
    fn clear_all_ignored_when_bootstrapping() {
        let repo = Repository::in_memory("main").unwrap();
        let staged = repo
            .objects()
            .put_tree(&Tree::new(vec![chron_store::TreeEntry::file(
                "keep.txt",
                repo.objects().put_blob(b"k").unwrap(),
            )]))
            .unwrap();
        repo.set_staged_tree(&staged).unwrap();

        let cs = change("boot").clearing_all().upsert("new.txt", "n");
        let (_, tree, _) = applied(synchronize(&repo, &cs).unwrap());
        assert_eq!(paths(&repo, &tree), vec!["keep.txt", "new.txt"]);
    }

    #[test]
    fn bootstrap_without_surviving_ops_is_noop() {
        let repo = Repository::in_memory("main").unwrap();
        let cs = change("nothing").delete("missing.txt");
        assert!(synchronize(&repo, &cs).unwrap().is_noop());
        assert!(repo.branch_head("main").unwrap().is_none());
        assert!(repo.refs().reflog("main").unwrap().is_empty());
    }

    #[test]
    fn explicit_timestamp_wins() {
        let repo = Repository::in_memory("main").unwrap();
        let when = Signature::timestamp_from_parts(1_600_000_000, 330).unwrap();
        let cs = change("backdated").upsert("a", "1").at(when);
        let (commit, _, _) = applied(synchronize(&repo, &cs).unwrap());
        let stored = repo.objects().get_commit(&commit).unwrap();
        assert_eq!(stored.author.when, when);
        assert_eq!(stored.committer.when, when);
        assert_eq!(stored.committer.offset_minutes(), 330);
    }

    #[test]
    fn change_set_branch_overrides_default() {
        let repo = Repository::in_memory("main").unwrap();
        let cs = change("side").upsert("a", "1").on_branch("schema/prod");
        synchronize(&repo, &cs).unwrap();
        assert!(repo.branch_head("main").unwrap().is_none());
        assert!(repo.branch_head("schema/prod").unwrap().is_some());
    }

    #[test]
    fn last_update_for_path_wins() {
        let repo = Repository::in_memory("main").unwrap();
        let cs = change("dup")
            .with_update(FileUpdate::upsert("v.sql", "old"))
            .with_update(FileUpdate::upsert("v.sql", "new"));
        let (_, tree, _) = applied(synchronize(&repo, &cs).unwrap());
        assert_eq!(read(&repo, &tree, "v.sql").unwrap(), b"new");
    }

    #[test]
    fn ref_pointing_at_missing_commit() {
        let repo = Repository::in_memory("main").unwrap();
        let ghost = ObjectId::from_bytes(b"ghost");
        repo.refs()
            .create_branch("main", &ghost, false, &Signature::now(author()), "x")
            .unwrap();
        let err = synchronize(&repo, &change("y").upsert("a", "1")).unwrap_err();
        assert!(matches!(
            err,
            SyncError::State(RepositoryStateError::MissingObject { id, .. }) if id == ghost
        ));
    }

    #[test]
    fn moved_ref_maps_to_state_error() {
        let err = ref_moved(
            "main",
            RefError::Conflict {
                name: "refs/heads/main".into(),
                expected: ObjectId::from_bytes(b"a"),
                actual: Some(ObjectId::from_bytes(b"b")),
            },
        );
        assert!(matches!(
            err,
            SyncError::State(RepositoryStateError::RefMoved { .. })
        ));
        assert!(matches!(
            ref_moved("main", RefError::Locked { name: "main".into() }),
            SyncError::Ref(RefError::Locked { .. })
        ));
    }

    #[test]
    fn history_walks_parents_newest_first() {
        let repo = Repository::in_memory("main").unwrap();
        for (i, content) in ["1", "2", "3"].iter().enumerate() {
            synchronize(&repo, &change(&format!("c{i}")).upsert("f", *content)).unwrap();
        }
        let messages: Vec<_> = history(&repo, "main", None)
            .unwrap()
            .into_iter()
            .map(|(_, c)| c.message)
            .collect();
        assert_eq!(messages, vec!["c2", "c1", "c0"]);
        assert_eq!(history(&repo, "main", Some(2)).unwrap().len(), 2);
        assert!(history(&repo, "none", None).unwrap().is_empty());
    }

    #[test]
    fn metadata_paths_rejected_before_any_write() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), "main", false).unwrap();
        let (first, _, _) = applied(synchronize(&repo, &change("one").upsert("a.sql", "a")).unwrap());

        let err = synchronize(
            &repo,
            &change("evil").upsert("b.sql", "unique payload").upsert(".chron/HEAD", "junk"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SyncError::State(RepositoryStateError::UnsafePath(p)) if p == ".chron/HEAD"
        ));
        assert_eq!(repo.branch_head("main").unwrap(), Some(first));
        let stray = chron_crypto::ContentHasher::BLOB.hash(b"unique payload");
        assert!(!repo.objects().exists(&stray).unwrap());

        repo.checkout_head(true).unwrap();
        assert_eq!(std::fs::read(dir.path().join("a.sql")).unwrap(), b"a");
    }

    #[test]
    fn bare_repository_has_no_reserved_paths() {
        let repo = Repository::in_memory("main").unwrap();
        let outcome = synchronize(&repo, &change("bare").upsert(".chron/notes", "x")).unwrap();
        assert!(!outcome.is_noop());
    }
}
