use chron_types::{Identity, ObjectId};
use chrono::{DateTime, FixedOffset};

/// One file in a change set: new content, or `None` to delete the path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileUpdate {
    pub path: String,
    pub content: Option<Vec<u8>>,
}

impl FileUpdate {
    pub fn upsert(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: None,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.content.is_none()
    }
}

/// A logical batch of file updates to commit as one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSet {
    pub updates: Vec<FileUpdate>,
    pub author: Identity,
    /// Backdated commit time. `None` means "now".
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub description: String,
    /// Target branch. `None` means the repository's configured branch.
    pub branch: Option<String>,
    /// Replace the whole snapshot: files not named in `updates` are removed.
    pub clear_all: bool,
}

impl ChangeSet {
    pub fn new(author: Identity, description: impl Into<String>) -> Self {
        Self {
            updates: Vec::new(),
            author,
            timestamp: None,
            description: description.into(),
            branch: None,
            clear_all: false,
        }
    }

    pub fn with_update(mut self, update: FileUpdate) -> Self {
        self.updates.push(update);
        self
    }

    pub fn upsert(self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.with_update(FileUpdate::upsert(path, content))
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.with_update(FileUpdate::delete(path))
    }

    pub fn at(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn clearing_all(mut self) -> Self {
        self.clear_all = true;
        self
    }

    pub fn effective_branch<'a>(&'a self, default: &'a str) -> &'a str {
        self.branch.as_deref().unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && !self.clear_all
    }
}

/// What a synchronization did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A commit was created and the branch now points at it.
    Applied {
        commit: ObjectId,
        tree: ObjectId,
        /// `None` when the commit started the branch.
        parent: Option<ObjectId>,
    },
    /// Nothing would change; no commit was created and the branch did not move.
    NoOp,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }

    pub fn commit(&self) -> Option<ObjectId> {
        match self {
            Self::Applied { commit, .. } => Some(*commit),
            Self::NoOp => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> Identity {
        Identity::new("Dana", "dana@example.com")
    }

    #[test]
    fn builder() {
        let cs = ChangeSet::new(author(), "add users table")
            .upsert("tables/users.sql", "create table users ();")
            .delete("tables/old.sql")
            .on_branch("schema")
            .clearing_all();
        assert_eq!(cs.updates.len(), 2);
        assert!(!cs.updates[0].is_delete());
        assert!(cs.updates[1].is_delete());
        assert_eq!(cs.effective_branch("main"), "schema");
        assert!(cs.clear_all);
        assert!(cs.timestamp.is_none());
    }

    #[test]
    fn default_branch_fallback() {
        let cs = ChangeSet::new(author(), "x");
        assert_eq!(cs.effective_branch("main"), "main");
        assert!(cs.is_empty());
        assert!(!cs.clone().clearing_all().is_empty());
    }

    #[test]
    fn outcome_accessors() {
        let id = ObjectId::from_bytes(b"c");
        let applied = SyncOutcome::Applied {
            commit: id,
            tree: id,
            parent: None,
        };
        assert_eq!(applied.commit(), Some(id));
        assert!(!applied.is_noop());
        assert!(SyncOutcome::NoOp.is_noop());
        assert_eq!(SyncOutcome::NoOp.commit(), None);
    }
}
