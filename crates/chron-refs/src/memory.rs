//! In-memory reference store for testing and ephemeral use.
//!
//! [`InMemoryRefStore`] keeps branches, ref logs and HEAD in maps protected
//! by a single `RwLock`, so a compare-and-swap update is atomic with respect
//! to other callers.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chron_types::{ObjectId, Signature};

use crate::error::{RefError, Result};
use crate::names::validate_branch_name;
use crate::traits::RefStore;
use crate::types::{Head, RefLogEntry};

#[derive(Debug, Default)]
struct State {
    branches: BTreeMap<String, ObjectId>,
    logs: HashMap<String, Vec<RefLogEntry>>,
    head: Option<Head>,
}

/// An in-memory implementation of [`RefStore`]. Data is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    state: RwLock<State>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().expect("lock poisoned")
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().expect("lock poisoned")
    }
}

impl RefStore for InMemoryRefStore {
    fn read_branch(&self, branch: &str) -> Result<Option<ObjectId>> {
        Ok(self.read_state().branches.get(branch).copied())
    }

    fn create_branch(
        &self,
        branch: &str,
        target: &ObjectId,
        force: bool,
        committer: &Signature,
        message: &str,
    ) -> Result<()> {
        validate_branch_name(branch)?;
        let mut state = self.write_state();
        let old = state.branches.get(branch).copied();
        if old.is_some() && !force {
            return Err(RefError::AlreadyExists {
                name: branch.to_string(),
            });
        }
        state.branches.insert(branch.to_string(), *target);
        state
            .logs
            .entry(branch.to_string())
            .or_default()
            .push(RefLogEntry {
                old,
                new: *target,
                committer: committer.clone(),
                message: message.to_string(),
            });
        Ok(())
    }

    fn update_branch(
        &self,
        branch: &str,
        expected: &ObjectId,
        new: &ObjectId,
        committer: &Signature,
        message: &str,
    ) -> Result<()> {
        validate_branch_name(branch)?;
        let mut state = self.write_state();
        let actual = state.branches.get(branch).copied();
        if actual != Some(*expected) {
            return Err(RefError::Conflict {
                name: branch.to_string(),
                expected: *expected,
                actual,
            });
        }
        state.branches.insert(branch.to_string(), *new);
        state
            .logs
            .entry(branch.to_string())
            .or_default()
            .push(RefLogEntry {
                old: Some(*expected),
                new: *new,
                committer: committer.clone(),
                message: message.to_string(),
            });
        Ok(())
    }

    fn reflog(&self, branch: &str) -> Result<Vec<RefLogEntry>> {
        Ok(self
            .read_state()
            .logs
            .get(branch)
            .cloned()
            .unwrap_or_default())
    }

    fn list_branches(&self) -> Result<Vec<(String, ObjectId)>> {
        Ok(self
            .read_state()
            .branches
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect())
    }

    fn head(&self) -> Result<Option<Head>> {
        Ok(self.read_state().head.clone())
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        self.write_state().head = Some(Head::Symbolic(branch.to_string()));
        Ok(())
    }
}
