//! Draining queued change requests into repositories.

use std::collections::HashMap;

use chron_sync::{synchronize, ChangeSet, CheckoutStats, FileUpdate, Repository, SyncError, SyncOutcome};
use chron_types::Identity;
use tracing::{debug, info, warn};

use crate::config::{OutboxConfig, RepositoryRegistry};
use crate::error::{OutboxResult, QueueResult};
use crate::identity::{resolve_or_fallback, IdentityResolver};
use crate::lock::ProcessLock;
use crate::queue::{QueueGroup, QueueSource, SqliteQueue};

/// Fold every request of a group into one change set.
///
/// A file row without a filename turns on `clear_all`. Rows naming the same
/// file collapse to the most recently queued one. The description comes from
/// the oldest request and the timestamp from the newest.
pub fn fold_group(group: &QueueGroup, author: Identity) -> QueueResult<ChangeSet> {
    let (Some(oldest), Some(newest)) = (group.requests.first(), group.requests.last()) else {
        return Ok(ChangeSet::new(author, ""));
    };

    let mut description = oldest.description.clone();
    if group.requests.len() > 1 {
        description.push_str(&format!(" [merged {} queued requests]", group.requests.len()));
    }

    let mut change_set = ChangeSet::new(author, description).at(newest.queued_time()?);
    let mut latest: HashMap<&str, usize> = HashMap::new();
    let mut updates: Vec<Option<FileUpdate>> = Vec::new();
    for file in group.requests.iter().flat_map(|r| &r.files) {
        let Some(filename) = file.filename.as_deref() else {
            change_set = change_set.clearing_all();
            continue;
        };
        if let Some(previous) = latest.insert(filename, updates.len()) {
            updates[previous] = None;
        }
        updates.push(Some(match &file.content {
            Some(bytes) => FileUpdate::upsert(filename, bytes.clone()),
            None => FileUpdate::delete(filename),
        }));
    }
    change_set.updates = updates.into_iter().flatten().collect();
    Ok(change_set)
}

/// Counters for one repository's drain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub groups: usize,
    pub applied: usize,
    pub noops: usize,
    /// Queue requests acknowledged.
    pub requests: usize,
    pub checkout: Option<CheckoutStats>,
}

/// Result of draining one repository in a [`DrainReport`].
#[derive(Debug)]
pub struct RepositoryReport {
    pub repo: String,
    pub result: OutboxResult<DrainStats>,
}

#[derive(Debug, Default)]
pub struct DrainReport {
    pub repositories: Vec<RepositoryReport>,
}

impl DrainReport {
    pub fn failures(&self) -> usize {
        self.repositories.iter().filter(|r| r.result.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }

    pub fn get(&self, repo: &str) -> Option<&OutboxResult<DrainStats>> {
        self.repositories
            .iter()
            .find(|r| r.repo == repo)
            .map(|r| &r.result)
    }
}

/// Applies queued groups to repositories, oldest first.
pub struct OutboxProcessor<Q, R> {
    queue: Q,
    resolver: R,
}

impl<Q: QueueSource, R: IdentityResolver> OutboxProcessor<Q, R> {
    pub fn new(queue: Q, resolver: R) -> Self {
        Self { queue, resolver }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut Q {
        &mut self.queue
    }

    pub fn into_queue(self) -> Q {
        self.queue
    }

    /// Apply every pending group for `repo_id` to `repo`, then refresh the
    /// working tree if HEAD is on the repository's branch.
    ///
    /// A group is acknowledged only after it has been applied. On error the
    /// current group stays queued and the drain stops.
    pub fn drain(&mut self, repo_id: &str, repo: &Repository) -> OutboxResult<DrainStats> {
        let mut stats = DrainStats::default();
        while let Some(group) = self.queue.next_group(repo_id)? {
            let principal = group
                .requests
                .first()
                .map(|r| r.principal.as_str())
                .unwrap_or_default();
            let author = resolve_or_fallback(&self.resolver, principal);
            let change_set = fold_group(&group, author)?;
            debug!(
                repo = repo_id,
                group = %group.group_id,
                requests = group.requests.len(),
                files = group.file_count(),
                updates = change_set.updates.len(),
                clear_all = change_set.clear_all,
                "group folded"
            );

            match synchronize(repo, &change_set)? {
                SyncOutcome::Applied { commit, .. } => {
                    stats.applied += 1;
                    info!(
                        repo = repo_id,
                        group = %group.group_id,
                        commit = %commit.short_hex(),
                        "group applied"
                    );
                }
                SyncOutcome::NoOp => {
                    stats.noops += 1;
                    debug!(repo = repo_id, group = %group.group_id, "group changed nothing");
                }
            }

            let ids = group.request_ids();
            self.queue.acknowledge(&ids)?;
            stats.groups += 1;
            stats.requests += ids.len();
        }

        if !repo.is_bare() {
            let head = repo.refs().head_branch().map_err(SyncError::from)?;
            if head.as_deref() == Some(repo.branch()) {
                stats.checkout = Some(repo.checkout_head(true)?);
            }
        }

        info!(
            repo = repo_id,
            groups = stats.groups,
            applied = stats.applied,
            noops = stats.noops,
            "drain finished"
        );
        Ok(stats)
    }

    /// Drain every registered repository in order. A failing repository is
    /// logged and recorded, and the next one is still drained.
    pub fn drain_all(&mut self, registry: &RepositoryRegistry) -> DrainReport {
        let mut report = DrainReport::default();
        for config in registry.iter() {
            let result = registry
                .open(&config.id)
                .and_then(|repo| self.drain(&config.id, &repo));
            if let Err(e) = &result {
                warn!(repo = %config.id, error = %e, "drain failed");
            }
            report.repositories.push(RepositoryReport {
                repo: config.id.clone(),
                result,
            });
        }
        report
    }
}

/// One full drain run: take the process lock, open the queue and drain every
/// configured repository.
pub fn run(config: &OutboxConfig) -> OutboxResult<DrainReport> {
    let _lock = ProcessLock::acquire(&config.lock_path)?;
    let registry = config.registry()?;
    let queue = SqliteQueue::open(&config.queue_path)?;
    let mut processor = OutboxProcessor::new(queue, config.directory());
    let report = processor.drain_all(&registry);
    info!(
        repositories = report.repositories.len(),
        failures = report.failures(),
        "drain run complete"
    );
    Ok(report)
}
