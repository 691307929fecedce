use crate::error::QueueResult;
use crate::queue::{NewRequest, QueueGroup, QueueSource, QueuedFile, QueuedRequest};

/// Queue held in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    requests: Vec<QueuedRequest>,
    next_request_id: i64,
    next_file_id: i64,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request and return its id.
    pub fn enqueue(&mut self, request: NewRequest) -> i64 {
        self.next_request_id += 1;
        let files = request
            .files
            .into_iter()
            .map(|(filename, content)| {
                self.next_file_id += 1;
                QueuedFile {
                    file_id: self.next_file_id,
                    filename,
                    content,
                }
            })
            .collect();
        self.requests.push(QueuedRequest {
            id: self.next_request_id,
            repo: request.repo,
            group_id: request.group_id,
            principal: request.principal,
            description: request.description,
            queued_at: request.queued_at.timestamp(),
            utc_offset_minutes: request.queued_at.offset().local_minus_utc() / 60,
            files,
        });
        self.next_request_id
    }

    /// Number of pending requests for `repo`.
    pub fn pending(&self, repo: &str) -> usize {
        self.requests.iter().filter(|r| r.repo == repo).count()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl QueueSource for InMemoryQueue {
    fn next_group(&mut self, repo: &str) -> QueueResult<Option<QueueGroup>> {
        let Some(oldest) = self.requests.iter().find(|r| r.repo == repo) else {
            return Ok(None);
        };
        let group_id = oldest.group_id.clone();
        let requests = self
            .requests
            .iter()
            .filter(|r| r.repo == repo && r.group_id == group_id)
            .cloned()
            .collect();
        Ok(Some(QueueGroup {
            repo: repo.to_string(),
            group_id,
            requests,
        }))
    }

    fn acknowledge(&mut self, request_ids: &[i64]) -> QueueResult<()> {
        self.requests.retain(|r| !request_ids.contains(&r.id));
        Ok(())
    }
}
