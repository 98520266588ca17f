//! In-memory doubles mirroring the SQL repositories. Handler tests use
//! these to exercise the HTTP surface without a database file.

use std::collections::HashMap;
use std::sync::Mutex;

use caseflow_core::domain::request::{RequestId, RequestStatus, UserId, WorkflowRequest};
use caseflow_core::workflow::AdjudicationOutcome;

use super::{
    PageRequest, RepositoryError, RequestFilter, RequestPage, RequestRepository, UserDirectory,
    UserRecord,
};

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: Mutex<Vec<WorkflowRequest>>,
}

impl InMemoryRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_requests(requests: Vec<WorkflowRequest>) -> Self {
        Self { requests: Mutex::new(requests) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<WorkflowRequest>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn matches_filter(request: &WorkflowRequest, filter: &RequestFilter) -> bool {
    filter.status.map_or(true, |status| request.status == status)
        && filter.kind.map_or(true, |kind| request.kind == kind)
        && filter.requester_id.as_ref().map_or(true, |id| &request.requester_id == id)
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn create(&self, request: WorkflowRequest) -> Result<(), RepositoryError> {
        self.lock().push(request);
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<WorkflowRequest>, RepositoryError> {
        Ok(self.lock().iter().find(|r| &r.id == id).cloned())
    }

    async fn list(
        &self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Result<RequestPage, RepositoryError> {
        let mut matching: Vec<WorkflowRequest> =
            self.lock().iter().filter(|r| matches_filter(r, filter)).cloned().collect();
        matching.sort_by(|a, b| {
            b.submitted_at.cmp(&a.submitted_at).then_with(|| b.id.0.cmp(&a.id.0))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size() as usize)
            .collect();

        Ok(RequestPage { items, total })
    }

    async fn adjudicate(
        &self,
        id: &RequestId,
        outcome: &AdjudicationOutcome,
    ) -> Result<bool, RepositoryError> {
        let mut requests = self.lock();
        let Some(request) = requests.iter_mut().find(|r| &r.id == id) else {
            return Ok(false);
        };
        if request.status != RequestStatus::Pending {
            return Ok(false);
        }

        request.status = outcome.to;
        request.approver_id = Some(outcome.approver_id.clone());
        request.adjudicated_at = Some(outcome.adjudicated_at);
        if outcome.comments.is_some() {
            request.comments = outcome.comments.clone();
        }
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<UserRecord>) -> Self {
        let map = users.into_iter().map(|u| (u.id.0.clone(), u)).collect();
        Self { users: Mutex::new(map) }
    }

    pub fn insert(&self, record: UserRecord) {
        self.users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(record.id.0.clone(), record);
    }
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id.0)
            .cloned())
    }
}
