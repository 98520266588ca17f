use async_trait::async_trait;
use thiserror::Error;

use caseflow_core::domain::principal::Role;
use caseflow_core::domain::request::{
    RequestId, RequestKind, RequestStatus, UserId, WorkflowRequest,
};
use caseflow_core::workflow::AdjudicationOutcome;

pub mod memory;
pub mod request;
pub mod user;

pub use memory::{InMemoryRequestRepository, InMemoryUserDirectory};
pub use request::SqlRequestRepository;
pub use user::SqlUserDirectory;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Conjunction of optional predicates; `None` means "any".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub kind: Option<RequestKind>,
    pub requester_id: Option<UserId>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Offset pagination: 1-based page index, clamped page size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page: page.max(1), page_size: page_size.clamp(1, MAX_PAGE_SIZE) }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestPage {
    pub items: Vec<WorkflowRequest>,
    pub total: u64,
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Persistence only; submission validation happens in core beforehand.
    async fn create(&self, request: WorkflowRequest) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &RequestId)
        -> Result<Option<WorkflowRequest>, RepositoryError>;

    /// Newest `submitted_at` first, stable `id` tie-break. `total` comes
    /// from a separate count over the same filter.
    async fn list(
        &self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Result<RequestPage, RepositoryError>;

    /// Applies the outcome as a single conditional update guarded by
    /// `status = 'pending'`. Returns false when no pending row was claimed,
    /// which the caller surfaces as a conflict.
    async fn adjudicate(
        &self,
        id: &RequestId,
        outcome: &AdjudicationOutcome,
    ) -> Result<bool, RepositoryError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// The user-directory collaborator: principal resolution and display
/// enrichment (name/email joins) both go through this seam.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, RepositoryError>;
}
