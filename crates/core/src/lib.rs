pub mod audit;
pub mod authority;
pub mod config;
pub mod domain;
pub mod errors;
pub mod workflow;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use authority::{ListScope, RoleAuthority, ADJUDICATOR_ROLES};
pub use domain::principal::{Principal, Role};
pub use domain::request::{
    LeaveWindow, NewRequest, RequestId, RequestKind, RequestStatus, SubmissionError, UserId,
    WorkflowRequest,
};
pub use errors::{ApplicationError, DomainError};
pub use workflow::{AdjudicationAction, AdjudicationOutcome, WorkflowEngine, WorkflowError};
