use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::authority::RoleAuthority;
use crate::domain::principal::{Principal, Role};
use crate::domain::request::{RequestStatus, UserId, WorkflowRequest};

/// The two legal transitions out of Pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjudicationAction {
    Approve,
    Reject,
}

impl AdjudicationAction {
    pub fn target_status(&self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Approved,
            Self::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown adjudication action `{0}` (expected approved|rejected)")]
pub struct UnknownAction(pub String);

impl std::str::FromStr for AdjudicationAction {
    type Err = UnknownAction;

    /// Accepts the wire values the legacy clients send, in any casing
    /// ("approved"/"Approved", "rejected"/"Rejected").
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(Self::Approve),
            "rejected" => Ok(Self::Reject),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("role `{role:?}` is not permitted to adjudicate requests")]
    NotPrivileged { role: Role },
    #[error("requesters may not adjudicate their own requests")]
    SelfAdjudication,
    #[error("request already processed (status `{status:?}`)")]
    AlreadyProcessed { status: RequestStatus },
}

/// The full set of fields an adjudication writes. Applied to the store as a
/// single conditional update so no intermediate state is observable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicationOutcome {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub approver_id: UserId,
    pub adjudicated_at: DateTime<Utc>,
    pub comments: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WorkflowEngine {
    authority: RoleAuthority,
}

impl WorkflowEngine {
    pub fn new(authority: RoleAuthority) -> Self {
        Self { authority }
    }

    pub fn authority(&self) -> &RoleAuthority {
        &self.authority
    }

    /// Privilege gate, checked before the target request is fetched so that
    /// unauthorized callers learn nothing about record existence.
    pub fn authorize(&self, actor: &Principal) -> Result<(), WorkflowError> {
        if self.authority.can_adjudicate(actor) {
            Ok(())
        } else {
            Err(WorkflowError::NotPrivileged { role: actor.role })
        }
    }

    /// Validates the transition against the fetched request and produces the
    /// outcome to persist. Order of checks: privilege, self-adjudication,
    /// current state.
    pub fn adjudicate(
        &self,
        request: &WorkflowRequest,
        actor: &Principal,
        action: AdjudicationAction,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AdjudicationOutcome, WorkflowError> {
        self.authorize(actor)?;

        if request.requester_id == actor.id {
            return Err(WorkflowError::SelfAdjudication);
        }

        if request.status.is_terminal() {
            return Err(WorkflowError::AlreadyProcessed { status: request.status });
        }

        Ok(AdjudicationOutcome {
            from: request.status,
            to: action.target_status(),
            approver_id: actor.id.clone(),
            adjudicated_at: now,
            comments,
        })
    }

    pub fn adjudicate_with_audit<S>(
        &self,
        request: &WorkflowRequest,
        actor: &Principal,
        action: AdjudicationAction,
        comments: Option<String>,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<AdjudicationOutcome, WorkflowError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.adjudicate(request, actor, action, comments, now);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.request_id.clone(),
                        audit.correlation_id.clone(),
                        "workflow.adjudicated",
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.request_id.clone(),
                        audit.correlation_id.clone(),
                        "workflow.adjudication_rejected",
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}
