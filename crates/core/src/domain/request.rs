use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Category of workflow request. All kinds share the same state machine;
/// only submission validation differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Leave,
    Expense,
    Document,
    Case,
    Other,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leave => "leave",
            Self::Expense => "expense",
            Self::Document => "document",
            Self::Case => "case",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown request kind `{0}` (expected leave|expense|document|case|other)")]
pub struct UnknownKind(pub String);

impl std::str::FromStr for RequestKind {
    type Err = UnknownKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "leave" => Ok(Self::Leave),
            "expense" => Ok(Self::Expense),
            "document" => Ok(Self::Document),
            "case" => Ok(Self::Case),
            "other" => Ok(Self::Other),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Single status enumeration shared by every request kind. Pending is the
/// only state with outgoing transitions; Approved and Rejected are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown request status `{0}` (expected pending|approved|rejected)")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Leave-specific payload, present exactly when `kind == Leave`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

pub const MIN_REASON_CHARS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub requester_id: UserId,
    pub approver_id: Option<UserId>,
    pub status: RequestStatus,
    pub comments: Option<String>,
    pub leave: Option<LeaveWindow>,
    pub submitted_at: DateTime<Utc>,
    pub adjudicated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("leave requests must carry startDate, endDate, and reason")]
    MissingLeaveWindow,
    #[error("{kind:?} requests do not carry a leave window")]
    UnexpectedLeaveWindow { kind: RequestKind },
    #[error("leave start date {start} is after end date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },
    #[error("leave start date {start} is in the past")]
    StartInPast { start: NaiveDate },
    #[error("leave reason must be at least {MIN_REASON_CHARS} characters, got {length}")]
    ReasonTooShort { length: usize },
}

/// Submission input, validated once at creation time. Leave payload rules
/// are never re-checked at adjudication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRequest {
    pub kind: RequestKind,
    pub requester_id: UserId,
    pub comments: Option<String>,
    pub leave: Option<LeaveWindow>,
}

impl NewRequest {
    pub fn submit(self, now: DateTime<Utc>) -> Result<WorkflowRequest, SubmissionError> {
        match (self.kind, &self.leave) {
            (RequestKind::Leave, None) => return Err(SubmissionError::MissingLeaveWindow),
            (RequestKind::Leave, Some(window)) => validate_leave(window, now.date_naive())?,
            (kind, Some(_)) => return Err(SubmissionError::UnexpectedLeaveWindow { kind }),
            (_, None) => {}
        }

        Ok(WorkflowRequest {
            id: RequestId::generate(),
            kind: self.kind,
            requester_id: self.requester_id,
            approver_id: None,
            status: RequestStatus::Pending,
            comments: self.comments,
            leave: self.leave,
            submitted_at: now,
            adjudicated_at: None,
        })
    }
}

fn validate_leave(window: &LeaveWindow, today: NaiveDate) -> Result<(), SubmissionError> {
    if window.start_date > window.end_date {
        return Err(SubmissionError::StartAfterEnd {
            start: window.start_date,
            end: window.end_date,
        });
    }

    if window.start_date < today {
        return Err(SubmissionError::StartInPast { start: window.start_date });
    }

    let length = window.reason.chars().count();
    if length < MIN_REASON_CHARS {
        return Err(SubmissionError::ReasonTooShort { length });
    }

    Ok(())
}
