//! The request workflow REST surface: submission, listing, and adjudication,
//! plus the legacy leave-scoped aliases that pre-date the generic routes.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use caseflow_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use caseflow_core::domain::request::{
    LeaveWindow, NewRequest, RequestId, RequestKind, RequestStatus, UserId, WorkflowRequest,
};
use caseflow_core::errors::{ApplicationError, DomainError};
use caseflow_core::workflow::{AdjudicationAction, WorkflowEngine, WorkflowError};
use caseflow_db::repositories::{
    PageRequest, RequestFilter, RequestRepository, UserDirectory, UserRecord, DEFAULT_PAGE_SIZE,
};

#[derive(Clone)]
pub struct RequestsState {
    repository: Arc<dyn RequestRepository>,
    directory: Arc<dyn UserDirectory>,
    engine: WorkflowEngine,
    audit: Arc<dyn AuditSink>,
}

impl RequestsState {
    pub fn new(
        repository: Arc<dyn RequestRepository>,
        directory: Arc<dyn UserDirectory>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { repository, directory, engine: WorkflowEngine::default(), audit }
    }
}

/// Audit sink that forwards events to the structured log stream.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = %event.event_type,
            correlation_id = %event.correlation_id,
            request_id = event.request_id.as_ref().map_or("unknown", |id| id.0.as_str()),
            actor = %event.actor,
            outcome = ?event.outcome,
            "audit event"
        );
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequestBody {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjudicateBody {
    pub status: String,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(alias = "type")]
    pub kind: Option<String>,
    #[serde(rename = "requesterId")]
    pub requester_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBody {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub id: String,
    pub kind: String,
    pub status: String,
    pub requester_id: String,
    pub requester_name: Option<String>,
    pub requester_email: Option<String>,
    pub approver_id: Option<String>,
    pub approver_name: Option<String>,
    pub approver_email: Option<String>,
    pub comments: Option<String>,
    pub leave: Option<LeaveBody>,
    pub submitted_at: String,
    pub adjudicated_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<RequestResponse>,
    pub pagination: Pagination,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: RequestsState) -> Router {
    Router::new()
        .route("/api/v1/requests", post(submit_request).get(list_requests))
        .route("/api/v1/requests/{id}/status", patch(adjudicate_request))
        // Legacy surfaces, kept for clients that pre-date the /api/v1 routes:
        // /approvals is the generic surface under its old name, /leave is
        // scoped to leave requests.
        .route("/approvals", post(submit_request).get(list_requests))
        .route("/approvals/{id}/status", patch(adjudicate_request))
        .route("/leave", post(submit_leave).get(list_leave))
        .route("/leave/{id}/status", patch(adjudicate_leave))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error helpers
// ---------------------------------------------------------------------------

type ErrorResponse = (StatusCode, Json<ApiError>);

fn bad_request(message: impl Into<String>) -> ErrorResponse {
    (StatusCode::BAD_REQUEST, Json(ApiError { error: message.into() }))
}

fn not_found(id: &RequestId) -> ErrorResponse {
    let error = ApplicationError::NotFound(id.clone());
    (StatusCode::NOT_FOUND, Json(ApiError { error: error.user_message() }))
}

fn internal_error(correlation_id: &str, source: impl std::fmt::Display) -> ErrorResponse {
    let error = ApplicationError::Persistence(source.to_string());
    error!(
        event_name = "api.persistence_failed",
        correlation_id,
        request_id = "unknown",
        error = %error,
        "persistence operation failed"
    );
    // Details stay in the log; callers get the generic message.
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError { error: error.user_message() }))
}

fn workflow_error(error: WorkflowError) -> ErrorResponse {
    let status = match &error {
        WorkflowError::NotPrivileged { .. } | WorkflowError::SelfAdjudication => {
            StatusCode::FORBIDDEN
        }
        WorkflowError::AlreadyProcessed { .. } => StatusCode::CONFLICT,
    };
    let message = ApplicationError::from(DomainError::from(error)).user_message();
    (status, Json(ApiError { error: message }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn submit_request(
    State(state): State<RequestsState>,
    headers: HeaderMap,
    Json(body): Json<SubmitRequestBody>,
) -> Result<(StatusCode, Json<RequestResponse>), ErrorResponse> {
    submit(&state, &headers, body, None).await
}

async fn submit_leave(
    State(state): State<RequestsState>,
    headers: HeaderMap,
    Json(body): Json<SubmitRequestBody>,
) -> Result<(StatusCode, Json<RequestResponse>), ErrorResponse> {
    submit(&state, &headers, body, Some(RequestKind::Leave)).await
}

async fn list_requests(
    State(state): State<RequestsState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ErrorResponse> {
    list(&state, &headers, query, None).await
}

async fn list_leave(
    State(state): State<RequestsState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ErrorResponse> {
    list(&state, &headers, query, Some(RequestKind::Leave)).await
}

async fn adjudicate_request(
    State(state): State<RequestsState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AdjudicateBody>,
) -> Result<Json<RequestResponse>, ErrorResponse> {
    adjudicate(&state, &headers, id, body, false).await
}

async fn adjudicate_leave(
    State(state): State<RequestsState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AdjudicateBody>,
) -> Result<Json<RequestResponse>, ErrorResponse> {
    adjudicate(&state, &headers, id, body, true).await
}

async fn submit(
    state: &RequestsState,
    headers: &HeaderMap,
    body: SubmitRequestBody,
    forced_kind: Option<RequestKind>,
) -> Result<(StatusCode, Json<RequestResponse>), ErrorResponse> {
    let correlation_id = Uuid::new_v4().to_string();
    let (principal, requester) =
        crate::auth::resolve_principal(headers, state.directory.as_ref(), &correlation_id).await?;

    let kind = match forced_kind {
        Some(kind) => {
            if let Some(supplied) = body.kind.as_deref() {
                if supplied.parse::<RequestKind>() != Ok(kind) {
                    return Err(bad_request(format!(
                        "this surface only accepts `{}` requests",
                        kind.as_str()
                    )));
                }
            }
            kind
        }
        None => body
            .kind
            .as_deref()
            .ok_or_else(|| bad_request("`kind` is required"))?
            .parse::<RequestKind>()
            .map_err(|e| bad_request(e.to_string()))?,
    };

    if !state.engine.authority().can_submit(&principal, kind) {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiError {
                error: format!("role is not permitted to submit `{}` requests", kind.as_str()),
            }),
        ));
    }

    let leave = match (body.start_date, body.end_date, body.reason) {
        (None, None, None) => None,
        (Some(start_date), Some(end_date), Some(reason)) => {
            Some(LeaveWindow { start_date, end_date, reason })
        }
        _ => {
            return Err(bad_request(
                "startDate, endDate and reason must be provided together",
            ))
        }
    };

    let request = NewRequest {
        kind,
        requester_id: principal.id.clone(),
        comments: body.comments,
        leave,
    }
    .submit(Utc::now())
    .map_err(|e| bad_request(e.to_string()))?;

    state
        .repository
        .create(request.clone())
        .await
        .map_err(|e| internal_error(&correlation_id, e))?;

    state.audit.emit(
        AuditEvent::new(
            Some(request.id.clone()),
            correlation_id.clone(),
            "request.submitted",
            AuditCategory::Submission,
            principal.id.0.clone(),
            AuditOutcome::Success,
        )
        .with_metadata("kind", kind.as_str()),
    );
    info!(
        event_name = "api.request.submitted",
        correlation_id = %correlation_id,
        request_id = %request.id.0,
        kind = kind.as_str(),
        "request submitted"
    );

    let response = to_response(&request, Some(&requester), None);
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list(
    state: &RequestsState,
    headers: &HeaderMap,
    query: ListQuery,
    forced_kind: Option<RequestKind>,
) -> Result<Json<ListResponse>, ErrorResponse> {
    let correlation_id = Uuid::new_v4().to_string();
    let (principal, _) =
        crate::auth::resolve_principal(headers, state.directory.as_ref(), &correlation_id).await?;

    let status = query
        .status
        .as_deref()
        .map(|raw| raw.parse::<RequestStatus>())
        .transpose()
        .map_err(|e| bad_request(e.to_string()))?;
    let kind = match forced_kind {
        Some(kind) => Some(kind),
        None => query
            .kind
            .as_deref()
            .map(|raw| raw.parse::<RequestKind>())
            .transpose()
            .map_err(|e| bad_request(e.to_string()))?,
    };

    // Scope first: a non-privileged caller's requesterId filter never widens
    // what they can see.
    let scope = state
        .engine
        .authority()
        .scope_for_list(&principal, query.requester_id.map(UserId));
    let filter = RequestFilter { status, kind, requester_id: scope.requester().cloned() };

    let page = PageRequest::new(query.page.unwrap_or(1), query.limit.unwrap_or(DEFAULT_PAGE_SIZE));
    let result = state
        .repository
        .list(&filter, page)
        .await
        .map_err(|e| internal_error(&correlation_id, e))?;

    let mut items = Vec::with_capacity(result.items.len());
    for request in &result.items {
        items.push(enriched_response(state, request).await);
    }

    let limit = page.page_size();
    Ok(Json(ListResponse {
        items,
        pagination: Pagination {
            page: page.page(),
            limit,
            total: result.total,
            pages: result.total.div_ceil(u64::from(limit)),
        },
    }))
}

async fn adjudicate(
    state: &RequestsState,
    headers: &HeaderMap,
    id: String,
    body: AdjudicateBody,
    leave_only: bool,
) -> Result<Json<RequestResponse>, ErrorResponse> {
    let correlation_id = Uuid::new_v4().to_string();
    let (principal, _) =
        crate::auth::resolve_principal(headers, state.directory.as_ref(), &correlation_id).await?;

    // Privilege is checked before the fetch so unauthorized callers learn
    // nothing about record existence.
    state.engine.authorize(&principal).map_err(workflow_error)?;

    let action = body.status.parse::<AdjudicationAction>().map_err(|e| bad_request(e.to_string()))?;

    let request_id = RequestId(id);
    let request = state
        .repository
        .find_by_id(&request_id)
        .await
        .map_err(|e| internal_error(&correlation_id, e))?
        .filter(|request| !leave_only || request.kind == RequestKind::Leave)
        .ok_or_else(|| not_found(&request_id))?;

    let audit_context =
        AuditContext::new(Some(request.id.clone()), correlation_id.clone(), principal.id.0.clone());
    let outcome = state
        .engine
        .adjudicate_with_audit(
            &request,
            &principal,
            action,
            body.comments,
            Utc::now(),
            &*state.audit,
            &audit_context,
        )
        .map_err(workflow_error)?;

    let claimed = state
        .repository
        .adjudicate(&request.id, &outcome)
        .await
        .map_err(|e| internal_error(&correlation_id, e))?;
    if !claimed {
        // Lost the race to another adjudicator between fetch and update.
        return Err((
            StatusCode::CONFLICT,
            Json(ApiError { error: "request already processed".to_string() }),
        ));
    }

    info!(
        event_name = "api.request.adjudicated",
        correlation_id = %correlation_id,
        request_id = %request.id.0,
        to = outcome.to.as_str(),
        "request adjudicated"
    );

    let mut updated = request;
    updated.status = outcome.to;
    updated.approver_id = Some(outcome.approver_id.clone());
    updated.adjudicated_at = Some(outcome.adjudicated_at);
    if outcome.comments.is_some() {
        updated.comments = outcome.comments.clone();
    }

    Ok(Json(enriched_response(state, &updated).await))
}

// ---------------------------------------------------------------------------
// Response shaping
// ---------------------------------------------------------------------------

async fn enriched_response(state: &RequestsState, request: &WorkflowRequest) -> RequestResponse {
    let requester = lookup(state.directory.as_ref(), Some(&request.requester_id)).await;
    let approver = lookup(state.directory.as_ref(), request.approver_id.as_ref()).await;
    to_response(request, requester.as_ref(), approver.as_ref())
}

async fn lookup(directory: &dyn UserDirectory, id: Option<&UserId>) -> Option<UserRecord> {
    let id = id?;
    directory.find_by_id(id).await.ok().flatten()
}

fn to_response(
    request: &WorkflowRequest,
    requester: Option<&UserRecord>,
    approver: Option<&UserRecord>,
) -> RequestResponse {
    RequestResponse {
        id: request.id.0.clone(),
        kind: request.kind.as_str().to_string(),
        status: request.status.as_str().to_string(),
        requester_id: request.requester_id.0.clone(),
        requester_name: requester.map(|r| r.name.clone()),
        requester_email: requester.map(|r| r.email.clone()),
        approver_id: request.approver_id.as_ref().map(|id| id.0.clone()),
        approver_name: approver.map(|r| r.name.clone()),
        approver_email: approver.map(|r| r.email.clone()),
        comments: request.comments.clone(),
        leave: request.leave.as_ref().map(|window| LeaveBody {
            start_date: window.start_date,
            end_date: window.end_date,
            reason: window.reason.clone(),
        }),
        submitted_at: request.submitted_at.to_rfc3339(),
        adjudicated_at: request.adjudicated_at.map(|dt| dt.to_rfc3339()),
    }
}
