//! Principal resolution. The caller's identity arrives in the `x-user-id`
//! header and must match a user directory record; the record's role becomes
//! the principal's role for every authorization decision downstream.

use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use caseflow_core::domain::principal::Principal;
use caseflow_core::domain::request::UserId;
use caseflow_db::repositories::{UserDirectory, UserRecord};
use tracing::error;

use crate::requests::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn resolve_principal(
    headers: &HeaderMap,
    directory: &dyn UserDirectory,
    correlation_id: &str,
) -> Result<(Principal, UserRecord), (StatusCode, Json<ApiError>)> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiError { error: format!("missing `{USER_ID_HEADER}` header") }),
            )
        })?;

    let record = directory
        .find_by_id(&UserId(user_id.to_string()))
        .await
        .map_err(|repo_error| {
            error!(
                event_name = "auth.directory_lookup_failed",
                correlation_id,
                request_id = "unknown",
                error = %repo_error,
                "user directory lookup failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError { error: "An unexpected internal error occurred.".to_string() }),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiError { error: format!("unknown user `{user_id}`") }),
            )
        })?;

    let principal = Principal::new(record.id.0.clone(), record.role);
    Ok((principal, record))
}
