//! Markup document REST handlers.
//!
//! Handlers translate HTTP to resolver calls and back. Every failure becomes
//! a JSON body `{"error": "<E_CODE>", "message": "..."}`.

#[cfg(test)]
#[path = "documents_test.rs"]
mod tests;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use axum::response::{IntoResponse, Json, Response};
use markup::{DocumentId, Location, MarkupDocument};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::services::documents::{self, ListFilter, MarkupError};
use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
    /// Adds `Retry-After` so clients back off before re-sending.
    pub retryable: bool,
}

const RETRY_AFTER_SECS: &str = "1";

impl ApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody { error: "E_VALIDATION", message: message.into() },
            retryable: false,
        }
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorBody { error: "E_UNAUTHENTICATED", message: message.into() },
            retryable: false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.retryable {
            return (self.status, [(RETRY_AFTER, RETRY_AFTER_SECS)], Json(self.body)).into_response();
        }
        (self.status, Json(self.body)).into_response()
    }
}

impl From<MarkupError> for ApiError {
    fn from(err: MarkupError) -> Self {
        let status = markup_error_to_status(&err);
        let message = match &err {
            // Store internals stay in the log.
            MarkupError::Store(e) => {
                tracing::error!(error = %e, "markup store failure");
                "internal storage error".to_owned()
            }
            MarkupError::TransientIo { attempts, .. } => {
                format!("storage temporarily unavailable after {attempts} attempts; retry later")
            }
            other => other.to_string(),
        };
        Self { status, body: ErrorBody { error: err.error_code(), message }, retryable: err.retryable() }
    }
}

pub(crate) fn markup_error_to_status(err: &MarkupError) -> StatusCode {
    match err {
        MarkupError::Validation(_) => StatusCode::BAD_REQUEST,
        MarkupError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        MarkupError::NotFound(_) => StatusCode::NOT_FOUND,
        MarkupError::TransientIo { .. } => StatusCode::SERVICE_UNAVAILABLE,
        MarkupError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// QUERY
// =============================================================================

/// Raw list query. Values are parsed by hand so a bad filter yields a JSON
/// error body instead of the default plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    location: Option<String>,
    site: Option<String>,
    admin: Option<String>,
}

impl ListQuery {
    pub(crate) fn into_filter(self) -> Result<ListFilter, ApiError> {
        let location = match non_empty(self.location) {
            None => None,
            Some(raw) => {
                Some(Location::parse(&raw).ok_or_else(|| ApiError::bad_request(format!("unknown location {raw:?}")))?)
            }
        };
        let site = match non_empty(self.site) {
            None => None,
            Some(raw) => Some(Uuid::parse_str(&raw).map_err(|_| ApiError::bad_request(format!("invalid site id {raw:?}")))?),
        };
        let admin = match non_empty(self.admin).as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("false" | "0") => false,
            Some("true" | "1") => true,
            Some(other) => return Err(ApiError::bad_request(format!("invalid admin flag {other:?}"))),
        };
        Ok(ListFilter { location, site, admin })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /markup-documents`: documents visible to the caller.
pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MarkupDocument>>, ApiError> {
    let filter = query.into_filter()?;
    let docs = documents::list_visible(&state, &auth.actor, filter).await?;
    Ok(Json(docs))
}

/// `POST /markup-documents`: create (201) or update (200).
pub async fn save_document(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Result<Json<MarkupDocument>, JsonRejection>,
) -> Result<(StatusCode, Json<MarkupDocument>), ApiError> {
    let Json(doc) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let outcome = documents::save(&state, doc, &auth.actor).await?;
    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(outcome.document)))
}

/// `GET /markup-documents/{id}`
pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DocumentId>,
) -> Result<Json<MarkupDocument>, ApiError> {
    Ok(Json(documents::get(&state, id, &auth.actor).await?))
}

/// `DELETE /markup-documents/{id}`: soft delete.
pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DocumentId>,
) -> Result<StatusCode, ApiError> {
    documents::delete(&state, id, &auth.actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
