//! Markup document service: save, list, fetch and soft-delete.
//!
//! DESIGN
//! ======
//! Every operation takes the acting user and decides access through
//! [`crate::services::access`] only. Saves are idempotent: re-sending content
//! identical to the stored record returns that record without writing, so a
//! client retrying after a lost response never bumps `updatedAt`.
//!
//! Ownership is decided here, never by the client: an update keeps the stored
//! `createdBy` and `createdAt`, a create takes the actor as owner.
//!
//! ERROR HANDLING
//! ==============
//! Store calls failing with a transient error are retried with exponential
//! backoff plus jitter. When the budget is spent the caller sees
//! `TransientIo`; nothing is half-written because each store call is a single
//! upsert or update.

#[cfg(test)]
#[path = "documents_test.rs"]
mod tests;

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use markup::{DocumentId, Location, MarkupDocument, SiteId, ValidationError};
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::services::access::{Actor, can_read, can_write};
use crate::services::store::{ListScope, StoreError};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    #[error("invalid document: {0}")]
    Validation(#[from] ValidationError),
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),
    #[error("markup document not found: {0}")]
    NotFound(DocumentId),
    #[error("store unavailable after {attempts} attempts: {source}")]
    TransientIo { attempts: u32, source: StoreError },
    #[error("store error: {0}")]
    Store(StoreError),
}

impl MarkupError {
    /// Grepable error code for response bodies.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::PermissionDenied(_) => "E_PERMISSION_DENIED",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::TransientIo { .. } => "E_TRANSIENT_IO",
            Self::Store(_) => "E_STORE",
        }
    }

    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::TransientIo { .. })
    }
}

/// Optional narrowing for `list_visible`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub location: Option<Location>,
    pub site: Option<SiteId>,
    /// Request the administrator view. Refused for everyone else.
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub document: MarkupDocument,
    /// True when this call created the record.
    pub created: bool,
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Validate, authorize and upsert a document.
///
/// # Errors
///
/// - `Validation` for an invalid document or a changed blueprint reference.
/// - `NotFound` when updating a deleted document.
/// - `PermissionDenied` when the actor may not write the stored or the new state.
/// - `TransientIo` / `Store` when the store fails.
pub async fn save(state: &AppState, mut doc: MarkupDocument, actor: &Actor) -> Result<SaveOutcome, MarkupError> {
    doc.validate()?;
    // Deletion goes through `delete`; a save always leaves the document live.
    doc.is_deleted = false;

    let existing = match doc.id {
        Some(id) => with_retry(state.retry, "fetch", || state.store.fetch(id)).await?,
        None => None,
    };

    let now = now_ms();
    let created = match &existing {
        Some(stored) => {
            if stored.is_deleted {
                return Err(MarkupError::NotFound(stored.id.unwrap_or_default()));
            }
            if !can_write(actor, stored) {
                return Err(MarkupError::PermissionDenied("not allowed to modify this document"));
            }
            if stored.blueprint_image_ref() != doc.blueprint_image_ref() {
                return Err(ValidationError::BlueprintChanged.into());
            }
            if stored.content_eq(&doc) {
                return Ok(SaveOutcome { document: stored.clone(), created: false });
            }
            doc.created_by = stored.created_by;
            doc.created_at = stored.created_at;
            doc.updated_at = Some(now.max(stored.updated_at.unwrap_or(0) + 1));
            false
        }
        None => {
            doc.id = Some(doc.id.unwrap_or_else(Uuid::new_v4));
            doc.created_by = actor.user_id;
            doc.created_at = Some(now);
            doc.updated_at = Some(now);
            true
        }
    };

    if !can_write(actor, &doc) {
        return Err(MarkupError::PermissionDenied("not allowed to save to this location"));
    }

    with_retry(state.retry, "upsert", || state.store.upsert(&doc)).await?;
    info!(
        id = ?doc.id,
        user_id = %actor.user_id,
        role = actor.role.as_str(),
        location = doc.location.as_str(),
        shapes = doc.shape_count(),
        created,
        "markup document saved"
    );
    Ok(SaveOutcome { document: doc, created })
}

/// Documents the actor can read, newest first.
///
/// # Errors
///
/// `PermissionDenied` when a non-administrator asks for the administrator view;
/// `TransientIo` / `Store` when the store fails.
pub async fn list_visible(
    state: &AppState,
    actor: &Actor,
    filter: ListFilter,
) -> Result<Vec<MarkupDocument>, MarkupError> {
    if filter.admin && !actor.is_administrator() {
        return Err(MarkupError::PermissionDenied("administrator view requires an administrator role"));
    }

    let scope = if actor.is_administrator() {
        ListScope::All
    } else {
        ListScope::Member { user_id: actor.user_id, site_id: actor.site_id }
    };
    let mut docs: Vec<MarkupDocument> = with_retry(state.retry, "list", || state.store.list(scope))
        .await?
        .into_iter()
        .filter(|doc| can_read(actor, doc))
        .filter(|doc| filter.location.is_none_or(|loc| doc.location == loc))
        .filter(|doc| filter.site.is_none_or(|site| doc.site_id == Some(site)))
        .collect();
    docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    Ok(docs)
}

/// Fetch one readable document.
///
/// # Errors
///
/// `NotFound` when the document is missing, deleted or not readable by the actor.
pub async fn get(state: &AppState, id: DocumentId, actor: &Actor) -> Result<MarkupDocument, MarkupError> {
    with_retry(state.retry, "fetch", || state.store.fetch(id))
        .await?
        .filter(|doc| can_read(actor, doc))
        .ok_or(MarkupError::NotFound(id))
}

/// Soft-delete a document the actor can write.
///
/// # Errors
///
/// `NotFound` when missing or already deleted; `PermissionDenied` when not writable.
pub async fn delete(state: &AppState, id: DocumentId, actor: &Actor) -> Result<(), MarkupError> {
    let doc = with_retry(state.retry, "fetch", || state.store.fetch(id))
        .await?
        .filter(|doc| !doc.is_deleted)
        .ok_or(MarkupError::NotFound(id))?;
    if !can_write(actor, &doc) {
        return Err(MarkupError::PermissionDenied("not allowed to delete this document"));
    }

    let updated_at = now_ms().max(doc.updated_at.unwrap_or(0) + 1);
    if !with_retry(state.retry, "soft_delete", || state.store.soft_delete(id, updated_at)).await? {
        // Lost a race with another delete.
        return Err(MarkupError::NotFound(id));
    }
    info!(%id, user_id = %actor.user_id, "markup document deleted");
    Ok(())
}

// =============================================================================
// RETRY
// =============================================================================

async fn with_retry<T, F, Fut>(retry: RetryConfig, op: &'static str, mut call: F) -> Result<T, MarkupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let attempts = retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay_ms = backoff_ms(retry.base_ms, attempt);
                warn!(op, attempt, total = attempts, delay_ms, error = %e, "store call failed; retrying");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(e) if e.is_transient() => {
                warn!(op, attempts, error = %e, "store call failed after retries");
                return Err(MarkupError::TransientIo { attempts, source: e });
            }
            Err(e) => {
                warn!(op, error = %e, "store call failed");
                return Err(MarkupError::Store(e));
            }
        }
    }
}

/// Exponential delay for the retry following `attempt`, plus up to 50% jitter.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    let exp = base_ms.saturating_mul(1 << attempt.saturating_sub(1).min(10));
    if exp == 0 {
        return 0;
    }
    exp + rand::rng().random_range(0..=exp / 2)
}

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}
