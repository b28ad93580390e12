//! Markup document storage.
//!
//! DESIGN
//! ======
//! `MarkupStore` is the seam between the resolver and the database. It knows
//! nothing about permissions: `list` takes a coarse [`ListScope`] so Postgres
//! can use its indexes, and the resolver applies the access rules on top.
//! Rows are never hard-deleted; `soft_delete` only flips `is_deleted`.
//!
//! ERROR HANDLING
//! ==============
//! Connection-level failures are reported as transient so the resolver can
//! retry them. A row that cannot be turned back into a valid document is
//! reported as corrupt and never retried.

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::collections::HashMap;

use markup::{DocumentId, Location, MarkupDocument, Shape, SiteId, UserId};
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::RwLock;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("document has no id")]
    MissingId,
    #[error("stored document {id} is corrupt: {reason}")]
    Corrupt { id: DocumentId, reason: String },
}

impl StoreError {
    /// Whether the same call may succeed if retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed
            ),
            Self::Unavailable(_) => true,
            Self::MissingId | Self::Corrupt { .. } => false,
        }
    }
}

/// Coarse pre-filter for `list`. Deleted documents are always excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    /// Personal documents owned by `user_id` plus shared documents of `site_id`.
    Member { user_id: UserId, site_id: Option<SiteId> },
}

impl ListScope {
    #[must_use]
    pub fn includes(&self, doc: &MarkupDocument) -> bool {
        if doc.is_deleted {
            return false;
        }
        match *self {
            Self::All => true,
            Self::Member { user_id, site_id } => match doc.location {
                Location::Personal => doc.created_by == user_id,
                Location::Shared => site_id.is_some() && doc.site_id == site_id,
            },
        }
    }
}

#[async_trait::async_trait]
pub trait MarkupStore: Send + Sync {
    /// Load a document by id, deleted or not.
    async fn fetch(&self, id: DocumentId) -> Result<Option<MarkupDocument>, StoreError>;

    /// Insert or replace a document. The document must carry an id.
    async fn upsert(&self, doc: &MarkupDocument) -> Result<(), StoreError>;

    /// Non-deleted documents within `scope`, in no particular order.
    async fn list(&self, scope: ListScope) -> Result<Vec<MarkupDocument>, StoreError>;

    /// Mark a document deleted. Returns false if no live document had that id.
    async fn soft_delete(&self, id: DocumentId, updated_at: i64) -> Result<bool, StoreError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgMarkupStore {
    pool: PgPool,
}

impl PgMarkupStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, title, description, blueprint_image_ref, shapes, shape_count, location,
        site_id, created_by, is_deleted, created_at, updated_at
 FROM markup_documents";

#[derive(sqlx::FromRow)]
struct MarkupRow {
    id: DocumentId,
    title: String,
    description: Option<String>,
    blueprint_image_ref: String,
    shapes: Json<Vec<Shape>>,
    shape_count: i32,
    location: String,
    site_id: Option<SiteId>,
    created_by: UserId,
    is_deleted: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<MarkupRow> for MarkupDocument {
    type Error = StoreError;

    fn try_from(row: MarkupRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt { id: row.id, reason };
        let location = Location::parse(&row.location).ok_or_else(|| corrupt(format!("location {:?}", row.location)))?;
        if usize::try_from(row.shape_count).ok() != Some(row.shapes.0.len()) {
            return Err(corrupt(format!("shape_count {} for {} shapes", row.shape_count, row.shapes.0.len())));
        }

        let mut doc = MarkupDocument::new(row.title, row.blueprint_image_ref, row.created_by);
        for shape in row.shapes.0 {
            doc.push_shape(shape).map_err(|e| corrupt(e.to_string()))?;
        }
        doc.id = Some(row.id);
        doc.description = row.description;
        doc.location = location;
        doc.site_id = row.site_id;
        doc.is_deleted = row.is_deleted;
        doc.created_at = Some(row.created_at);
        doc.updated_at = Some(row.updated_at);
        Ok(doc)
    }
}

#[async_trait::async_trait]
impl MarkupStore for PgMarkupStore {
    async fn fetch(&self, id: DocumentId) -> Result<Option<MarkupDocument>, StoreError> {
        let row = sqlx::query_as::<_, MarkupRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(MarkupDocument::try_from).transpose()
    }

    async fn upsert(&self, doc: &MarkupDocument) -> Result<(), StoreError> {
        let id = doc.id.ok_or(StoreError::MissingId)?;
        let shape_count = i32::try_from(doc.shape_count())
            .map_err(|_| StoreError::Corrupt { id, reason: "too many shapes".into() })?;
        let now = doc.updated_at.unwrap_or_default();

        sqlx::query(
            "INSERT INTO markup_documents (id, title, description, blueprint_image_ref, shapes, shape_count,
                location, site_id, created_by, is_deleted, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                shapes = EXCLUDED.shapes,
                shape_count = EXCLUDED.shape_count,
                location = EXCLUDED.location,
                site_id = EXCLUDED.site_id,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(id)
        .bind(&doc.title)
        .bind(&doc.description)
        .bind(doc.blueprint_image_ref())
        .bind(Json(doc.shapes()))
        .bind(shape_count)
        .bind(doc.location.as_str())
        .bind(doc.site_id)
        .bind(doc.created_by)
        .bind(doc.is_deleted)
        .bind(doc.created_at.unwrap_or(now))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, scope: ListScope) -> Result<Vec<MarkupDocument>, StoreError> {
        let rows = match scope {
            ListScope::All => {
                sqlx::query_as::<_, MarkupRow>(&format!("{SELECT_COLUMNS} WHERE NOT is_deleted"))
                    .fetch_all(&self.pool)
                    .await?
            }
            ListScope::Member { user_id, site_id } => {
                sqlx::query_as::<_, MarkupRow>(&format!(
                    "{SELECT_COLUMNS}
                     WHERE NOT is_deleted
                       AND ((location = 'personal' AND created_by = $1)
                         OR (location = 'shared' AND site_id = $2))"
                ))
                .bind(user_id)
                .bind(site_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(MarkupDocument::try_from).collect()
    }

    async fn soft_delete(&self, id: DocumentId, updated_at: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE markup_documents SET is_deleted = TRUE, updated_at = $2 WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryMarkupStore {
    docs: RwLock<HashMap<DocumentId, MarkupDocument>>,
}

impl MemoryMarkupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents, deleted ones included.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl MarkupStore for MemoryMarkupStore {
    async fn fetch(&self, id: DocumentId) -> Result<Option<MarkupDocument>, StoreError> {
        Ok(self.docs.read().await.get(&id).cloned())
    }

    async fn upsert(&self, doc: &MarkupDocument) -> Result<(), StoreError> {
        let id = doc.id.ok_or(StoreError::MissingId)?;
        self.docs.write().await.insert(id, doc.clone());
        Ok(())
    }

    async fn list(&self, scope: ListScope) -> Result<Vec<MarkupDocument>, StoreError> {
        Ok(self
            .docs
            .read()
            .await
            .values()
            .filter(|doc| scope.includes(doc))
            .cloned()
            .collect())
    }

    async fn soft_delete(&self, id: DocumentId, updated_at: i64) -> Result<bool, StoreError> {
        let mut docs = self.docs.write().await;
        match docs.get_mut(&id) {
            Some(doc) if !doc.is_deleted => {
                doc.is_deleted = true;
                doc.updated_at = Some(updated_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
