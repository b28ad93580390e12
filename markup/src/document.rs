//! The persisted markup document and its editable snapshot.
//!
//! DESIGN
//! ======
//! `shapes` and `blueprint_image_ref` are private. Shapes change only through
//! the mutation methods below, so the cached `shapeCount` written on the wire
//! can never drift from the list it describes. The blueprint reference has a
//! read accessor only; it is fixed when the document is created.
//!
//! History works on [`EditSnapshot`]s rather than whole documents so that
//! undoing past a save never strips the server-assigned id or timestamps.

#[cfg(test)]
#[path = "document_test.rs"]
mod document_test;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shape::{Shape, ShapeId};

/// Unique identifier for a markup document.
pub type DocumentId = Uuid;

/// Identifier of a user, as supplied by the identity provider.
pub type UserId = Uuid;

/// Identifier of a construction site.
pub type SiteId = Uuid;

/// Visibility scope of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Visible only to the creator.
    #[default]
    Personal,
    /// Visible to every user assigned to the document's site.
    Shared,
}

impl Location {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Shared => "shared",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "personal" => Some(Self::Personal),
            "shared" => Some(Self::Shared),
            _ => None,
        }
    }
}

/// A document or shape that cannot be persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("blueprint image reference must not be empty")]
    MissingBlueprint,
    #[error("shared documents require a site")]
    MissingSiteId,
    #[error("duplicate shape id: {0}")]
    DuplicateShapeId(ShapeId),
    #[error("box {0} has zero area")]
    DegenerateBox(ShapeId),
    #[error("path {0} needs at least two points")]
    TooFewPathPoints(ShapeId),
    #[error("text label {0} is empty")]
    EmptyText(ShapeId),
    #[error("shape {0} has a non-finite coordinate")]
    NonFiniteCoordinate(ShapeId),
    #[error("shapeCount {declared} does not match {actual} shapes")]
    ShapeCountMismatch { declared: usize, actual: usize },
    #[error("blueprint image reference cannot change after creation")]
    BlueprintChanged,
}

/// The editable content of a document, as recorded by the history manager.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSnapshot {
    pub title: String,
    pub description: Option<String>,
    pub location: Location,
    pub site_id: Option<SiteId>,
    pub shapes: Vec<Shape>,
}

/// A blueprint plus the annotations drawn on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DocumentWire", into = "DocumentWire")]
pub struct MarkupDocument {
    /// `None` until the document is first saved.
    pub id: Option<DocumentId>,
    pub title: String,
    pub description: Option<String>,
    blueprint_image_ref: String,
    /// Insertion order is z-order: later shapes draw on top.
    shapes: Vec<Shape>,
    pub location: Location,
    pub site_id: Option<SiteId>,
    pub created_by: UserId,
    /// Soft-delete flag. Deleted documents are retained but never listed.
    pub is_deleted: bool,
    /// Milliseconds since the Unix epoch.
    pub created_at: Option<i64>,
    /// Milliseconds since the Unix epoch.
    pub updated_at: Option<i64>,
}

impl MarkupDocument {
    /// Start a new personal draft over `blueprint_image_ref`.
    #[must_use]
    pub fn new(title: impl Into<String>, blueprint_image_ref: impl Into<String>, created_by: UserId) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            blueprint_image_ref: blueprint_image_ref.into(),
            shapes: Vec::new(),
            location: Location::Personal,
            site_id: None,
            created_by,
            is_deleted: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn blueprint_image_ref(&self) -> &str {
        &self.blueprint_image_ref
    }

    /// Shapes in z-order (bottom first).
    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn shape(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| &s.id == id)
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.id.is_none()
    }

    /// Append a shape on top of the stack.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateShapeId` if a shape with the same id already exists.
    pub fn push_shape(&mut self, shape: Shape) -> Result<(), ValidationError> {
        if self.shape(&shape.id).is_some() {
            return Err(ValidationError::DuplicateShapeId(shape.id));
        }
        self.shapes.push(shape);
        Ok(())
    }

    /// Remove a shape by id, returning it if it was present.
    pub fn remove_shape(&mut self, id: &ShapeId) -> Option<Shape> {
        let index = self.shapes.iter().position(|s| &s.id == id)?;
        Some(self.shapes.remove(index))
    }

    /// Translate a shape in place. Returns false if the shape doesn't exist.
    pub fn translate_shape(&mut self, id: &ShapeId, dx: f64, dy: f64) -> bool {
        let Some(shape) = self.shapes.iter_mut().find(|s| &s.id == id) else {
            return false;
        };
        shape.translate(dx, dy);
        true
    }

    /// Change the visibility scope. `site_id` replaces the current binding.
    pub fn set_location(&mut self, location: Location, site_id: Option<SiteId>) {
        self.location = location;
        self.site_id = site_id;
    }

    #[must_use]
    pub fn snapshot(&self) -> EditSnapshot {
        EditSnapshot {
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location,
            site_id: self.site_id,
            shapes: self.shapes.clone(),
        }
    }

    /// Replace the editable content. Identity, ownership and timestamps are untouched.
    pub fn restore(&mut self, snapshot: EditSnapshot) {
        self.title = snapshot.title;
        self.description = snapshot.description;
        self.location = snapshot.location;
        self.site_id = snapshot.site_id;
        self.shapes = snapshot.shapes;
    }

    /// True when `other` has the same blueprint and editable content.
    #[must_use]
    pub fn content_eq(&self, other: &MarkupDocument) -> bool {
        self.blueprint_image_ref == other.blueprint_image_ref && self.snapshot() == other.snapshot()
    }

    /// Check the document can be persisted.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, document-level fields first.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.blueprint_image_ref.trim().is_empty() {
            return Err(ValidationError::MissingBlueprint);
        }
        if self.location == Location::Shared && self.site_id.is_none() {
            return Err(ValidationError::MissingSiteId);
        }
        let mut seen = HashSet::with_capacity(self.shapes.len());
        for shape in &self.shapes {
            if !seen.insert(shape.id) {
                return Err(ValidationError::DuplicateShapeId(shape.id));
            }
            shape.validate()?;
        }
        Ok(())
    }
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentWire {
    #[serde(default)]
    id: Option<DocumentId>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    blueprint_image_ref: String,
    #[serde(default)]
    shapes: Vec<Shape>,
    #[serde(default)]
    shape_count: Option<usize>,
    #[serde(default)]
    location: Location,
    #[serde(default)]
    site_id: Option<SiteId>,
    created_by: UserId,
    #[serde(default)]
    is_deleted: bool,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    updated_at: Option<i64>,
}

impl TryFrom<DocumentWire> for MarkupDocument {
    type Error = ValidationError;

    fn try_from(wire: DocumentWire) -> Result<Self, Self::Error> {
        if let Some(declared) = wire.shape_count {
            if declared != wire.shapes.len() {
                return Err(ValidationError::ShapeCountMismatch { declared, actual: wire.shapes.len() });
            }
        }
        Ok(Self {
            id: wire.id,
            title: wire.title,
            description: wire.description,
            blueprint_image_ref: wire.blueprint_image_ref,
            shapes: wire.shapes,
            location: wire.location,
            site_id: wire.site_id,
            created_by: wire.created_by,
            is_deleted: wire.is_deleted,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        })
    }
}

impl From<MarkupDocument> for DocumentWire {
    fn from(doc: MarkupDocument) -> Self {
        let shape_count = Some(doc.shapes.len());
        Self {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            blueprint_image_ref: doc.blueprint_image_ref,
            shapes: doc.shapes,
            shape_count,
            location: doc.location,
            site_id: doc.site_id,
            created_by: doc.created_by,
            is_deleted: doc.is_deleted,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}
