//! Annotation primitives drawn over a blueprint.
//!
//! A [`Shape`] is a stable id plus a [`ShapeKind`] variant. On the wire the
//! variant fields are flattened next to the id and discriminated by a
//! `variant` tag (`"box"`, `"path"`, `"text"`).

#[cfg(test)]
#[path = "shape_test.rs"]
mod shape_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::ValidationError;
use crate::geometry::{Bounds, Point};

/// Unique identifier for a shape. Unique within its document only.
pub type ShapeId = Uuid;

/// Font size used to lay out text labels, in document units.
pub const TEXT_FONT_SIZE: f64 = 16.0;

/// Average glyph advance as a fraction of the font size.
pub const TEXT_CHAR_WIDTH_EM: f64 = 0.6;

/// Line height as a fraction of the font size.
pub const TEXT_LINE_HEIGHT_EM: f64 = 1.25;

/// Semantic colour classification for boxes and pen strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Gray,
    Red,
    Blue,
}

/// What a [`ColorTag`] means on a construction site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMeaning {
    /// Material staging or storage zone.
    MaterialZone,
    /// Work currently in progress.
    WorkInProgress,
    /// Work that has been completed.
    Completed,
}

impl ColorTag {
    pub const ALL: [ColorTag; 3] = [ColorTag::Gray, ColorTag::Red, ColorTag::Blue];

    #[must_use]
    pub fn meaning(self) -> TagMeaning {
        match self {
            Self::Gray => TagMeaning::MaterialZone,
            Self::Red => TagMeaning::WorkInProgress,
            Self::Blue => TagMeaning::Completed,
        }
    }

    /// CSS stroke colour for this tag.
    #[must_use]
    pub fn stroke_hex(self) -> &'static str {
        match self {
            Self::Gray => "#8A8A8A",
            Self::Red => "#D94B4B",
            Self::Blue => "#2F6FD6",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Red => "red",
            Self::Blue => "blue",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gray" => Some(Self::Gray),
            "red" => Some(Self::Red),
            "blue" => Some(Self::Blue),
            _ => None,
        }
    }
}

/// Geometry and styling of a shape, discriminated by `variant` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all_fields = "camelCase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle anchored at its top-left `origin`.
    #[serde(rename = "box")]
    Box { origin: Point, width: f64, height: f64, color_tag: ColorTag },
    /// Free-hand pen stroke.
    #[serde(rename = "path")]
    Path { points: Vec<Point>, color_tag: ColorTag },
    /// Text anchored at its top-left `origin`.
    #[serde(rename = "text")]
    TextLabel {
        origin: Point,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color_tag: Option<ColorTag>,
    },
}

/// A single annotation on a blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    #[serde(flatten)]
    pub kind: ShapeKind,
}

impl Shape {
    /// Wrap `kind` with a freshly generated id.
    #[must_use]
    pub fn new(kind: ShapeKind) -> Self {
        Self { id: Uuid::new_v4(), kind }
    }

    #[must_use]
    pub fn color_tag(&self) -> Option<ColorTag> {
        match &self.kind {
            ShapeKind::Box { color_tag, .. } | ShapeKind::Path { color_tag, .. } => Some(*color_tag),
            ShapeKind::TextLabel { color_tag, .. } => *color_tag,
        }
    }

    /// Document-space bounding box. Text uses the estimated rendered extent.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        match &self.kind {
            ShapeKind::Box { origin, width, height, .. } => {
                Bounds::from_corners(*origin, origin.offset(*width, *height))
            }
            ShapeKind::Path { points, .. } => Bounds::from_points(points.iter().copied())
                .unwrap_or_else(|| Bounds::from_corners(Point::default(), Point::default())),
            ShapeKind::TextLabel { origin, content, .. } => text_bounds(*origin, content),
        }
    }

    /// Move every coordinate of the shape by `(dx, dy)`.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        match &mut self.kind {
            ShapeKind::Box { origin, .. } | ShapeKind::TextLabel { origin, .. } => {
                *origin = origin.offset(dx, dy);
            }
            ShapeKind::Path { points, .. } => {
                for p in points.iter_mut() {
                    *p = p.offset(dx, dy);
                }
            }
        }
    }

    /// Check the shape is well-formed enough to persist.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.kind {
            ShapeKind::Box { origin, width, height, .. } => {
                if !origin.is_finite() || !width.is_finite() || !height.is_finite() {
                    return Err(ValidationError::NonFiniteCoordinate(self.id));
                }
                if *width <= 0.0 || *height <= 0.0 {
                    return Err(ValidationError::DegenerateBox(self.id));
                }
            }
            ShapeKind::Path { points, .. } => {
                if points.iter().any(|p| !p.is_finite()) {
                    return Err(ValidationError::NonFiniteCoordinate(self.id));
                }
                if points.len() < 2 {
                    return Err(ValidationError::TooFewPathPoints(self.id));
                }
            }
            ShapeKind::TextLabel { origin, content, .. } => {
                if !origin.is_finite() {
                    return Err(ValidationError::NonFiniteCoordinate(self.id));
                }
                if content.trim().is_empty() {
                    return Err(ValidationError::EmptyText(self.id));
                }
            }
        }
        Ok(())
    }
}

/// Estimated extent of `content` laid out from a top-left `origin`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn text_bounds(origin: Point, content: &str) -> Bounds {
    let longest = content.lines().map(|line| line.chars().count()).max().unwrap_or(0);
    let line_count = content.lines().count().max(1);
    let width = longest as f64 * TEXT_FONT_SIZE * TEXT_CHAR_WIDTH_EM;
    let height = line_count as f64 * TEXT_FONT_SIZE * TEXT_LINE_HEIGHT_EM;
    Bounds::from_corners(origin, origin.offset(width, height))
}
