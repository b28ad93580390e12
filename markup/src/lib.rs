//! Shared markup model: geometry, annotation shapes, and the saved document.
//!
//! This crate owns the wire representation used by the canvas engine, the
//! server, and the CLI. A [`document::MarkupDocument`] is the unit that gets
//! persisted and shared; it carries a blueprint reference and an ordered list
//! of [`shape::Shape`]s drawn on top of it.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`geometry`] | `Point`, `Bounds`, and segment distance math |
//! | [`shape`] | Annotation primitives (box, pen path, text label) and colour tags |
//! | [`document`] | `MarkupDocument`, `Location`, edit snapshots, and validation |

pub mod document;
pub mod geometry;
pub mod shape;

pub use document::{DocumentId, EditSnapshot, Location, MarkupDocument, SiteId, UserId, ValidationError};
pub use geometry::{Bounds, Point};
pub use shape::{ColorTag, Shape, ShapeId, ShapeKind};
