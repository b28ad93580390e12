//! Input model: tools and the gesture state machine.
//!
//! `Tool` is the toolbar selection; it changes only through an explicit
//! `select_tool` call. `InputState` is the gesture being tracked between
//! pointer-down and pointer-up, carrying everything needed to commit (or
//! discard) the result on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use markup::{ColorTag, EditSnapshot, ShapeId};

use crate::camera::Point;
use crate::consts::ZOOM_STEP;

/// Direction of a zoom tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Scale multiplier for one step in this direction.
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Self::In => ZOOM_STEP,
            Self::Out => 1.0 / ZOOM_STEP,
        }
    }
}

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pointer / selection tool (default).
    #[default]
    Select,
    /// Drag out a box with the given tag.
    Box(ColorTag),
    /// Click to place a text label.
    Text,
    /// Free-hand pen stroke with the given tag.
    Pen(ColorTag),
    /// Zoom the viewport; never touches shapes.
    Zoom(ZoomDirection),
}

impl Tool {
    /// Every toolbar entry, in toolbar order.
    pub const TOOLBAR: [Tool; 10] = [
        Tool::Select,
        Tool::Box(ColorTag::Gray),
        Tool::Box(ColorTag::Red),
        Tool::Box(ColorTag::Blue),
        Tool::Text,
        Tool::Pen(ColorTag::Gray),
        Tool::Pen(ColorTag::Red),
        Tool::Pen(ColorTag::Blue),
        Tool::Zoom(ZoomDirection::In),
        Tool::Zoom(ZoomDirection::Out),
    ];

    /// Toolbar identifier for this tool.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Box(ColorTag::Gray) => "box-gray",
            Self::Box(ColorTag::Red) => "box-red",
            Self::Box(ColorTag::Blue) => "box-blue",
            Self::Text => "text",
            Self::Pen(ColorTag::Gray) => "pen-gray",
            Self::Pen(ColorTag::Red) => "pen-red",
            Self::Pen(ColorTag::Blue) => "pen-blue",
            Self::Zoom(ZoomDirection::In) => "zoom-in",
            Self::Zoom(ZoomDirection::Out) => "zoom-out",
        }
    }

    /// Parse a toolbar identifier. Bare `"pen"` is the red pen.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let tool = match raw {
            "select" => Self::Select,
            "text" => Self::Text,
            "pen" => Self::Pen(ColorTag::Red),
            "zoom-in" => Self::Zoom(ZoomDirection::In),
            "zoom-out" => Self::Zoom(ZoomDirection::Out),
            other => {
                let (prefix, tag) = other.split_once('-')?;
                let tag = ColorTag::parse(tag)?;
                match prefix {
                    "box" => Self::Box(tag),
                    "pen" => Self::Pen(tag),
                    _ => return None,
                }
            }
        };
        Some(tool)
    }

    /// Whether this tool constructs new shapes.
    #[must_use]
    pub fn is_drawing(self) -> bool {
        matches!(self, Self::Box(_) | Self::Text | Self::Pen(_))
    }
}

/// Internal state for the input state machine.
///
/// Each active variant carries gesture context needed to commit on pointer-up.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// Dragging on empty space with the select tool.
    Panning {
        /// Screen-space position of the previous pointer event.
        last_screen: Point,
    },
    /// Moving the selected shape.
    DraggingShape {
        /// Id of the shape being dragged.
        id: ShapeId,
        /// Document-space pointer position where the drag started.
        start_world: Point,
        /// Document-space pointer position at the previous event.
        last_world: Point,
        /// Document content before the drag, recorded on commit or restored on abandon.
        before: EditSnapshot,
    },
    /// Dragging out a new box from an anchor corner. Nothing is in the document yet.
    DrawingBox {
        /// Tag of the box being drawn.
        color_tag: ColorTag,
        /// Document-space corner where the drag started.
        anchor: Point,
        /// Document-space opposite corner (live preview).
        current: Point,
    },
    /// Recording a pen stroke. Nothing is in the document yet.
    DrawingPath {
        /// Tag of the stroke.
        color_tag: ColorTag,
        /// Throttled points recorded so far.
        points: Vec<Point>,
    },
    /// The host is showing a text prompt for a label at `origin`.
    AwaitingText {
        /// Document-space anchor for the label.
        origin: Point,
    },
}

impl InputState {
    /// Whether a gesture is between pointer-down and its resolution.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}
