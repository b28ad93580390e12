//! Shared numeric constants for the canvas crate.

// ── Viewport ────────────────────────────────────────────────────

/// Scale multiplier applied by one zoom-in step (zoom-out divides by it).
pub const ZOOM_STEP: f64 = 1.2;

/// Lower zoom clamp.
pub const MIN_ZOOM: f64 = 0.1;

/// Upper zoom clamp.
pub const MAX_ZOOM: f64 = 8.0;

// ── Drawing ─────────────────────────────────────────────────────

/// Minimum screen-space spacing between consecutive recorded pen points.
pub const PEN_MIN_SPACING_PX: f64 = 3.0;

/// Stroke width for boxes and pen paths, in screen pixels.
pub const STROKE_WIDTH_PX: f64 = 2.0;

/// Fill opacity for boxes, applied on top of the tag colour.
pub const BOX_FILL_ALPHA: f64 = 0.18;

/// Text colour for labels without a colour tag.
pub const DEFAULT_TEXT_COLOR: &str = "#1F1A17";

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space slop around pen strokes when hit-testing.
pub const PATH_HIT_TOLERANCE_PX: f64 = 6.0;

/// Selection outline padding, in screen pixels.
pub const SELECTION_PADDING_PX: f64 = 4.0;

/// Selection dash segment length in screen pixels.
pub const SELECTION_DASH_PX: f64 = 4.0;

// ── History / persistence ───────────────────────────────────────

/// Maximum undo entries retained before the oldest is evicted.
pub const HISTORY_DEPTH: usize = 50;

/// Total attempts (first try included) for a save failing with a transient error.
pub const SAVE_MAX_ATTEMPTS: u32 = 3;

/// Base delay before the first save retry; doubles per attempt.
pub const SAVE_RETRY_BASE_MS: u64 = 250;
