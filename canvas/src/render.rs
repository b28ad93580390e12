//! Rendering: draws the blueprint and its annotations to a 2D context.
//!
//! Rendering is split in two. [`build_scene`] is a pure function of the
//! session: it decides what to draw, in what order, with which colours and
//! line widths, and is fully testable natively. [`draw`] replays a [`Scene`]
//! onto a [`web_sys::CanvasRenderingContext2d`] and is the only place that
//! touches the browser. Neither mutates application state, so redrawing is
//! idempotent.
//!
//! All fallible `Canvas2D` calls propagate errors via `Result<(), JsValue>`.
//! The top-level caller ([`crate::engine::Engine::render`]) handles the result.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use markup::geometry::Bounds;
use markup::shape::{TEXT_FONT_SIZE, TEXT_LINE_HEIGHT_EM};
use markup::{ColorTag, Shape, ShapeKind};
use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

use crate::camera::{Camera, Point};
use crate::consts::{
    BOX_FILL_ALPHA, DEFAULT_TEXT_COLOR, SELECTION_DASH_PX, SELECTION_PADDING_PX, STROKE_WIDTH_PX,
};
use crate::engine::EditorSession;
use crate::input::InputState;

/// Selection outline colour.
const SELECTION_COLOR: &str = "#1E90FF";

/// One drawing instruction, in document coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// The background raster at the document origin.
    Blueprint { src: String },
    Rect { bounds: Bounds, stroke: &'static str, fill_alpha: f64, line_width: f64, dashed: bool },
    Polyline { points: Vec<Point>, stroke: &'static str, line_width: f64 },
    Text { origin: Point, lines: Vec<String>, color: &'static str, font_size: f64 },
    /// Dashed outline around the selected shape.
    Selection { bounds: Bounds, line_width: f64, dash: f64 },
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub camera: Camera,
    /// Back to front.
    pub ops: Vec<DrawOp>,
}

/// Build the frame for the current session state.
///
/// Order: blueprint, committed shapes in z-order, the live construction
/// preview, then the selection outline. Line widths and dash lengths are
/// divided by zoom so they stay constant on screen.
#[must_use]
pub fn build_scene(session: &EditorSession) -> Scene {
    let camera = session.camera();
    let doc = session.document();
    let line_width = STROKE_WIDTH_PX / camera.zoom;

    let mut ops = Vec::with_capacity(doc.shape_count() + 3);
    ops.push(DrawOp::Blueprint { src: doc.blueprint_image_ref().to_owned() });
    ops.extend(doc.shapes().iter().map(|shape| shape_op(shape, line_width)));

    match session.input() {
        InputState::DrawingBox { color_tag, anchor, current } => ops.push(DrawOp::Rect {
            bounds: Bounds::from_corners(*anchor, *current),
            stroke: color_tag.stroke_hex(),
            fill_alpha: 0.0,
            line_width,
            dashed: true,
        }),
        InputState::DrawingPath { color_tag, points } if points.len() > 1 => ops.push(DrawOp::Polyline {
            points: points.clone(),
            stroke: color_tag.stroke_hex(),
            line_width,
        }),
        _ => {}
    }

    if let Some(shape) = session.selection().and_then(|id| doc.shape(&id)) {
        let padding = camera.screen_dist_to_world(SELECTION_PADDING_PX);
        ops.push(DrawOp::Selection {
            bounds: shape.bounds().inflate(padding),
            line_width: 1.0 / camera.zoom,
            dash: SELECTION_DASH_PX / camera.zoom,
        });
    }

    Scene { camera, ops }
}

fn shape_op(shape: &Shape, line_width: f64) -> DrawOp {
    match &shape.kind {
        ShapeKind::Box { color_tag, .. } => DrawOp::Rect {
            bounds: shape.bounds(),
            stroke: color_tag.stroke_hex(),
            fill_alpha: BOX_FILL_ALPHA,
            line_width,
            dashed: false,
        },
        ShapeKind::Path { points, color_tag } => {
            DrawOp::Polyline { points: points.clone(), stroke: color_tag.stroke_hex(), line_width }
        }
        ShapeKind::TextLabel { origin, content, color_tag } => DrawOp::Text {
            origin: *origin,
            lines: content.lines().map(str::to_owned).collect(),
            color: color_tag.map_or(DEFAULT_TEXT_COLOR, ColorTag::stroke_hex),
            font_size: TEXT_FONT_SIZE,
        },
    }
}

/// Replay `scene` onto the canvas.
///
/// `viewport_w` and `viewport_h` are in CSS pixels. `dpr` is the device pixel ratio.
/// A blueprint op is skipped until the host has supplied a decoded `blueprint`.
///
/// # Errors
///
/// Returns `Err` if any `Canvas2D` call fails (e.g. invalid context state).
pub fn draw(
    ctx: &CanvasRenderingContext2d,
    scene: &Scene,
    blueprint: Option<&HtmlImageElement>,
    viewport_w: f64,
    viewport_h: f64,
    dpr: f64,
) -> Result<(), JsValue> {
    ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
    ctx.clear_rect(0.0, 0.0, viewport_w, viewport_h);
    ctx.translate(scene.camera.pan_x, scene.camera.pan_y)?;
    ctx.scale(scene.camera.zoom, scene.camera.zoom)?;

    for op in &scene.ops {
        match op {
            DrawOp::Blueprint { .. } => {
                if let Some(image) = blueprint {
                    ctx.draw_image_with_html_image_element(image, 0.0, 0.0)?;
                }
            }
            DrawOp::Rect { bounds, stroke, fill_alpha, line_width, dashed } => {
                draw_rect(ctx, bounds, stroke, *fill_alpha, *line_width, *dashed)?;
            }
            DrawOp::Polyline { points, stroke, line_width } => draw_polyline(ctx, points, stroke, *line_width),
            DrawOp::Text { origin, lines, color, font_size } => draw_text(ctx, *origin, lines, color, *font_size)?,
            DrawOp::Selection { bounds, line_width, dash } => draw_selection(ctx, bounds, *line_width, *dash)?,
        }
    }
    Ok(())
}

// =============================================================
// Op renderers
// =============================================================

fn draw_rect(
    ctx: &CanvasRenderingContext2d,
    bounds: &Bounds,
    stroke: &str,
    fill_alpha: f64,
    line_width: f64,
    dashed: bool,
) -> Result<(), JsValue> {
    ctx.save();
    if fill_alpha > 0.0 {
        ctx.set_global_alpha(fill_alpha);
        ctx.set_fill_style_str(stroke);
        ctx.fill_rect(bounds.min_x, bounds.min_y, bounds.width(), bounds.height());
        ctx.set_global_alpha(1.0);
    }
    if dashed {
        set_dash(ctx, line_width * 2.0)?;
    }
    ctx.set_stroke_style_str(stroke);
    ctx.set_line_width(line_width);
    ctx.stroke_rect(bounds.min_x, bounds.min_y, bounds.width(), bounds.height());
    ctx.restore();
    Ok(())
}

fn draw_polyline(ctx: &CanvasRenderingContext2d, points: &[Point], stroke: &str, line_width: f64) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    ctx.save();
    ctx.set_stroke_style_str(stroke);
    ctx.set_line_width(line_width);
    ctx.set_line_cap("round");
    ctx.set_line_join("round");
    ctx.begin_path();
    ctx.move_to(first.x, first.y);
    for p in rest {
        ctx.line_to(p.x, p.y);
    }
    ctx.stroke();
    ctx.restore();
}

fn draw_text(
    ctx: &CanvasRenderingContext2d,
    origin: Point,
    lines: &[String],
    color: &str,
    font_size: f64,
) -> Result<(), JsValue> {
    let line_height = font_size * TEXT_LINE_HEIGHT_EM;
    ctx.save();
    ctx.set_fill_style_str(color);
    ctx.set_text_align("left");
    ctx.set_text_baseline("top");
    ctx.set_font(&format!("{font_size}px sans-serif"));
    let mut y = origin.y;
    for line in lines {
        ctx.fill_text(line, origin.x, y)?;
        y += line_height;
    }
    ctx.restore();
    Ok(())
}

fn draw_selection(ctx: &CanvasRenderingContext2d, bounds: &Bounds, line_width: f64, dash: f64) -> Result<(), JsValue> {
    ctx.save();
    set_dash(ctx, dash)?;
    ctx.set_stroke_style_str(SELECTION_COLOR);
    ctx.set_line_width(line_width);
    ctx.stroke_rect(bounds.min_x, bounds.min_y, bounds.width(), bounds.height());
    ctx.restore();
    Ok(())
}

fn set_dash(ctx: &CanvasRenderingContext2d, dash: f64) -> Result<(), JsValue> {
    let dash_array = js_sys::Array::new();
    dash_array.push(&dash.into());
    dash_array.push(&dash.into());
    ctx.set_line_dash(&dash_array)
}
