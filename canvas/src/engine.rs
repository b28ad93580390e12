use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use markup::geometry::Bounds;
use markup::{EditSnapshot, Location, MarkupDocument, Shape, ShapeId, ShapeKind, SiteId};

use crate::camera::{Camera, Point};
use crate::consts::PEN_MIN_SPACING_PX;
use crate::history::History;
use crate::hit::hit_test;
use crate::input::{InputState, Tool};
use crate::render;

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Action {
    ShapeAdded(Shape),
    ShapeMoved { id: ShapeId, dx: f64, dy: f64 },
    ShapeDeleted { id: ShapeId },
    /// Editable content changed; the host may schedule a save.
    DocumentChanged,
    /// Show a text prompt; answer with `confirm_text` or `cancel_text`.
    TextPromptRequested { origin: Point },
    RenderNeeded,
}

/// Ephemeral editing state for one open document.
///
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
pub struct EditorSession {
    doc: MarkupDocument,
    camera: Camera,
    tool: Tool,
    selected_id: Option<ShapeId>,
    input: InputState,
    history: History<EditSnapshot>,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub dpr: f64,
}

impl EditorSession {
    #[must_use]
    pub fn new(doc: MarkupDocument) -> Self {
        Self {
            doc,
            camera: Camera::default(),
            tool: Tool::default(),
            selected_id: None,
            input: InputState::default(),
            history: History::default(),
            viewport_width: 0.0,
            viewport_height: 0.0,
            dpr: 1.0,
        }
    }

    // --- Data inputs ---

    /// Replace the open document. History, selection and any gesture are dropped.
    pub fn load_document(&mut self, doc: MarkupDocument) -> Vec<Action> {
        self.input = InputState::Idle;
        self.selected_id = None;
        self.history.clear();
        self.doc = doc;
        vec![Action::RenderNeeded]
    }

    /// Adopt the identity and timestamps the server assigned on save.
    ///
    /// Shapes and history are untouched, so edits made while the save was in
    /// flight survive. Returns false when `saved` belongs to another document.
    pub fn apply_saved(&mut self, saved: &MarkupDocument) -> bool {
        if self.doc.id.is_some() && self.doc.id != saved.id {
            return false;
        }
        self.doc.id = saved.id;
        self.doc.created_by = saved.created_by;
        self.doc.created_at = saved.created_at;
        self.doc.updated_at = saved.updated_at;
        true
    }

    /// Update viewport dimensions (CSS pixels) and device pixel ratio.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.viewport_width = width_css;
        self.viewport_height = height_css;
        self.dpr = dpr;
    }

    // --- Tool state machine ---

    /// Switch tools. An unfinished gesture is abandoned first; selecting a
    /// zoom tool applies one step around the viewport centre.
    pub fn select_tool(&mut self, tool: Tool) -> Vec<Action> {
        self.abandon_gesture();
        self.tool = tool;
        if tool != Tool::Select {
            self.selected_id = None;
        }
        if let Tool::Zoom(direction) = tool {
            let centre = Point::new(self.viewport_width * 0.5, self.viewport_height * 0.5);
            self.camera.zoom_about(centre, direction.factor());
        }
        vec![Action::RenderNeeded]
    }

    pub fn on_pointer_down(&mut self, screen_pt: Point) -> Vec<Action> {
        match self.input {
            InputState::Idle => {}
            InputState::AwaitingText { .. } => {
                tracing::debug!("text prompt superseded by pointer-down");
                self.input = InputState::Idle;
            }
            _ => return Vec::new(),
        }

        let world = self.camera.screen_to_world(screen_pt);
        match self.tool {
            Tool::Select => {
                if let Some(id) = hit_test(world, &self.doc, &self.camera) {
                    self.selected_id = Some(id);
                    self.input = InputState::DraggingShape {
                        id,
                        start_world: world,
                        last_world: world,
                        before: self.doc.snapshot(),
                    };
                } else {
                    self.selected_id = None;
                    self.input = InputState::Panning { last_screen: screen_pt };
                }
                vec![Action::RenderNeeded]
            }
            Tool::Box(color_tag) => {
                self.input = InputState::DrawingBox { color_tag, anchor: world, current: world };
                vec![Action::RenderNeeded]
            }
            Tool::Pen(color_tag) => {
                self.input = InputState::DrawingPath { color_tag, points: vec![world] };
                vec![Action::RenderNeeded]
            }
            Tool::Text => {
                self.input = InputState::AwaitingText { origin: world };
                vec![Action::TextPromptRequested { origin: world }]
            }
            Tool::Zoom(direction) => {
                if self.camera.zoom_about(screen_pt, direction.factor()) {
                    vec![Action::RenderNeeded]
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        if self.track(screen_pt) { vec![Action::RenderNeeded] } else { Vec::new() }
    }

    pub fn on_pointer_up(&mut self, screen_pt: Point) -> Vec<Action> {
        self.track(screen_pt);
        match std::mem::take(&mut self.input) {
            InputState::Idle | InputState::Panning { .. } => Vec::new(),
            InputState::AwaitingText { origin } => {
                // The prompt outlives the click that opened it.
                self.input = InputState::AwaitingText { origin };
                Vec::new()
            }
            InputState::DraggingShape { id, start_world, last_world, before } => {
                let dx = last_world.x - start_world.x;
                let dy = last_world.y - start_world.y;
                if !self.commit(before) {
                    return Vec::new();
                }
                vec![Action::ShapeMoved { id, dx, dy }, Action::DocumentChanged, Action::RenderNeeded]
            }
            InputState::DrawingBox { color_tag, anchor, current } => {
                let bounds = Bounds::from_corners(anchor, current);
                if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
                    tracing::debug!("discarded zero-area box");
                    return vec![Action::RenderNeeded];
                }
                self.tool = Tool::Select;
                self.add_shape(ShapeKind::Box {
                    origin: bounds.origin(),
                    width: bounds.width(),
                    height: bounds.height(),
                    color_tag,
                })
            }
            InputState::DrawingPath { color_tag, points } => {
                if points.len() < 2 {
                    tracing::debug!("discarded single-point stroke");
                    return vec![Action::RenderNeeded];
                }
                self.add_shape(ShapeKind::Path { points, color_tag })
            }
        }
    }

    /// Scroll the viewport by a wheel delta (CSS pixels).
    pub fn on_wheel(&mut self, dx: f64, dy: f64) -> Vec<Action> {
        if dx == 0.0 && dy == 0.0 {
            return Vec::new();
        }
        self.camera.pan_by(-dx, -dy);
        vec![Action::RenderNeeded]
    }

    /// Commit the text typed into the prompt. Blank content is discarded.
    pub fn confirm_text(&mut self, content: &str) -> Vec<Action> {
        let InputState::AwaitingText { origin } = self.input else {
            return Vec::new();
        };
        self.input = InputState::Idle;
        if content.trim().is_empty() {
            tracing::debug!("discarded empty text label");
            return vec![Action::RenderNeeded];
        }
        self.add_shape(ShapeKind::TextLabel { origin, content: content.to_owned(), color_tag: None })
    }

    pub fn cancel_text(&mut self) -> Vec<Action> {
        if !matches!(self.input, InputState::AwaitingText { .. }) {
            return Vec::new();
        }
        self.input = InputState::Idle;
        vec![Action::RenderNeeded]
    }

    // --- Committed edits ---

    pub fn undo(&mut self) -> Vec<Action> {
        self.abandon_gesture();
        match self.history.undo() {
            Some(snapshot) => self.restore(snapshot),
            None => Vec::new(),
        }
    }

    pub fn redo(&mut self) -> Vec<Action> {
        self.abandon_gesture();
        match self.history.redo() {
            Some(snapshot) => self.restore(snapshot),
            None => Vec::new(),
        }
    }

    /// Remove the selected shape.
    pub fn delete_selected(&mut self) -> Vec<Action> {
        self.abandon_gesture();
        let Some(id) = self.selected_id.take() else {
            return Vec::new();
        };
        let before = self.doc.snapshot();
        if self.doc.remove_shape(&id).is_none() {
            return vec![Action::RenderNeeded];
        }
        self.commit(before);
        vec![Action::ShapeDeleted { id }, Action::DocumentChanged, Action::RenderNeeded]
    }

    pub fn set_title(&mut self, title: &str) -> Vec<Action> {
        self.edit_metadata(|doc| title.clone_into(&mut doc.title))
    }

    pub fn set_description(&mut self, description: Option<&str>) -> Vec<Action> {
        self.edit_metadata(|doc| doc.description = description.map(str::to_owned))
    }

    /// Change the visibility scope. Saving still requires a site for `Shared`.
    pub fn set_location(&mut self, location: Location, site_id: Option<SiteId>) -> Vec<Action> {
        self.edit_metadata(|doc| doc.set_location(location, site_id))
    }

    // --- Queries ---

    #[must_use]
    pub fn document(&self) -> &MarkupDocument {
        &self.doc
    }

    /// The currently selected shape, if any.
    #[must_use]
    pub fn selection(&self) -> Option<ShapeId> {
        self.selected_id
    }

    /// The current camera state.
    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// The gesture in progress, including any live construction preview.
    #[must_use]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Internals ---

    /// Feed a pointer position to the active gesture. Returns whether anything visible changed.
    fn track(&mut self, screen_pt: Point) -> bool {
        let world = self.camera.screen_to_world(screen_pt);
        match &mut self.input {
            InputState::Idle | InputState::AwaitingText { .. } => false,
            InputState::Panning { last_screen } => {
                self.camera.pan_by(screen_pt.x - last_screen.x, screen_pt.y - last_screen.y);
                *last_screen = screen_pt;
                true
            }
            InputState::DraggingShape { id, last_world, .. } => {
                let (dx, dy) = (world.x - last_world.x, world.y - last_world.y);
                if dx == 0.0 && dy == 0.0 {
                    return false;
                }
                self.doc.translate_shape(id, dx, dy);
                *last_world = world;
                true
            }
            InputState::DrawingBox { current, .. } => {
                *current = world;
                true
            }
            InputState::DrawingPath { points, .. } => {
                let spacing = self.camera.screen_dist_to_world(PEN_MIN_SPACING_PX);
                match points.last() {
                    Some(last) if last.distance_to(world) < spacing => false,
                    _ => {
                        points.push(world);
                        true
                    }
                }
            }
        }
    }

    /// Drop an unfinished gesture. A shape being dragged goes back to where it started.
    fn abandon_gesture(&mut self) {
        match std::mem::take(&mut self.input) {
            InputState::DraggingShape { before, .. } => self.doc.restore(before),
            InputState::DrawingBox { .. } | InputState::DrawingPath { .. } | InputState::AwaitingText { .. } => {
                tracing::debug!(tool = self.tool.as_str(), "discarded unfinished shape");
            }
            InputState::Idle | InputState::Panning { .. } => {}
        }
    }

    fn add_shape(&mut self, kind: ShapeKind) -> Vec<Action> {
        let shape = Shape::new(kind);
        let before = self.doc.snapshot();
        if let Err(err) = self.doc.push_shape(shape.clone()) {
            tracing::warn!(%err, "shape rejected");
            return vec![Action::RenderNeeded];
        }
        self.commit(before);
        self.selected_id = Some(shape.id);
        vec![Action::ShapeAdded(shape), Action::DocumentChanged, Action::RenderNeeded]
    }

    fn edit_metadata(&mut self, edit: impl FnOnce(&mut MarkupDocument)) -> Vec<Action> {
        self.abandon_gesture();
        let before = self.doc.snapshot();
        edit(&mut self.doc);
        if self.commit(before) { vec![Action::DocumentChanged, Action::RenderNeeded] } else { Vec::new() }
    }

    /// Record the transition from `before` to the current content.
    fn commit(&mut self, before: EditSnapshot) -> bool {
        self.history.record(before, self.doc.snapshot())
    }

    fn restore(&mut self, snapshot: EditSnapshot) -> Vec<Action> {
        self.doc.restore(snapshot);
        if let Some(id) = self.selected_id {
            if self.doc.shape(&id).is_none() {
                self.selected_id = None;
            }
        }
        vec![Action::DocumentChanged, Action::RenderNeeded]
    }
}

/// The full canvas engine. Wraps `EditorSession` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    blueprint: Option<HtmlImageElement>,
    pub session: EditorSession,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement, doc: MarkupDocument) -> Self {
        Self { canvas, blueprint: None, session: EditorSession::new(doc) }
    }

    /// Provide the decoded blueprint image once the host has loaded it.
    pub fn set_blueprint_image(&mut self, image: HtmlImageElement) {
        self.blueprint = Some(image);
    }

    /// Resize the backing store and update the session viewport.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.canvas.set_width(backing_px(width_css, dpr));
        self.canvas.set_height(backing_px(height_css, dpr));
        self.session.set_viewport(width_css, height_css, dpr);
    }

    /// Draw the current state to the canvas.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the 2D context is unavailable or a draw call fails.
    pub fn render(&self) -> Result<(), JsValue> {
        let ctx = self
            .canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        let scene = render::build_scene(&self.session);
        render::draw(
            &ctx,
            &scene,
            self.blueprint.as_ref(),
            self.session.viewport_width,
            self.session.viewport_height,
            self.session.dpr,
        )
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn backing_px(css: f64, dpr: f64) -> u32 {
    (css * dpr).round().max(0.0) as u32
}
