//! Blueprint markup editor engine.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It owns the
//! editing side of a markup document: translating pointer events into shape
//! mutations through the tool state machine, maintaining camera state for
//! pan/zoom, hit-testing shapes, recording undo/redo history, and rendering
//! the blueprint with its annotations. The host JavaScript layer wires DOM
//! events to the engine, answers text prompts, and performs the network saves
//! that [`save::SaveQueue`] schedules.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Browser [`engine::Engine`] and testable [`engine::EditorSession`] |
//! | [`camera`] | Pan/zoom camera and coordinate conversions |
//! | [`input`] | Toolbar tools and the gesture state machine |
//! | [`hit`] | Hit-testing against shapes |
//! | [`history`] | Bounded undo/redo stacks |
//! | [`render`] | Pure scene building and `Canvas2D` replay |
//! | [`save`] | Save queueing, coalescing and retry |
//! | [`consts`] | Shared numeric constants (zoom limits, tolerances, retry budget) |

pub mod camera;
pub mod consts;
pub mod engine;
pub mod history;
pub mod hit;
pub mod input;
pub mod render;
pub mod save;
