//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the markup document REST endpoints and a health check
//! under a single Axum router. Identity comes from upstream headers, see
//! [`auth`].

pub mod auth;
pub mod documents;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full HTTP surface.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/markup-documents", get(documents::list_documents).post(documents::save_document))
        .route(
            "/markup-documents/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
