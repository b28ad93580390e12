//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the document store behind a trait object so the same handlers
//! run against Postgres in production and the in-memory store in tests.

use std::sync::Arc;

use crate::config::RetryConfig;
use crate::services::store::MarkupStore;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; the store is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarkupStore>,
    /// Retry budget for transient store failures.
    pub retry: RetryConfig,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn MarkupStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
