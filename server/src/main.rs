mod config;
mod db;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::store::{MarkupStore, MemoryMarkupStore, PgMarkupStore};

#[tokio::main]
async fn main() {
    // A missing .env is normal in production.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env();

    let store: Arc<dyn MarkupStore> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections)
                .await
                .expect("database init failed");
            tracing::info!(max_connections = config.db_max_connections, "postgres markup store ready");
            Arc::new(PgMarkupStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; documents are kept in memory and lost on restart");
            Arc::new(MemoryMarkupStore::new())
        }
    };

    let state = state::AppState::new(store, config.store_retry);

    let app = routes::app(state);
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, attempts = config.store_retry.attempts, "markup server listening");
    axum::serve(listener, app).await.expect("server failed");
}
