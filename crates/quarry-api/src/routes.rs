//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, body limits
//! and all endpoint handlers.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use quarry_core::config::QuarryConfig;
use quarry_core::error::QuarryError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let max_body = state.config.server.max_body_bytes;
    let max_upload = state.config.server.max_upload_bytes;

    let api_routes = Router::new()
        .route("/search", post(handlers::search))
        .route("/search/summary", post(handlers::search_summary))
        .route("/add-documents", post(handlers::add_documents))
        .route(
            "/upload-pdf",
            post(handlers::upload_pdf).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/store-info", get(handlers::store_info))
        .route("/stats", get(handlers::store_info))
        .route("/clear-store", post(handlers::clear_store))
        .route("/health", get(handlers::health));

    Router::new()
        .route("/", get(handlers::root))
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind to the configured address and serve until `shutdown` resolves.
pub async fn start_server<F>(
    config: &QuarryConfig,
    state: AppState,
    shutdown: F,
) -> Result<(), QuarryError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| QuarryError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| QuarryError::Api(format!("Server error: {}", e)))?;

    tracing::info!("API server stopped");
    Ok(())
}
