//! Quarry API crate - axum HTTP server and route handlers.
//!
//! Exposes the retrieval pipeline over JSON: search, raw-text and document
//! ingestion, store statistics, clearing and health checks. All routes live
//! under `/api/v1`.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
