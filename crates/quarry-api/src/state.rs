//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use quarry_core::config::QuarryConfig;
use quarry_vector::extract::PageExtractor;
use quarry_vector::RetrievalPipeline;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. The
/// configuration is read-only once the server is running.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<QuarryConfig>,
    /// Embed + store + search.
    pub pipeline: Arc<RetrievalPipeline>,
    /// Turns uploaded documents into page texts.
    pub extractor: Arc<dyn PageExtractor>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: QuarryConfig,
        pipeline: RetrievalPipeline,
        extractor: impl PageExtractor + 'static,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            extractor: Arc::new(extractor),
            start_time: Instant::now(),
        }
    }
}
