//! Route handler functions for all API endpoints.
//!
//! Each handler extracts its parameters via axum extractors, calls into the
//! retrieval pipeline and returns a JSON response. Field names are part of
//! the public contract.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use quarry_core::config::SearchConfig;
use quarry_core::error::QuarryError;
use quarry_core::types::{HealthStatus, Metadata, MetadataFilter, SearchResult, SearchSummary};
use quarry_vector::Chunker;

use crate::error::ApiError;
use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    /// Optional caller-supplied vector fused with the query embedding.
    pub vectors: Option<Vec<f32>>,
    pub weight_text: Option<f32>,
    pub weight_custom: Option<f32>,
    pub top_k: Option<i64>,
    /// Restrict results to documents whose `source` equals this value.
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddDocumentsRequest {
    pub documents: Vec<String>,
    #[serde(default)]
    pub metadata: Option<Vec<Metadata>>,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: Option<String>,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub embedding_model: String,
    pub endpoints: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddDocumentsResponse {
    pub success: bool,
    pub message: String,
    pub added: usize,
    pub failed: usize,
    pub total_documents: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub total_pages: usize,
    pub total_chunks: usize,
    pub failed: usize,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreInfoResponse {
    pub total_documents: usize,
    pub embedding_dimension: usize,
    pub distinct_metadata_sources: usize,
    pub embedding_model: String,
    /// Placeholder vectors handed out since startup.
    pub fallback_embeddings: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub provider_connected: bool,
    pub embedding_model: String,
    pub total_documents: usize,
    pub uptime_secs: u64,
    pub version: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Apply the default, reject non-positive values and clamp to the maximum.
pub fn resolve_top_k(requested: Option<i64>, search: &SearchConfig) -> Result<usize, ApiError> {
    let Some(top_k) = requested else {
        return Ok(search.default_top_k.min(search.max_top_k));
    };
    if top_k <= 0 {
        return Err(ApiError::BadRequest(
            "top_k must be a positive integer".to_string(),
        ));
    }
    Ok(usize::try_from(top_k)
        .unwrap_or(usize::MAX)
        .min(search.max_top_k))
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET / - service descriptor.
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let endpoints = [
        "/api/v1/search",
        "/api/v1/search/summary",
        "/api/v1/add-documents",
        "/api/v1/upload-pdf",
        "/api/v1/store-info",
        "/api/v1/stats",
        "/api/v1/clear-store",
        "/api/v1/health",
    ];
    Json(RootResponse {
        message: "Quarry semantic search API".to_string(),
        version: VERSION.to_string(),
        embedding_model: state.pipeline.embedder().model_name().to_string(),
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
    })
}

/// Validate a search body and turn it into a pipeline query.
///
/// An empty `vectors` list is treated as absent.
pub fn build_query(
    body: SearchRequest,
    search: &SearchConfig,
) -> Result<quarry_core::types::Query, ApiError> {
    if body.query.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Field 'query' must not be empty".to_string(),
        ));
    }

    let top_k = resolve_top_k(body.top_k, search)?;

    let mut query = quarry_core::types::Query::new(body.query)
        .with_top_k(top_k)
        .with_weights(
            body.weight_text.unwrap_or(search.weight_text),
            body.weight_custom.unwrap_or(search.weight_custom),
        );
    if let Some(vector) = body.vectors.filter(|v| !v.is_empty()) {
        query = query.with_vector(vector);
    }
    if let Some(source) = body.filter.filter(|f| !f.trim().is_empty()) {
        query = query.with_filter(MetadataFilter::source(source));
    }
    Ok(query)
}

/// POST /api/v1/search - semantic search with optional vector fusion.
pub async fn search(
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
    let query = build_query(body, &state.config.search)?;
    let results = state.pipeline.search(&query).await?;
    debug!(top_k = query.top_k, results = results.len(), "Search request served");
    Ok(Json(results))
}

/// POST /api/v1/search/summary - search plus source distribution and timing.
pub async fn search_summary(
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<SearchSummary>, ApiError> {
    let query = build_query(body, &state.config.search)?;
    let summary = state.pipeline.search_summary(&query).await?;
    debug!(
        top_k = query.top_k,
        results = summary.total_chunks_found,
        sources = summary.source_distribution.len(),
        duration_ms = summary.search_duration_ms,
        "Search summary served"
    );
    Ok(Json(summary))
}

/// POST /api/v1/add-documents - embed and store raw texts.
pub async fn add_documents(
    State(state): State<AppState>,
    Json(body): Json<AddDocumentsRequest>,
) -> Result<Json<AddDocumentsResponse>, ApiError> {
    let submitted = body.documents.len();

    match state
        .pipeline
        .add_documents(body.documents, body.metadata)
        .await
    {
        Ok(report) => {
            let total_documents = state.pipeline.stats()?.total_documents;
            Ok(Json(AddDocumentsResponse {
                success: true,
                message: format!("Added {} documents", report.added),
                added: report.added,
                failed: report.failed,
                total_documents,
            }))
        }
        Err(QuarryError::NoValidEmbeddings) => {
            let total_documents = state.pipeline.stats()?.total_documents;
            Ok(Json(AddDocumentsResponse {
                success: false,
                message: QuarryError::NoValidEmbeddings.to_string(),
                added: 0,
                failed: submitted,
                total_documents,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/v1/upload-pdf - extract, chunk, embed and store a document.
pub async fn upload_pdf(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let filename = params
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Parameter 'filename' is required".to_string()))?;

    let chunker = Chunker::new(
        params.chunk_size.unwrap_or(state.config.chunking.chunk_size),
        params.overlap.unwrap_or(state.config.chunking.overlap),
    )?;

    if body.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    let document = state.extractor.extract(&filename, &body)?;
    if document.pages.is_empty() {
        warn!(filename = %filename, total_pages = document.total_pages, "Upload contains no text");
    }

    let report = state.pipeline.ingest_pages(&document, &chunker).await?;
    info!(
        filename = %filename,
        chunks = report.total_chunks,
        bytes = body.len(),
        "Upload processed"
    );

    Ok(Json(UploadResponse {
        message: format!("Processed {} successfully", filename),
        filename,
        total_pages: report.total_pages,
        total_chunks: report.total_chunks,
        failed: report.failed,
        processed_at: Utc::now(),
    }))
}

/// GET /api/v1/store-info and /api/v1/stats - corpus statistics.
pub async fn store_info(State(state): State<AppState>) -> Result<Json<StoreInfoResponse>, ApiError> {
    let stats = state.pipeline.stats()?;
    Ok(Json(StoreInfoResponse {
        total_documents: stats.total_documents,
        embedding_dimension: stats.embedding_dimension,
        distinct_metadata_sources: stats.distinct_metadata_sources,
        embedding_model: state.pipeline.embedder().model_name().to_string(),
        fallback_embeddings: state.pipeline.fallback_count(),
    }))
}

/// POST /api/v1/clear-store - drop every stored document.
pub async fn clear_store(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    state.pipeline.clear()?;
    Ok(Json(ClearResponse {
        success: true,
        message: "Vector store cleared".to_string(),
    }))
}

/// GET /api/v1/health - provider reachability and basic counters.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let status = state.pipeline.health().await;
    let total_documents = state.pipeline.stats()?.total_documents;

    Ok(Json(HealthResponse {
        status,
        provider_connected: status == HealthStatus::Healthy,
        embedding_model: state.pipeline.embedder().model_name().to_string(),
        total_documents,
        uptime_secs: state.start_time.elapsed().as_secs(),
        version: VERSION.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_config() -> SearchConfig {
        SearchConfig {
            default_top_k: 5,
            max_top_k: 20,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_resolve_top_k_default() {
        assert_eq!(resolve_top_k(None, &search_config()).unwrap(), 5);
    }

    #[test]
    fn test_resolve_top_k_clamps() {
        assert_eq!(resolve_top_k(Some(7), &search_config()).unwrap(), 7);
        assert_eq!(resolve_top_k(Some(500), &search_config()).unwrap(), 20);
    }

    #[test]
    fn test_resolve_top_k_rejects_non_positive() {
        assert!(matches!(
            resolve_top_k(Some(0), &search_config()),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            resolve_top_k(Some(-3), &search_config()),
            Err(ApiError::BadRequest(_))
        ));
    }

    fn request(json: &str) -> SearchRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_build_query_empty_vectors_ignored() {
        let query = build_query(
            request(r#"{"query": "rust", "vectors": []}"#),
            &search_config(),
        )
        .unwrap();
        assert!(query.vector.is_none());

        let query = build_query(
            request(r#"{"query": "rust", "vectors": [0.5, 0.5]}"#),
            &search_config(),
        )
        .unwrap();
        assert_eq!(query.vector, Some(vec![0.5, 0.5]));
    }

    #[test]
    fn test_build_query_rejects_blank_query() {
        assert!(matches!(
            build_query(request(r#"{"query": "  "}"#), &search_config()),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_search_request_defaults() {
        let req: SearchRequest = serde_json::from_str(r#"{"query": "rust"}"#).unwrap();
        assert_eq!(req.query, "rust");
        assert!(req.vectors.is_none());
        assert!(req.top_k.is_none());
        assert!(req.filter.is_none());
    }
}
