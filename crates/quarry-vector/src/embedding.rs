//! Embedding service trait and implementations.
//!
//! - `OllamaEmbeddingService` calls a local Ollama server over HTTP. This is
//!   the production embedding backend.
//! - `MockEmbedding` provides deterministic hash-based vectors for testing,
//!   with fixed-vector overrides and failure injection.
//! - `ResilientEmbedder` wraps either one and enforces the index dimension,
//!   a per-call timeout and the placeholder-vector fallback.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quarry_core::config::EmbeddingConfig;
use quarry_core::error::{QuarryError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Service for generating text embeddings.
///
/// Implementations convert text into fixed-dimensional vectors that capture
/// semantic meaning. Used for both ingestion (indexing) and search (query).
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> impl std::future::Future<Output = Result<Vec<f32>>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;

    /// Name of the model behind this service, for diagnostics.
    fn model_name(&self) -> &str;

    /// Report whether the backing provider is reachable.
    fn health_check(&self) -> impl std::future::Future<Output = bool> + Send {
        async { true }
    }
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// Because `EmbeddingService::embed` returns `impl Future` it is not
/// object-safe. This trait uses boxed futures instead, allowing
/// `Arc<dyn DynEmbeddingService>` to be stored in structs without generics.
///
/// A blanket implementation is provided so that every `EmbeddingService`
/// automatically implements `DynEmbeddingService`.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>>> + Send + 'a>>;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;

    /// Name of the model behind this service.
    fn model_name(&self) -> &str;

    /// Report provider reachability (boxed future).
    fn health_check_boxed(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + '_>>;
}

/// Blanket impl: any `EmbeddingService` automatically implements `DynEmbeddingService`.
impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }

    fn model_name(&self) -> &str {
        EmbeddingService::model_name(self)
    }

    fn health_check_boxed(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + '_>> {
        Box::pin(self.health_check())
    }
}

// ---------------------------------------------------------------------------
// OllamaEmbeddingService - HTTP client for a local Ollama server
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Ollama-backed embedding service.
///
/// Calls `POST {base_url}/api/embeddings` once per text; Ollama has no batch
/// endpoint for this API. Reachability is probed with `GET {base_url}/api/tags`.
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingService {
    base_url: String,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OllamaEmbeddingService {
    /// Create a client for the given server and model.
    ///
    /// `dimensions` is the expected output size of the model; the provider is
    /// not trusted to honor it.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuarryError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
            client,
        })
    }

    /// Build a service from the `[embedding]` config section.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.model.clone(),
            config.dimension,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl EmbeddingService for OllamaEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(self.endpoint("api/embeddings"))
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuarryError::ProviderUnavailable(format!("Ollama request timed out: {}", e))
                } else {
                    QuarryError::ProviderUnavailable(format!("Ollama request failed: {}", e))
                }
            })?;

        let response = response.error_for_status().map_err(|e| {
            QuarryError::ProviderUnavailable(format!("Ollama returned an error status: {}", e))
        })?;

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            QuarryError::ProviderUnavailable(format!("Invalid Ollama response: {}", e))
        })?;

        if body.embedding.is_empty() {
            return Err(QuarryError::ProviderUnavailable(
                "Ollama returned an empty embedding".to_string(),
            ));
        }

        debug!(model = %self.model, dims = body.embedding.len(), "Ollama embedding received");
        Ok(body.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.endpoint("api/tags")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Ollama health check failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hash-based vectors for testing
// ---------------------------------------------------------------------------

/// Mock embedding service that returns deterministic vectors.
///
/// The output is derived from a hash of the input text, so identical inputs
/// always produce identical outputs. Specific texts can be pinned to fixed
/// vectors or made to fail, which lets tests drive ranking and failure paths
/// without a real model.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
    fixed: HashMap<String, Vec<f32>>,
    failing: HashSet<String>,
    available: bool,
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::with_dimensions(384)
    }
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            fixed: HashMap::new(),
            failing: HashSet::new(),
            available: true,
        }
    }

    /// Return `vector` verbatim whenever `text` is embedded.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.into(), vector);
        self
    }

    /// Fail whenever `text` is embedded.
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing.insert(text.into());
        self
    }

    /// Simulate an unreachable provider: every call fails.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn hash_to_vector(text: &str, dimensions: usize) -> Vec<f32> {
        let mut result = Vec::with_capacity(dimensions);
        for i in 0..dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        // L2-normalize to produce unit vectors like a sentence-transformer.
        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if !self.available {
            return Err(QuarryError::ProviderUnavailable(
                "mock provider offline".to_string(),
            ));
        }
        if text.is_empty() {
            return Err(QuarryError::ProviderUnavailable(
                "Cannot embed empty text".to_string(),
            ));
        }
        if self.failing.contains(text) {
            return Err(QuarryError::ProviderUnavailable(format!(
                "mock failure for '{}'",
                text
            )));
        }
        if let Some(vector) = self.fixed.get(text) {
            return Ok(vector.clone());
        }
        Ok(Self::hash_to_vector(text, self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> bool {
        self.available
    }
}

// ---------------------------------------------------------------------------
// ResilientEmbedder - dimension, timeout and fallback policy
// ---------------------------------------------------------------------------

/// Policy knobs for [`ResilientEmbedder`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedderSettings {
    /// Index dimension D.
    pub dimension: usize,
    /// Upper bound on a single provider call.
    pub timeout: Duration,
    /// Truncate input to this many characters (0 = no limit).
    pub max_input_chars: usize,
    pub fallback_enabled: bool,
    pub fallback_value: f32,
}

impl EmbedderSettings {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            timeout: Duration::from_secs(30),
            max_input_chars: 0,
            fallback_enabled: true,
            fallback_value: 0.1,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            dimension: config.dimension,
            timeout: Duration::from_secs(config.timeout_secs),
            max_input_chars: config.max_input_chars,
            fallback_enabled: config.fallback_enabled,
            fallback_value: config.fallback_value,
        }
    }
}

/// Where an embedding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingSource {
    Provider,
    /// Constant placeholder substituted after a provider failure.
    Fallback,
}

/// A dimension-correct embedding tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedded {
    pub vector: Vec<f32>,
    pub source: EmbeddingSource,
}

/// Wraps an embedding provider with the service's availability policy.
///
/// Every vector it hands out has exactly `settings.dimension` components.
/// The single-text [`embed`](Self::embed) substitutes a placeholder on
/// failure when the fallback is enabled; [`embed_batch`](Self::embed_batch)
/// never does and reports per-item failures instead.
pub struct ResilientEmbedder {
    provider: Arc<dyn DynEmbeddingService>,
    settings: EmbedderSettings,
    fallback_count: AtomicU64,
}

impl ResilientEmbedder {
    pub fn new(provider: impl EmbeddingService + 'static, settings: EmbedderSettings) -> Self {
        Self::new_dyn(Arc::new(provider), settings)
    }

    pub fn new_dyn(provider: Arc<dyn DynEmbeddingService>, settings: EmbedderSettings) -> Self {
        if provider.dimensions() != settings.dimension {
            warn!(
                provider_dims = provider.dimensions(),
                index_dims = settings.dimension,
                "Provider dimension differs from index dimension; vectors will be padded or truncated"
            );
        }
        Self {
            provider,
            settings,
            fallback_count: AtomicU64::new(0),
        }
    }

    pub fn dimension(&self) -> usize {
        self.settings.dimension
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn settings(&self) -> &EmbedderSettings {
        &self.settings
    }

    /// Number of placeholder vectors handed out since construction.
    pub fn fallback_count(&self) -> u64 {
        self.fallback_count.load(Ordering::Relaxed)
    }

    /// The constant placeholder used in degraded mode.
    pub fn fallback_vector(&self) -> Vec<f32> {
        vec![self.settings.fallback_value; self.settings.dimension]
    }

    /// Embed one text, returning an error instead of a placeholder.
    pub async fn embed_strict(&self, text: &str) -> Result<Vec<f32>> {
        let input = truncate_chars(text, self.settings.max_input_chars);

        let raw = match tokio::time::timeout(self.settings.timeout, self.provider.embed_boxed(input))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(QuarryError::ProviderUnavailable(format!(
                    "embedding timed out after {:?}",
                    self.settings.timeout
                )))
            }
        };

        if raw.is_empty() {
            return Err(QuarryError::ProviderUnavailable(
                "provider returned an empty embedding".to_string(),
            ));
        }

        if raw.len() != self.settings.dimension {
            let mismatch = QuarryError::DimensionMismatch {
                expected: self.settings.dimension,
                actual: raw.len(),
            };
            warn!(error = %mismatch, "Embedding padded/truncated to index dimension");
        }

        Ok(fit_dimension(raw, self.settings.dimension))
    }

    /// Embed one text, substituting the placeholder vector on failure when
    /// the fallback is enabled.
    pub async fn embed(&self, text: &str) -> Result<Embedded> {
        match self.embed_strict(text).await {
            Ok(vector) => Ok(Embedded {
                vector,
                source: EmbeddingSource::Provider,
            }),
            Err(e) if self.settings.fallback_enabled => {
                self.fallback_count.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    text = %preview(text),
                    "Embedding failed; using fallback placeholder vector"
                );
                Ok(Embedded {
                    vector: self.fallback_vector(),
                    source: EmbeddingSource::Fallback,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Embed each text independently. One failure does not affect the others.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed_strict(text).await);
        }
        results
    }

    /// Probe the provider, bounded by the configured timeout.
    pub async fn health_check(&self) -> bool {
        tokio::time::timeout(self.settings.timeout, self.provider.health_check_boxed())
            .await
            .unwrap_or(false)
    }
}

/// Pad with zeros or truncate so `vector` has exactly `dimension` components.
pub fn fit_dimension(mut vector: Vec<f32>, dimension: usize) -> Vec<f32> {
    vector.resize(dimension, 0.0);
    vector
}

/// Truncate `text` to at most `max_chars` characters (0 = unlimited).
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return text;
    }
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Short single-line excerpt of `text` for log messages.
pub(crate) fn preview(text: &str) -> String {
    let excerpt = truncate_chars(text, 50);
    if excerpt.len() < text.len() {
        format!("{}...", excerpt)
    } else {
        excerpt.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowEmbedding;

    impl EmbeddingService for SlowEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![1.0; 4])
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    fn settings(dimension: usize) -> EmbedderSettings {
        EmbedderSettings {
            timeout: Duration::from_millis(200),
            ..EmbedderSettings::new(dimension)
        }
    }

    #[tokio::test]
    async fn test_mock_embedding_dimension() {
        let service = MockEmbedding::new();
        let vec = service.embed("hello world").await.unwrap();
        assert_eq!(vec.len(), 384);
        assert_eq!(EmbeddingService::dimensions(&service), 384);
    }

    #[tokio::test]
    async fn test_mock_embedding_deterministic() {
        let service = MockEmbedding::with_dimensions(16);
        let v1 = service.embed("same text").await.unwrap();
        let v2 = service.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_mock_embedding_different_inputs() {
        let service = MockEmbedding::new();
        let v1 = service.embed("text one").await.unwrap();
        let v2 = service.embed("text two").await.unwrap();
        assert_ne!(v1, v2);
    }

    #[tokio::test]
    async fn test_mock_embedding_empty_text() {
        let service = MockEmbedding::new();
        assert!(service.embed("").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_fixed_vector_and_failure() {
        let service = MockEmbedding::with_dimensions(3)
            .with_vector("pinned", vec![1.0, 0.0, 0.0])
            .failing_on("broken");
        assert_eq!(service.embed("pinned").await.unwrap(), vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            service.embed("broken").await,
            Err(QuarryError::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_unavailable() {
        let service = MockEmbedding::new().unavailable();
        assert!(service.embed("anything").await.is_err());
        assert!(!service.health_check().await);
    }

    #[test]
    fn test_fit_dimension_pads_and_truncates() {
        assert_eq!(fit_dimension(vec![1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(fit_dimension(vec![1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
        assert_eq!(fit_dimension(vec![1.0], 1), vec![1.0]);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "abc");
    }

    #[tokio::test]
    async fn test_resilient_pads_short_provider_vectors() {
        let provider = MockEmbedding::with_dimensions(2).with_vector("short", vec![0.5, 0.5]);
        let embedder = ResilientEmbedder::new(provider, settings(4));
        let vector = embedder.embed_strict("short").await.unwrap();
        assert_eq!(vector, vec![0.5, 0.5, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_resilient_truncates_long_provider_vectors() {
        let provider = MockEmbedding::with_dimensions(8);
        let embedder = ResilientEmbedder::new(provider, settings(3));
        let vector = embedder.embed_strict("long").await.unwrap();
        assert_eq!(vector.len(), 3);
    }

    #[tokio::test]
    async fn test_resilient_fallback_on_failure() {
        let provider = MockEmbedding::with_dimensions(4).unavailable();
        let embedder = ResilientEmbedder::new(provider, settings(4));

        let embedded = embedder.embed("query").await.unwrap();
        assert_eq!(embedded.source, EmbeddingSource::Fallback);
        assert_eq!(embedded.vector, vec![0.1; 4]);
        assert_eq!(embedder.fallback_count(), 1);

        embedder.embed("again").await.unwrap();
        assert_eq!(embedder.fallback_count(), 2);
    }

    #[tokio::test]
    async fn test_resilient_fallback_disabled_propagates() {
        let provider = MockEmbedding::with_dimensions(4).unavailable();
        let embedder = ResilientEmbedder::new(
            provider,
            EmbedderSettings {
                fallback_enabled: false,
                ..settings(4)
            },
        );
        let err = embedder.embed("query").await.unwrap_err();
        assert!(matches!(err, QuarryError::ProviderUnavailable(_)));
        assert_eq!(embedder.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_resilient_provider_success_is_not_fallback() {
        let embedder = ResilientEmbedder::new(MockEmbedding::with_dimensions(4), settings(4));
        let embedded = embedder.embed("fine").await.unwrap();
        assert_eq!(embedded.source, EmbeddingSource::Provider);
        assert_eq!(embedder.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_resilient_timeout_engages_fallback() {
        let embedder = ResilientEmbedder::new(SlowEmbedding, settings(4));

        assert!(matches!(
            embedder.embed_strict("slow").await,
            Err(QuarryError::ProviderUnavailable(_))
        ));

        let embedded = embedder.embed("slow").await.unwrap();
        assert_eq!(embedded.source, EmbeddingSource::Fallback);
    }

    #[tokio::test]
    async fn test_resilient_batch_is_per_item() {
        let provider = MockEmbedding::with_dimensions(4).failing_on("b");
        let embedder = ResilientEmbedder::new(provider, settings(4));

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = embedder.embed_batch(&texts).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        // Batch failures are reported, never papered over.
        assert_eq!(embedder.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_resilient_truncates_input_text() {
        let provider = MockEmbedding::with_dimensions(3).with_vector("abc", vec![0.0, 0.0, 1.0]);
        let embedder = ResilientEmbedder::new(
            provider,
            EmbedderSettings {
                max_input_chars: 3,
                ..settings(3)
            },
        );
        let vector = embedder.embed_strict("abcdef").await.unwrap();
        assert_eq!(vector, vec![0.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_resilient_health_check() {
        let up = ResilientEmbedder::new(MockEmbedding::new(), settings(384));
        let down = ResilientEmbedder::new(MockEmbedding::new().unavailable(), settings(384));
        assert!(up.health_check().await);
        assert!(!down.health_check().await);
    }

    #[test]
    fn test_settings_from_config() {
        let config = EmbeddingConfig::default();
        let settings = EmbedderSettings::from_config(&config);
        assert_eq!(settings.dimension, 768);
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert!(settings.fallback_enabled);
    }

    #[test]
    fn test_ollama_endpoint_joins_paths() {
        let service = OllamaEmbeddingService::new(
            "http://localhost:11434/",
            "nomic-embed-text",
            768,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            service.endpoint("api/embeddings"),
            "http://localhost:11434/api/embeddings"
        );
        assert_eq!(EmbeddingService::model_name(&service), "nomic-embed-text");
    }

    #[tokio::test]
    async fn test_ollama_unreachable_is_provider_unavailable() {
        // Port 9 (discard) on localhost is not an HTTP server.
        let service = OllamaEmbeddingService::new(
            "http://127.0.0.1:9",
            "nomic-embed-text",
            768,
            Duration::from_millis(500),
        )
        .unwrap();
        let err = service.embed("hello").await.unwrap_err();
        assert!(matches!(err, QuarryError::ProviderUnavailable(_)));
        assert!(!service.health_check().await);
    }
}
