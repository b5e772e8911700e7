use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};

/// Default weight applied to the text-derived embedding during query fusion.
pub const DEFAULT_WEIGHT_TEXT: f32 = 0.7;

/// Default weight applied to the caller-supplied vector during query fusion.
pub const DEFAULT_WEIGHT_CUSTOM: f32 = 0.3;

/// Default number of results returned by a query.
pub const DEFAULT_TOP_K: usize = 5;

/// Metadata key holding the originating file or document name.
pub const SOURCE_KEY: &str = "source";

// =============================================================================
// Identifiers and metadata
// =============================================================================

/// Opaque identifier of a document stored in a vector index.
///
/// Assigned by the index at insertion from a monotonically increasing
/// sequence. Serialized as a plain integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Return the raw sequence number.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for DocumentId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scalar metadata value.
///
/// Untagged so JSON callers send plain scalars (`"a.pdf"`, `3`, `0.5`, `true`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Return the string payload, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Return the integer payload, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Integer(n) => write!(f, "{}", n),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Metadata attached to a document: string keys to scalar values.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Exact-match predicate on a single metadata key.
///
/// A document that lacks the key never matches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub key: String,
    pub value: MetadataValue,
}

impl MetadataFilter {
    pub fn new(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Match documents whose `source` metadata equals `name`.
    pub fn source(name: impl Into<String>) -> Self {
        Self::new(SOURCE_KEY, MetadataValue::Text(name.into()))
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        metadata.get(&self.key) == Some(&self.value)
    }
}

// =============================================================================
// Queries and results
// =============================================================================

/// A semantic search request.
///
/// Built per request; carries no shared state with the index.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// Free text that is embedded by the provider.
    pub text: String,
    /// Optional caller-supplied vector fused with the text embedding.
    pub vector: Option<Vec<f32>>,
    pub weight_text: f32,
    pub weight_custom: f32,
    /// Maximum number of results (must be positive).
    pub top_k: usize,
    pub filter: Option<MetadataFilter>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            vector: None,
            weight_text: DEFAULT_WEIGHT_TEXT,
            weight_custom: DEFAULT_WEIGHT_CUSTOM,
            top_k: DEFAULT_TOP_K,
            filter: None,
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_weights(mut self, weight_text: f32, weight_custom: f32) -> Self {
        self.weight_text = weight_text;
        self.weight_custom = weight_custom;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Reject parameters that can never produce a meaningful search.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(QuarryError::InvalidParameters(
                "top_k must be a positive integer".to_string(),
            ));
        }
        if !self.weight_text.is_finite() || !self.weight_custom.is_finite() {
            return Err(QuarryError::InvalidParameters(format!(
                "fusion weights must be finite (got {}, {})",
                self.weight_text, self.weight_custom
            )));
        }
        Ok(())
    }
}

/// A single ranked search result, hydrated with the document content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    /// Cosine similarity, conceptually in [-1, 1]; not clamped.
    pub similarity: f64,
    pub metadata: Metadata,
    /// Identifier of the matching document.
    pub index: DocumentId,
}

/// Bucket for results whose metadata carries no `source`.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Ranked results plus how they spread across sources and how long the
/// search took.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub results: Vec<SearchResult>,
    pub total_chunks_found: usize,
    /// Result count per `source` metadata value.
    pub source_distribution: BTreeMap<String, usize>,
    pub search_duration_ms: f64,
}

impl SearchSummary {
    pub fn new(results: Vec<SearchResult>, elapsed: Duration) -> Self {
        let mut source_distribution = BTreeMap::new();
        for result in &results {
            let source = result
                .metadata
                .get(SOURCE_KEY)
                .map(|value| value.to_string())
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
            *source_distribution.entry(source).or_insert(0) += 1;
        }
        Self {
            total_chunks_found: results.len(),
            results,
            source_distribution,
            search_duration_ms: (elapsed.as_secs_f64() * 100_000.0).round() / 100.0,
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Corpus statistics for a vector index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: usize,
    pub embedding_dimension: usize,
    /// Number of distinct `source` metadata values.
    pub distinct_metadata_sources: usize,
}

/// Outcome of raw-text ingestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub added: usize,
    pub failed: usize,
    pub ids: Vec<DocumentId>,
}

/// Outcome of paged (long-document) ingestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageIngestReport {
    pub source: String,
    pub total_pages: usize,
    pub total_chunks: usize,
    pub failed: usize,
}

/// Service health as reported to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Embedding provider reachable.
    Healthy,
    /// Embedding provider unreachable; placeholder embeddings are in use.
    Degraded,
}
