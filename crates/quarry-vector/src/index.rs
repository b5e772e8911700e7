//! In-memory vector index with brute-force cosine similarity search.
//!
//! `VectorIndex` is the system of record for the corpus. Search is O(n) per
//! query, which is acceptable for the corpus sizes a single process holds.
//! Anything implementing [`VectorStore`] can replace it.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use quarry_core::error::{QuarryError, Result};
use quarry_core::types::{DocumentId, IndexStats, Metadata, MetadataFilter, SOURCE_KEY};
use tracing::{debug, warn};

use crate::embedding::fit_dimension;

/// A single hit returned from a vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The ID of the matching document.
    pub id: DocumentId,
    /// Cosine similarity, in [-1, 1] for non-zero vectors.
    pub score: f64,
}

/// Text and metadata of a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub text: String,
    pub metadata: Metadata,
}

/// Lifecycle of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Populated,
}

/// Storage interface for embedded documents.
///
/// Single-writer/multi-reader: `add` and `clear` are exclusive, `search`,
/// `get` and `stats` may run concurrently.
pub trait VectorStore: Send + Sync {
    /// Insert documents and return their new ids in input order.
    ///
    /// The three inputs must have equal lengths.
    fn add(
        &self,
        texts: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadata: Vec<Metadata>,
    ) -> Result<Vec<DocumentId>>;

    /// Rank documents by cosine similarity to `query`, best first.
    ///
    /// The filter restricts candidates before ranking.
    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>>;

    fn get(&self, id: DocumentId) -> Result<StoredDocument>;

    fn stats(&self) -> Result<IndexStats>;

    /// Discard every document. The dimension is retained.
    fn clear(&self) -> Result<()>;

    /// The fixed embedding dimension D.
    fn dimension(&self) -> usize;
}

#[derive(Debug, Clone)]
struct Entry {
    id: DocumentId,
    text: String,
    embedding: Vec<f32>,
    norm: f64,
    metadata: Metadata,
}

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order.
    entries: Vec<Entry>,
    positions: HashMap<DocumentId, usize>,
    /// Never reset, so ids are not reused after `clear`.
    next_id: u64,
}

/// In-memory vector index using brute-force cosine similarity.
///
/// Thread-safe via interior RwLock; clones share the same corpus.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    inner: Arc<RwLock<Inner>>,
}

impl VectorIndex {
    /// Create a new empty index for `dimension`-component embeddings.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Return the number of documents currently stored.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn state(&self) -> Result<IndexState> {
        Ok(if self.is_empty()? {
            IndexState::Empty
        } else {
            IndexState::Populated
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| QuarryError::Storage(format!("Lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| QuarryError::Storage(format!("Lock poisoned: {}", e)))
    }

    fn conform(&self, embedding: Vec<f32>) -> Vec<f32> {
        if embedding.len() != self.dimension {
            warn!(
                expected = self.dimension,
                actual = embedding.len(),
                "Embedding padded/truncated on insertion"
            );
        }
        fit_dimension(embedding, self.dimension)
    }
}

impl VectorStore for VectorIndex {
    fn add(
        &self,
        texts: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadata: Vec<Metadata>,
    ) -> Result<Vec<DocumentId>> {
        if texts.len() != embeddings.len() || texts.len() != metadata.len() {
            return Err(QuarryError::InvalidParameters(format!(
                "texts ({}), embeddings ({}) and metadata ({}) must have equal lengths",
                texts.len(),
                embeddings.len(),
                metadata.len()
            )));
        }

        // Normalize and compute norms before taking the lock.
        let prepared: Vec<(String, Vec<f32>, f64, Metadata)> = texts
            .into_iter()
            .zip(embeddings)
            .zip(metadata)
            .map(|((text, embedding), metadata)| {
                let embedding = self.conform(embedding);
                let norm = l2_norm(&embedding);
                (text, embedding, norm, metadata)
            })
            .collect();

        let mut inner = self.write()?;
        let mut ids = Vec::with_capacity(prepared.len());
        for (text, embedding, norm, metadata) in prepared {
            let id = DocumentId::from(inner.next_id);
            inner.next_id += 1;
            let position = inner.entries.len();
            inner.entries.push(Entry {
                id,
                text,
                embedding,
                norm,
                metadata,
            });
            inner.positions.insert(id, position);
            ids.push(id);
        }

        debug!(added = ids.len(), total = inner.entries.len(), "Documents indexed");
        Ok(ids)
    }

    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(QuarryError::InvalidParameters(
                "top_k must be a positive integer".to_string(),
            ));
        }

        let query = if query.len() == self.dimension {
            query.to_vec()
        } else {
            fit_dimension(query.to_vec(), self.dimension)
        };
        let query_norm = l2_norm(&query);

        let inner = self.read()?;
        let mut scored: Vec<SearchHit> = inner
            .entries
            .iter()
            .filter(|entry| filter.map_or(true, |f| f.matches(&entry.metadata)))
            .map(|entry| SearchHit {
                id: entry.id,
                score: cosine_with_norms(&query, query_norm, &entry.embedding, entry.norm),
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    fn get(&self, id: DocumentId) -> Result<StoredDocument> {
        let inner = self.read()?;
        let entry = inner
            .positions
            .get(&id)
            .and_then(|&position| inner.entries.get(position))
            .ok_or_else(|| QuarryError::NotFound(format!("Document {} not found", id)))?;
        Ok(StoredDocument {
            text: entry.text.clone(),
            metadata: entry.metadata.clone(),
        })
    }

    fn stats(&self) -> Result<IndexStats> {
        let inner = self.read()?;
        let sources: BTreeSet<String> = inner
            .entries
            .iter()
            .filter_map(|entry| entry.metadata.get(SOURCE_KEY))
            .map(|value| value.to_string())
            .collect();
        Ok(IndexStats {
            total_documents: inner.entries.len(),
            embedding_dimension: self.dimension,
            distinct_metadata_sources: sources.len(),
        })
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.write()?;
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.positions.clear();
        debug!(removed, "Index cleared");
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt()
}

fn cosine_with_norms(a: &[f32], norm_a: f64, b: &[f32], norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    dot / (norm_a * norm_b)
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    cosine_with_norms(a, l2_norm(a), b, l2_norm(b))
}
