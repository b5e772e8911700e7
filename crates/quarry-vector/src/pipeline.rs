//! Quarry retrieval pipeline.
//!
//! `RetrievalPipeline` is the only component that talks to both the
//! embedding provider and the vector store. It runs two flows:
//!
//! - ingest: (chunk,) embed, drop or replace failures, store
//! - query: embed, fuse with a caller vector, search, hydrate

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use quarry_core::error::{QuarryError, Result};
use quarry_core::types::{
    HealthStatus, IndexStats, IngestReport, Metadata, MetadataValue, PageIngestReport, Query,
    SearchResult, SearchSummary, SOURCE_KEY,
};

use crate::chunker::Chunker;
use crate::embedding::{preview, EmbeddingSource, ResilientEmbedder};
use crate::extract::ExtractedDocument;
use crate::fusion;
use crate::index::VectorStore;

pub struct RetrievalPipeline {
    store: Arc<dyn VectorStore>,
    embedder: ResilientEmbedder,
}

impl RetrievalPipeline {
    pub fn new(store: Arc<dyn VectorStore>, embedder: ResilientEmbedder) -> Self {
        if store.dimension() != embedder.dimension() {
            warn!(
                store_dims = store.dimension(),
                embedder_dims = embedder.dimension(),
                "Store and embedder dimensions differ; the store will pad/truncate"
            );
        }
        Self { store, embedder }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &ResilientEmbedder {
        &self.embedder
    }

    /// Embed and store raw texts.
    ///
    /// Texts whose embedding fails are dropped and counted; they never
    /// receive a placeholder vector. Fails with `NoValidEmbeddings` when no
    /// text survives, and with `InvalidParameters` when `texts` is empty.
    pub async fn add_documents(
        &self,
        texts: Vec<String>,
        metadata: Option<Vec<Metadata>>,
    ) -> Result<IngestReport> {
        if texts.is_empty() {
            return Err(QuarryError::InvalidParameters(
                "at least one document is required".to_string(),
            ));
        }

        let metadata = match metadata {
            Some(list) if list.len() != texts.len() => {
                return Err(QuarryError::InvalidParameters(format!(
                    "metadata has {} entries but {} documents were given",
                    list.len(),
                    texts.len()
                )));
            }
            Some(list) => list,
            None => vec![Metadata::new(); texts.len()],
        };

        let results = self.embedder.embed_batch(&texts).await;

        let mut kept_texts = Vec::with_capacity(texts.len());
        let mut kept_embeddings = Vec::with_capacity(texts.len());
        let mut kept_metadata = Vec::with_capacity(texts.len());
        let mut failed = 0;

        for ((text, meta), result) in texts.into_iter().zip(metadata).zip(results) {
            match result {
                Ok(embedding) => {
                    kept_texts.push(text);
                    kept_embeddings.push(embedding);
                    kept_metadata.push(meta);
                }
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, text = %preview(&text), "Dropping document: embedding failed");
                }
            }
        }

        if kept_texts.is_empty() {
            warn!(failed, "No valid embeddings generated");
            return Err(QuarryError::NoValidEmbeddings);
        }

        let ids = self
            .store
            .add(kept_texts, kept_embeddings, kept_metadata)?;

        info!(added = ids.len(), failed, "Documents ingested");
        Ok(IngestReport {
            added: ids.len(),
            failed,
            ids,
        })
    }

    /// Chunk, embed and store every page of an extracted document.
    ///
    /// Each chunk carries `source`, `page_number`, `chunk_index` (per page)
    /// and `total_pages` metadata. Chunks go through the single-text embed
    /// path, so with the fallback enabled no chunk is lost.
    pub async fn ingest_pages(
        &self,
        document: &ExtractedDocument,
        chunker: &Chunker,
    ) -> Result<PageIngestReport> {
        let mut texts = Vec::new();
        let mut embeddings = Vec::new();
        let mut metadata = Vec::new();
        let mut failed = 0;
        let mut fallbacks = 0;

        for page in &document.pages {
            for (chunk_index, chunk) in chunker.split(&page.text).into_iter().enumerate() {
                let embedded = match self.embedder.embed(&chunk).await {
                    Ok(embedded) => embedded,
                    Err(e) => {
                        failed += 1;
                        warn!(
                            error = %e,
                            source = %document.source,
                            page = page.page_number,
                            chunk_index,
                            "Skipping chunk: embedding failed"
                        );
                        continue;
                    }
                };
                if embedded.source == EmbeddingSource::Fallback {
                    fallbacks += 1;
                }

                let meta = Metadata::from([
                    (
                        SOURCE_KEY.to_string(),
                        MetadataValue::from(document.source.as_str()),
                    ),
                    ("page_number".to_string(), MetadataValue::from(page.page_number)),
                    ("chunk_index".to_string(), MetadataValue::from(chunk_index)),
                    (
                        "total_pages".to_string(),
                        MetadataValue::from(document.total_pages),
                    ),
                ]);
                texts.push(chunk);
                embeddings.push(embedded.vector);
                metadata.push(meta);
            }
        }

        let total_chunks = if texts.is_empty() {
            0
        } else {
            self.store.add(texts, embeddings, metadata)?.len()
        };

        info!(
            source = %document.source,
            total_pages = document.total_pages,
            total_chunks,
            failed,
            fallbacks,
            "Document ingested"
        );

        Ok(PageIngestReport {
            source: document.source.clone(),
            total_pages: document.total_pages,
            total_chunks,
            failed,
        })
    }

    /// Run a query and return hydrated results, best first.
    ///
    /// An embedding failure yields an empty result rather than an error.
    pub async fn search(&self, query: &Query) -> Result<Vec<SearchResult>> {
        query.validate()?;

        let embedded = match self.embedder.embed(&query.text).await {
            Ok(embedded) => embedded,
            Err(e) => {
                warn!(error = %e, query = %preview(&query.text), "Query embedding failed; returning no results");
                return Ok(Vec::new());
            }
        };

        let query_vector = fusion::combine(
            &embedded.vector,
            query.vector.as_deref(),
            query.weight_text,
            query.weight_custom,
        )?;

        let hits = self
            .store
            .search(&query_vector, query.top_k, query.filter.as_ref())?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.store.get(hit.id) {
                Ok(doc) => results.push(SearchResult {
                    content: doc.text,
                    similarity: hit.score,
                    metadata: doc.metadata,
                    index: hit.id,
                }),
                Err(e) => warn!(id = %hit.id, error = %e, "Dropping result: hydration failed"),
            }
        }

        debug!(
            query = %preview(&query.text),
            results = results.len(),
            fused = query.vector.as_ref().is_some_and(|v| !v.is_empty()),
            "Search completed"
        );
        Ok(results)
    }

    /// Run a query and report per-source counts and elapsed time with the
    /// results.
    pub async fn search_summary(&self, query: &Query) -> Result<SearchSummary> {
        let started = Instant::now();
        let results = self.search(query).await?;
        Ok(SearchSummary::new(results, started.elapsed()))
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.store.stats()
    }

    pub fn clear(&self) -> Result<()> {
        self.store.clear()?;
        info!("Vector store cleared");
        Ok(())
    }

    /// Map provider reachability to a health status.
    pub async fn health(&self) -> HealthStatus {
        if self.embedder.health_check().await {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }

    /// Placeholder embeddings handed out so far.
    pub fn fallback_count(&self) -> u64 {
        self.embedder.fallback_count()
    }
}
