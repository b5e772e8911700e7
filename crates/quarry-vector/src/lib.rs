//! Quarry Vector crate - embedding adapters, chunking, vector index, query
//! fusion, page extraction and the retrieval pipeline.
//!
//! The [`RetrievalPipeline`] ties the pieces together: it embeds through a
//! [`ResilientEmbedder`], stores into any [`VectorStore`] and ranks by cosine
//! similarity. Tests use [`MockEmbedding`]; production uses
//! [`OllamaEmbeddingService`].

pub mod chunker;
pub mod embedding;
pub mod extract;
pub mod fusion;
pub mod index;
pub mod pipeline;

pub use chunker::Chunker;
pub use embedding::{
    DynEmbeddingService, EmbedderSettings, EmbeddingService, MockEmbedding,
    OllamaEmbeddingService, ResilientEmbedder,
};
pub use extract::{ExtractedDocument, PageExtractor, PageText, PlainTextExtractor};
pub use index::{SearchHit, StoredDocument, VectorIndex, VectorStore};
pub use pipeline::RetrievalPipeline;
