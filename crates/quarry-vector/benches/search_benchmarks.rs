//! Benchmarks for index search and the full query pipeline.
//!
//! Uses 1,000 chunks by default. Set `BENCH_FULL_SCALE=1` to run against
//! 100,000 chunks:
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p quarry-vector
//! ```

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use quarry_core::types::{Metadata, MetadataFilter, MetadataValue, Query};
use quarry_vector::embedding::{EmbedderSettings, EmbeddingService, MockEmbedding, ResilientEmbedder};
use quarry_vector::index::{VectorIndex, VectorStore};
use quarry_vector::pipeline::RetrievalPipeline;

const CI_CHUNK_COUNT: usize = 1_000;
const FULL_SCALE_CHUNK_COUNT: usize = 100_000;
const DIMENSIONS: usize = 384;

fn generate_chunk_text(index: usize) -> String {
    format!(
        "Vector databases store embeddings alongside the source text and answer \
         nearest-neighbour queries by cosine similarity. Documents are split into \
         overlapping chunks before embedding so that each span fits the model \
         context. Chunk identifier: {}",
        index
    )
}

fn chunk_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_CHUNK_COUNT
    } else {
        CI_CHUNK_COUNT
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

/// Build an index populated with `count` chunks spread over three sources.
fn build_populated_index(count: usize) -> VectorIndex {
    let index = VectorIndex::new(DIMENSIONS);
    let embedder = MockEmbedding::with_dimensions(DIMENSIONS);
    let rt = runtime();

    let mut texts = Vec::with_capacity(count);
    let mut embeddings = Vec::with_capacity(count);
    let mut metadata = Vec::with_capacity(count);
    for i in 0..count {
        let text = generate_chunk_text(i);
        embeddings.push(rt.block_on(embedder.embed(&text)).expect("embed failed"));
        texts.push(text);
        let source = ["a.pdf", "b.pdf", "c.pdf"][i % 3];
        metadata.push(Metadata::from([
            ("source".to_string(), MetadataValue::from(source)),
            ("chunk_index".to_string(), MetadataValue::from(i)),
        ]));
    }
    index.add(texts, embeddings, metadata).expect("add failed");

    assert_eq!(index.len().unwrap(), count, "Index should contain all inserted chunks");
    index
}

fn bench_index_search(c: &mut Criterion) {
    let count = chunk_count();
    let index = build_populated_index(count);
    let rt = runtime();
    let query_vec = rt
        .block_on(MockEmbedding::with_dimensions(DIMENSIONS).embed("cosine similarity queries"))
        .expect("query embed failed");
    let filter = MetadataFilter::source("b.pdf");

    let mut group = c.benchmark_group("index_search");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function(format!("top10_{}chunks", count), |b| {
        b.iter(|| {
            let hits = index.search(&query_vec, 10, None).expect("search failed");
            assert!(!hits.is_empty(), "Search should return results");
            hits
        });
    });

    group.bench_function(format!("filtered_top10_{}chunks", count), |b| {
        b.iter(|| index.search(&query_vec, 10, Some(&filter)).expect("search failed"));
    });

    group.finish();
}

fn bench_pipeline_search(c: &mut Criterion) {
    let count = chunk_count();
    let index = build_populated_index(count);
    let pipeline = RetrievalPipeline::new(
        Arc::new(index),
        ResilientEmbedder::new(
            MockEmbedding::with_dimensions(DIMENSIONS),
            EmbedderSettings::new(DIMENSIONS),
        ),
    );
    let rt = runtime();

    let mut group = c.benchmark_group("pipeline_search");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function(format!("text_top10_{}chunks", count), |b| {
        let query = Query::new("overlapping chunks").with_top_k(10);
        b.iter(|| rt.block_on(pipeline.search(&query)).expect("search failed"));
    });

    group.bench_function(format!("fused_top10_{}chunks", count), |b| {
        let query = Query::new("overlapping chunks")
            .with_vector(vec![0.05; DIMENSIONS])
            .with_top_k(10);
        b.iter(|| rt.block_on(pipeline.search(&query)).expect("search failed"));
    });

    group.finish();
}

criterion_group!(benches, bench_index_search, bench_pipeline_search);
criterion_main!(benches);
