//! Quarry application binary - composition root.
//!
//! 1. Parse CLI flags and read configuration from TOML
//! 2. Initialize tracing, then report how the configuration was resolved
//! 3. Build the embedding provider and probe it once
//! 4. Build the vector index and retrieval pipeline
//! 5. Serve the axum REST API until Ctrl-C

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quarry_api::routes;
use quarry_api::state::AppState;
use quarry_core::config::{EmbeddingConfig, QuarryConfig};
use quarry_core::error::QuarryError;
use quarry_vector::embedding::{
    DynEmbeddingService, EmbedderSettings, MockEmbedding, OllamaEmbeddingService,
    ResilientEmbedder,
};
use quarry_vector::extract::PlainTextExtractor;
use quarry_vector::{RetrievalPipeline, VectorIndex};

use crate::cli::CliArgs;

/// Where the effective configuration came from.
#[derive(Debug)]
enum ConfigSource {
    File,
    Missing,
    /// The file exists but could not be read or parsed; defaults are used.
    Invalid(QuarryError),
}

/// Read the configuration file without logging, so the outcome can be
/// reported once tracing is up.
fn load_config(path: &Path) -> (QuarryConfig, ConfigSource) {
    if !path.exists() {
        return (QuarryConfig::default(), ConfigSource::Missing);
    }
    match QuarryConfig::load(path) {
        Ok(config) => (config, ConfigSource::File),
        Err(e) => (QuarryConfig::default(), ConfigSource::Invalid(e)),
    }
}

/// Construct the embedding provider named in the config.
fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn DynEmbeddingService>, QuarryError> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockEmbedding::with_dimensions(config.dimension))),
        "ollama" => Ok(Arc::new(OllamaEmbeddingService::from_config(config)?)),
        other => Err(QuarryError::Config(format!(
            "Unknown embedding provider '{}'",
            other
        ))),
    }
}

/// Resolve once Ctrl-C is received.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C; graceful shutdown disabled");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config (flags and env layered over the file).
    let config_file = args.resolve_config_path();
    let (mut config, source) = load_config(&config_file);
    args.apply(&mut config);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Quarry v{}", env!("CARGO_PKG_VERSION"));
    match &source {
        ConfigSource::File => {
            tracing::info!(path = %config_file.display(), "Configuration loaded")
        }
        ConfigSource::Missing => {
            tracing::info!(path = %config_file.display(), "No configuration file; using defaults")
        }
        ConfigSource::Invalid(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Configuration file unreadable; using defaults"
        ),
    }

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    // Embedding provider.
    let provider = build_provider(&config.embedding)?;
    let embedder =
        ResilientEmbedder::new_dyn(provider, EmbedderSettings::from_config(&config.embedding));

    if embedder.health_check().await {
        tracing::info!(
            provider = %config.embedding.provider,
            model = %embedder.model_name(),
            "Embedding provider connected"
        );
    } else if config.embedding.fallback_enabled {
        tracing::warn!(
            base_url = %config.embedding.base_url,
            "Embedding provider unreachable; running in fallback mode"
        );
    } else {
        tracing::warn!(
            base_url = %config.embedding.base_url,
            "Embedding provider unreachable and fallback disabled; embeddings will fail until it is up"
        );
    }

    // Index and pipeline.
    let index = VectorIndex::new(config.embedding.dimension);
    tracing::info!(dimension = config.embedding.dimension, "Vector index initialized");
    let pipeline = RetrievalPipeline::new(Arc::new(index), embedder);

    let state = AppState::new(config.clone(), pipeline, PlainTextExtractor);

    if let Err(e) = routes::start_server(&config, state, shutdown_signal()).await {
        tracing::error!(error = %e, "API server failed");
        return Err(e.into());
    }

    Ok(())
}
