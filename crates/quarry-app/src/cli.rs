//! CLI argument definitions for the Quarry server.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use quarry_core::config::QuarryConfig;

/// Quarry - semantic search over documents.
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Address to bind the API server to.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Use the deterministic mock embedding provider instead of Ollama.
    #[arg(long = "mock-embeddings")]
    pub mock_embeddings: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > QUARRY_CONFIG env var > ~/.quarry/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("QUARRY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Layer CLI flags and `QUARRY_*` environment variables over `config`.
    pub fn apply(&self, config: &mut QuarryConfig) {
        self.apply_with_env(config, |key| std::env::var(key).ok());
    }

    fn apply_with_env(&self, config: &mut QuarryConfig, env: impl Fn(&str) -> Option<String>) {
        if let Some(host) = self.host.clone().or_else(|| env("QUARRY_HOST")) {
            config.server.host = host;
        }

        if let Some(port) = self
            .port
            .or_else(|| env("QUARRY_PORT").and_then(|v| v.parse::<u16>().ok()))
        {
            config.server.port = port;
        }

        if let Some(level) = self.log_level.clone().or_else(|| env("QUARRY_LOG_LEVEL")) {
            config.general.log_level = level;
        }

        if self.mock_embeddings {
            config.embedding.provider = "mock".to_string();
        } else if let Some(provider) = env("QUARRY_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }

        if let Some(url) = env("QUARRY_OLLAMA_URL") {
            config.embedding.base_url = url;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".quarry").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".quarry").join("config.toml");
    }
    PathBuf::from("config.toml")
}
