use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{QuarryError, Result};

/// Embedding providers the binary knows how to construct.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "mock"];

/// Top-level configuration for the Quarry service.
///
/// Loaded from `~/.quarry/config.toml` by default. Every section falls back
/// to its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarryConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

impl QuarryConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: QuarryConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let emb = &self.embedding;
        if emb.dimension == 0 {
            return Err(QuarryError::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }
        if emb.timeout_secs == 0 {
            return Err(QuarryError::Config(
                "embedding.timeout_secs must be positive".to_string(),
            ));
        }
        if !KNOWN_PROVIDERS.contains(&emb.provider.as_str()) {
            return Err(QuarryError::Config(format!(
                "Unknown embedding.provider '{}'. Must be one of: {}",
                emb.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }
        if !emb.fallback_value.is_finite() {
            return Err(QuarryError::Config(
                "embedding.fallback_value must be finite".to_string(),
            ));
        }

        let search = &self.search;
        if search.default_top_k == 0 || search.default_top_k > search.max_top_k {
            return Err(QuarryError::Config(format!(
                "search.default_top_k must be in 1..={} (got {})",
                search.max_top_k, search.default_top_k
            )));
        }
        if !search.weight_text.is_finite() || !search.weight_custom.is_finite() {
            return Err(QuarryError::Config(
                "search weights must be finite".to_string(),
            ));
        }

        let chunking = &self.chunking;
        if chunking.chunk_size == 0 || chunking.overlap >= chunking.chunk_size {
            return Err(QuarryError::Config(format!(
                "chunking requires 0 <= overlap < chunk_size (got overlap {}, chunk_size {})",
                chunking.overlap, chunking.chunk_size
            )));
        }

        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Request body limit for JSON routes, in bytes.
    pub max_body_bytes: usize,
    /// Request body limit for document uploads, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_body_bytes: 1024 * 1024,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider: "ollama" or "mock".
    pub provider: String,
    /// Model name passed to the provider.
    pub model: String,
    /// Provider base URL.
    pub base_url: String,
    /// Index dimension D. Provider output is padded or truncated to this.
    pub dimension: usize,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Truncate input text to this many characters before embedding (0 = off).
    pub max_input_chars: usize,
    /// Substitute a placeholder vector when the provider fails.
    pub fallback_enabled: bool,
    /// Constant component value of the placeholder vector.
    pub fallback_value: f32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            base_url: "http://localhost:11434".to_string(),
            dimension: 768,
            timeout_secs: 30,
            max_input_chars: 0,
            fallback_enabled: true,
            fallback_value: 0.1,
        }
    }
}

/// Query defaults and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned when the caller does not say.
    pub default_top_k: usize,
    /// Upper bound applied to caller-supplied top_k.
    pub max_top_k: usize,
    /// Default fusion weight for the text embedding.
    pub weight_text: f32,
    /// Default fusion weight for the caller-supplied vector.
    pub weight_custom: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 100,
            weight_text: 0.7,
            weight_custom: 0.3,
        }
    }
}

/// Default word-window parameters for long-document ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per chunk.
    pub chunk_size: usize,
    /// Words shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = QuarryConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.embedding.dimension, 768);
        assert!(config.embedding.fallback_enabled);
        assert!((config.embedding.fallback_value - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.search.default_top_k, 5);
        assert_eq!(config.search.max_top_k, 100);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[server]
host = "0.0.0.0"
port = 9100

[embedding]
provider = "mock"
model = "all-minilm"
dimension = 384
timeout_secs = 5
max_input_chars = 1000
fallback_enabled = false

[search]
default_top_k = 3
max_top_k = 50
weight_text = 0.5
weight_custom = 0.5

[chunking]
chunk_size = 200
overlap = 20
"#;
        let file = create_temp_config(content);
        let config = QuarryConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.max_body_bytes, 1024 * 1024);
        assert_eq!(config.embedding.provider, "mock");
        assert_eq!(config.embedding.model, "all-minilm");
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.embedding.timeout_secs, 5);
        assert_eq!(config.embedding.max_input_chars, 1000);
        assert!(!config.embedding.fallback_enabled);
        assert_eq!(config.embedding.base_url, "http://localhost:11434");
        assert_eq!(config.search.default_top_k, 3);
        assert_eq!(config.search.max_top_k, 50);
        assert!((config.search.weight_text - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.chunking.chunk_size, 200);
        assert_eq!(config.chunking.overlap, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[embedding]
dimension = 384
"#;
        let file = create_temp_config(content);
        let config = QuarryConfig::load(file.path()).unwrap();
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.chunking.chunk_size, 500);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = QuarryConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.embedding.dimension, 768);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = QuarryConfig::load(file.path());
        assert!(matches!(result, Err(QuarryError::Config(_))));
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = QuarryConfig::default();
        config.server.port = 9200;
        config.embedding.provider = "mock".to_string();
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = QuarryConfig::load(&path).unwrap();
        assert_eq!(reloaded.server.port, 9200);
        assert_eq!(reloaded.embedding.provider, "mock");
        assert_eq!(reloaded.chunking.overlap, config.chunking.overlap);
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_chunk_size() {
        let mut config = QuarryConfig::default();
        config.chunking.chunk_size = 50;
        config.chunking.overlap = 50;
        assert!(matches!(config.validate(), Err(QuarryError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let mut config = QuarryConfig::default();
        config.embedding.dimension = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = QuarryConfig::default();
        config.embedding.provider = "openai".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_validate_rejects_default_top_k_above_max() {
        let mut config = QuarryConfig::default();
        config.search.default_top_k = 500;
        assert!(config.validate().is_err());
    }
}
