use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StockistError};

/// Top-level configuration for the Stockist library.
///
/// Loaded from a TOML file by the embedding application. Each section
/// corresponds to one subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockistConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl StockistConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StockistConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| StockistError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
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

/// Model transport configuration (Ollama-compatible backend).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the model server.
    pub base_url: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Embedding dimension produced by `embedding_model`.
    pub embedding_dim: usize,
    /// Text-generation model name.
    pub generation_model: String,
    /// Per-call timeout in seconds for every model request.
    pub timeout_secs: u64,
    /// Maximum concurrent embedding requests during backfill.
    pub backfill_concurrency: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dim: 768,
            generation_model: "gemma3".to_string(),
            timeout_secs: 30,
            backfill_concurrency: 4,
        }
    }
}

/// Candidate retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Size of the oversampled candidate pool scanned per query.
    pub num_candidates: usize,
    /// Maximum number of candidates returned per query.
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_candidates: 50,
            limit: 5,
        }
    }
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum user message length in characters.
    pub max_message_length: usize,
    /// Reply used when any pipeline stage fails.
    pub fallback_message: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            fallback_message:
                "Sorry, I can't process your request right now. Please try again.".to_string(),
        }
    }
}
