//! Persistent CLI settings.
//!
//! Stored as JSON in the platform config directory via
//! `directories::ProjectDirs`, then overridden by environment variables and
//! finally by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::DEFAULT_STORAGE_DIR;
use crate::model::{
    EmbeddingProvider, HashEmbedding, ModelConfig, OpenAiEmbedding, DEFAULT_BASE_URL,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_MAX_RETRIES, DEFAULT_MODEL_NAME, DEFAULT_RETRY_DELAY_SECS,
};

/// API key variables, in lookup order.
pub const API_KEY_VARS: [&str; 4] = [
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "DEEPSEEK_API_KEY",
    "MODEL_API_KEY",
];

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot determine config directory")]
    NoConfigDir,
    #[error("Failed to write settings: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to serialize settings: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Where vectors for the memory store come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Offline hashed bag-of-words.
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint.
    Remote,
}

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Model API base URL
    pub base_url: String,
    /// Model API key
    pub api_key: String,
    /// Model name
    pub model_name: String,
    /// ADB device ID (optional)
    pub device_id: String,
    /// Maximum retries for model requests
    pub max_retries: u32,
    /// Retry delay in seconds
    pub retry_delay: u64,
    /// Maximum steps for the agent loop
    pub max_steps: u32,
    /// Send screenshots along with the UI text
    pub vision: bool,
    /// Directory holding the profile and vector store
    pub storage_dir: String,
    pub embedding: EmbeddingBackend,
    /// Empty means "same as `base_url`"
    pub embedding_base_url: String,
    pub embedding_model: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            device_id: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            max_steps: 10,
            vision: false,
            storage_dir: DEFAULT_STORAGE_DIR.to_string(),
            embedding: EmbeddingBackend::Hash,
            embedding_base_url: String::new(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl AppSettings {
    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "neurorun", "neuro-run")
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings from the config file, falling back to defaults.
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from `path`. Unreadable or invalid files give defaults.
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        let mut loaded: Self = match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring invalid settings file {}: {}", path.display(), e);
                return Self::default();
            }
        };

        // Backfill fields that older files left empty
        let defaults = Self::default();
        if loaded.base_url.is_empty() {
            loaded.base_url = defaults.base_url;
        }
        if loaded.model_name.is_empty() {
            loaded.model_name = defaults.model_name;
        }
        if loaded.storage_dir.is_empty() {
            loaded.storage_dir = defaults.storage_dir;
        }
        if loaded.embedding_model.is_empty() {
            loaded.embedding_model = defaults.embedding_model;
        }
        if loaded.max_steps == 0 {
            loaded.max_steps = defaults.max_steps;
        }
        loaded
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = API_KEY_VARS.iter().find_map(|var| get(var)) {
            self.api_key = key;
        }
        if let Some(url) = get("MODEL_BASE_URL") {
            self.base_url = url;
        }
        if let Some(name) = get("MODEL_NAME") {
            self.model_name = name;
        }
        if let Some(id) = get("ADB_DEVICE_ID") {
            self.device_id = id;
        }
        if let Some(n) = get("MODEL_MAX_RETRIES").and_then(|s| s.parse().ok()) {
            self.max_retries = n;
        }
        if let Some(n) = get("MODEL_RETRY_DELAY").and_then(|s| s.parse().ok()) {
            self.retry_delay = n;
        }
        if let Some(dir) = get("NEURORUN_STORAGE_DIR") {
            self.storage_dir = dir;
        }
        if let Some(url) = get("EMBEDDING_BASE_URL") {
            self.embedding_base_url = url;
            self.embedding = EmbeddingBackend::Remote;
        }
        if let Some(model) = get("EMBEDDING_MODEL") {
            self.embedding_model = model;
            self.embedding = EmbeddingBackend::Remote;
        }
    }

    /// Copy with the API key blanked, for persisting or display.
    pub fn without_api_key(&self) -> Self {
        Self {
            api_key: String::new(),
            ..self.clone()
        }
    }

    pub fn device_id(&self) -> Option<String> {
        let id = self.device_id.trim();
        (!id.is_empty()).then(|| id.to_string())
    }

    /// Chat model configuration.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::default()
            .with_base_url(&self.base_url)
            .with_api_key(&self.api_key)
            .with_model_name(&self.model_name)
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
    }

    /// Embedding provider for the vector memory.
    ///
    /// The remote backend needs an API key; without one the hash backend is used.
    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        match self.embedding {
            EmbeddingBackend::Remote if !self.api_key.is_empty() => {
                let base_url = if self.embedding_base_url.is_empty() {
                    &self.base_url
                } else {
                    &self.embedding_base_url
                };
                Arc::new(
                    OpenAiEmbedding::new(&self.api_key)
                        .with_base_url(base_url)
                        .with_model(&self.embedding_model),
                )
            }
            EmbeddingBackend::Remote => {
                tracing::warn!("Remote embeddings need an API key, using hash embeddings");
                Arc::new(HashEmbedding::default())
            }
            EmbeddingBackend::Hash => Arc::new(HashEmbedding::default()),
        }
    }
}
