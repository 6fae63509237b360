//! Local vector memory.
//!
//! Free-text memories are embedded and kept in a single JSON file. Queries
//! rank every entry by cosine similarity; the store is small enough that a
//! linear scan is fine.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::{cosine_similarity, EmbeddingProvider};

use super::MemoryError;

/// One stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub embedding: Vec<f32>,
    pub created_at: String,
}

/// A query result.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryHit {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub score: f32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct VectorFile {
    #[serde(default)]
    embedder: Option<String>,
    #[serde(default)]
    entries: Vec<MemoryEntry>,
}

/// Embedded memories persisted to one JSON file.
pub struct VectorMemory {
    path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    store: VectorFile,
}

impl VectorMemory {
    /// Open (or start) the store at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        let store = if path.exists() {
            let content =
                fs::read_to_string(&path).map_err(|e| MemoryError::IoError(e.to_string()))?;
            serde_json::from_str::<VectorFile>(&content)
                .map_err(|e| MemoryError::ParseError(format!("{}: {}", path.display(), e)))?
        } else {
            VectorFile::default()
        };

        if let Some(stored) = store.embedder.as_deref() {
            if stored != embedder.name() && !store.entries.is_empty() {
                tracing::warn!(
                    "Vector store {} was built with '{}' embeddings, now using '{}'",
                    path.display(),
                    stored,
                    embedder.name()
                );
            }
        }

        Ok(Self {
            path,
            embedder,
            store,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.store.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.entries.is_empty()
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.store.entries
    }

    /// Embed and store `text`; returns the new entry's id.
    pub async fn add_memory(
        &mut self,
        text: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<String, MemoryError> {
        let embedding = self.embedder.embed(text).await?;
        let id = uuid::Uuid::new_v4().to_string();

        self.store.entries.push(MemoryEntry {
            id: id.clone(),
            text: text.to_string(),
            metadata,
            embedding,
            created_at: Utc::now().to_rfc3339(),
        });
        self.store.embedder = Some(self.embedder.name().to_string());
        self.save()?;

        tracing::debug!("Stored memory {} ({} total)", id, self.len());
        Ok(id)
    }

    /// The `n` entries most similar to `query`, best first.
    pub async fn query_memory(&self, query: &str, n: usize) -> Result<Vec<MemoryHit>, MemoryError> {
        if n == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let mut hits: Vec<MemoryHit> = self
            .store
            .entries
            .iter()
            .map(|entry| MemoryHit {
                id: entry.id.clone(),
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                score: cosine_similarity(&query_embedding, &entry.embedding),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(n);
        Ok(hits)
    }

    fn save(&self) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| MemoryError::IoError(e.to_string()))?;
        }
        let content = serde_json::to_string(&self.store)
            .map_err(|e| MemoryError::SerializeError(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| MemoryError::IoError(e.to_string()))
    }
}
