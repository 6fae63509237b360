//! The context core: profile plus vector memory under one storage dir.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::model::EmbeddingProvider;

use super::profile::{ProfileCategory, ProfileStore, UserProfile};
use super::vector::{MemoryHit, VectorMemory};
use super::MemoryError;

pub const DEFAULT_STORAGE_DIR: &str = "data";
pub const PROFILE_FILE: &str = "user_profile.json";
pub const VECTOR_FILE: &str = "vector_store.json";

/// Profile handle shared with background tasks.
pub type SharedProfile = Arc<Mutex<ProfileStore>>;

pub struct ContextManager {
    storage_dir: PathBuf,
    profile: SharedProfile,
    memory: VectorMemory,
}

impl ContextManager {
    /// Open both stores under `storage_dir`, creating it if needed.
    pub fn open(
        storage_dir: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, MemoryError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        fs::create_dir_all(&storage_dir).map_err(|e| MemoryError::IoError(e.to_string()))?;

        let profile = ProfileStore::load(storage_dir.join(PROFILE_FILE))?;
        let memory = VectorMemory::open(storage_dir.join(VECTOR_FILE), embedder)?;

        tracing::debug!(
            "Context opened at {} ({} memories)",
            storage_dir.display(),
            memory.len()
        );

        Ok(Self {
            storage_dir,
            profile: Arc::new(Mutex::new(profile)),
            memory,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Shared handle to the profile store.
    pub fn profile(&self) -> SharedProfile {
        Arc::clone(&self.profile)
    }

    /// Copy of the profile as it is right now.
    pub async fn profile_snapshot(&self) -> UserProfile {
        self.profile.lock().await.profile().clone()
    }

    pub async fn update_profile(
        &self,
        category: &ProfileCategory,
        key: Option<&str>,
        value: Value,
    ) -> Result<(), MemoryError> {
        self.profile.lock().await.update(category, key, value)
    }

    pub fn memory(&self) -> &VectorMemory {
        &self.memory
    }

    pub async fn add_memory(
        &mut self,
        text: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<String, MemoryError> {
        self.memory.add_memory(text, metadata).await
    }

    pub async fn query_memory(&self, query: &str, n: usize) -> Result<Vec<MemoryHit>, MemoryError> {
        self.memory.query_memory(query, n).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HashEmbedding;
    use serde_json::json;

    #[tokio::test]
    async fn test_open_creates_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("nested").join("data");
        let ctx = ContextManager::open(&storage, Arc::new(HashEmbedding::default())).unwrap();

        assert!(storage.join(PROFILE_FILE).exists());
        assert_eq!(ctx.storage_dir(), storage.as_path());
        assert!(ctx.memory().is_empty());
    }

    #[tokio::test]
    async fn test_shared_profile_updates_are_visible() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ContextManager::open(dir.path(), Arc::new(HashEmbedding::default())).unwrap();

        let handle = ctx.profile();
        tokio::spawn(async move {
            handle
                .lock()
                .await
                .update(&ProfileCategory::Preferences, Some("diet"), json!("veg"))
                .unwrap();
        })
        .await
        .unwrap();

        assert_eq!(ctx.profile_snapshot().await.preferences["diet"], "veg");
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ContextManager::open(dir.path(), Arc::new(HashEmbedding::default())).unwrap();
        ctx.add_memory("Prefers Uber over Ola", BTreeMap::new())
            .await
            .unwrap();
        let hits = ctx.query_memory("uber", 1).await.unwrap();
        assert_eq!(hits[0].text, "Prefers Uber over Ola");
    }
}
