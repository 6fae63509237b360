//! User context: persistent profile and vector memory.

mod context;
mod profile;
mod vector;

use thiserror::Error;

use crate::model::ModelError;

pub use context::{
    ContextManager, SharedProfile, DEFAULT_STORAGE_DIR, PROFILE_FILE, VECTOR_FILE,
};
pub use profile::{ProfileCategory, ProfileInsights, ProfileStore, UserProfile};
pub use vector::{MemoryEntry, MemoryHit, VectorMemory};

/// Memory errors.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),
    #[error("Embedding failed: {0}")]
    Embedding(#[from] ModelError),
}
