//! Model client module for LLM inference.

mod client;
mod embedding;
pub mod json;
pub mod mock;

pub use client::{
    ChatModel, MessageBuilder, ModelClient, ModelConfig, ModelError, ModelResponse,
    DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_MODEL_NAME, DEFAULT_RETRY_DELAY_SECS,
};
pub use embedding::{
    cosine_similarity, EmbeddingProvider, HashEmbedding, OpenAiEmbedding,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_HASH_DIMENSIONS,
};
pub use json::{extract_json_block, parse_json, parse_optional_json};
