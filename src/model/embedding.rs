//! Text embeddings for the vector memory.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::client::{ModelError, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Default embedding model on the Gemini OpenAI-compatible endpoint.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Dimension of [`HashEmbedding`] vectors.
pub const DEFAULT_HASH_DIMENSIONS: usize = 256;

/// Turns text into a vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    /// Provider name, stored next to persisted vectors.
    fn name(&self) -> &str;
}

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

fn http_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_default()
}

impl OpenAiEmbedding {
    pub fn new(api_key: impl Into<String>) -> Self {
        let timeout = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);
        Self {
            client: http_client(timeout),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout,
        }
    }

    /// Per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        tracing::debug!(model = %self.model, "generating embedding");

        let body = serde_json::json!({
            "model": &self.model,
            "input": [text],
        });

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError::ApiError(format!(
                "embedding HTTP {}: {}",
                status, text
            )));
        }

        let data: Value = resp.json().await?;
        let embedding: Vec<f32> = data["data"][0]["embedding"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect()
            })
            .unwrap_or_default();

        if embedding.is_empty() {
            return Err(ModelError::ParseError(
                "embedding response carried no vector".to_string(),
            ));
        }
        Ok(embedding)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Offline bag-of-words embedding.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a) into one of
/// `dimensions` buckets and the result is L2-normalised. The hash is fixed,
/// so vectors stay comparable across runs and builds.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimensions: usize,
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSIONS)
    }
}

impl HashEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        Ok(self.embed_text(text))
    }

    fn name(&self) -> &str {
        "hash"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    bytes.iter().fold(OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(PRIME)
    })
}

/// Cosine similarity; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_hash_embedding_normalised() {
        let embedder = HashEmbedding::default();
        let v = embedder.embed_text("Slow network on my phone");
        assert_eq!(v.len(), DEFAULT_HASH_DIMENSIONS);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedding_empty_text() {
        let v = HashEmbedding::new(8).embed_text("  ...  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_similarity_prefers_overlap() {
        let embedder = HashEmbedding::default();
        let query = embedder.embed_text("cheap pizza delivery");
        let close = embedder.embed_text("I order pizza for delivery every friday");
        let far = embedder.embed_text("Phone battery health report");
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_remote_embedding_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the connection without ever answering.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let embedder = OpenAiEmbedding::new("key")
            .with_base_url(format!("http://{}", addr))
            .with_timeout(Duration::from_millis(200));
        assert_eq!(embedder.timeout(), Duration::from_millis(200));

        let result = tokio::time::timeout(Duration::from_secs(10), embedder.embed("hello")).await;
        assert!(matches!(result, Ok(Err(_))));
        server.abort();
    }

    #[tokio::test]
    async fn test_provider_trait() {
        let embedder = HashEmbedding::new(16);
        assert_eq!(embedder.name(), "hash");
        assert_eq!(embedder.embed("hello").await.unwrap().len(), 16);
    }
}
