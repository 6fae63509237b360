//! Model client for LLM inference using an OpenAI-compatible API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Gemini's OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default chat model.
pub const DEFAULT_MODEL_NAME: &str = "gemini-2.0-flash";

/// Default number of retry attempts for failed requests.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between retry attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Model client errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Max retries exceeded after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, String),
    #[error("No API key configured")]
    MissingApiKey,
}

/// Configuration for the chat model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Not every OpenAI-compatible backend accepts this, so it is only sent when set.
    pub frequency_penalty: Option<f32>,
    pub extra_body: HashMap<String, Value>,
    /// Maximum number of retry attempts for failed requests.
    pub max_retries: u32,
    /// Delay between retry attempts in seconds.
    pub retry_delay_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            max_tokens: 2048,
            temperature: 0.0,
            top_p: 0.95,
            frequency_penalty: None,
            extra_body: HashMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ModelConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Set the maximum number of retry attempts for failed requests.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retry attempts in seconds.
    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// True when an API key is present.
    pub fn has_api_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != "EMPTY"
    }
}

/// Response from the chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    /// Reasoning wrapped in `<think>` tags, if the model emitted any.
    pub thinking: String,
    /// The answer part, trimmed.
    pub action: String,
    pub raw_content: String,
}

impl ModelResponse {
    /// Build a response from raw completion text.
    pub fn from_content(content: &str) -> Self {
        let (thinking, action) = parse_response(content);
        Self {
            thinking,
            action,
            raw_content: content.to_string(),
        }
    }
}

/// Anything that can answer a chat completion request.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send OpenAI-format messages and return the reply.
    async fn complete(&self, messages: &[Value]) -> Result<ModelResponse, ModelError>;

    /// Single-turn text prompt; returns the answer text.
    async fn prompt(&self, text: &str) -> Result<String, ModelError> {
        let messages = [MessageBuilder::create_user_message(text, None)];
        Ok(self.complete(&messages).await?.action)
    }
}

/// OpenAI API response structures.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion endpoints.
pub struct ModelClient {
    config: ModelConfig,
    client: Client,
}

impl ModelClient {
    pub fn new(config: ModelConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    pub fn with_defaults() -> Self {
        Self::new(ModelConfig::default())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Send a request to the model, retrying transient failures.
    pub async fn request(&self, messages: &[Value]) -> Result<ModelResponse, ModelError> {
        if !self.config.has_api_key() {
            return Err(ModelError::MissingApiKey);
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = self.build_body(messages);

        let mut last_error: Option<ModelError> = None;
        let max_attempts = self.config.max_retries + 1;

        for attempt in 1..=max_attempts {
            match self.send_request(&url, &body).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let is_retryable = is_retryable_error(&e);

                    if attempt < max_attempts && is_retryable {
                        tracing::warn!(
                            "Request failed (attempt {}/{}): {}. Retrying in {}s",
                            attempt,
                            max_attempts,
                            e,
                            self.config.retry_delay_secs
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                        last_error = Some(e);
                    } else if !is_retryable {
                        return Err(e);
                    } else {
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(ModelError::MaxRetriesExceeded(
            max_attempts,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    fn build_body(&self, messages: &[Value]) -> Value {
        let mut body = json!({
            "messages": messages,
            "model": self.config.model_name,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
        });

        if let Value::Object(ref mut map) = body {
            if let Some(penalty) = self.config.frequency_penalty {
                map.insert("frequency_penalty".to_string(), json!(penalty));
            }
            for (key, value) in &self.config.extra_body {
                map.insert(key.clone(), value.clone());
            }
        }
        body
    }

    async fn send_request(&self, url: &str, body: &Value) -> Result<ModelResponse, ModelError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError(format!("{}: {}", status, error_text)));
        }

        let completion: ChatCompletionResponse = response.json().await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::ParseError("No choices in response".to_string()))?
            .message
            .content
            .ok_or_else(|| ModelError::ParseError("Empty message content".to_string()))?;

        tracing::debug!("Model replied: {}", content);
        Ok(ModelResponse::from_content(&content))
    }
}

#[async_trait]
impl ChatModel for ModelClient {
    async fn complete(&self, messages: &[Value]) -> Result<ModelResponse, ModelError> {
        self.request(messages).await
    }
}

/// Check if an error is retryable (network errors, timeouts, etc.)
fn is_retryable_error(error: &ModelError) -> bool {
    match error {
        ModelError::RequestFailed(_) => true,
        ModelError::ApiError(msg) => {
            let lower = msg.to_lowercase();
            msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("504")
                || msg.contains("429")
                || lower.contains("timeout")
                || lower.contains("rate limit")
        }
        ModelError::ParseError(_) => false,
        ModelError::MaxRetriesExceeded(_, _) => false,
        ModelError::MissingApiKey => false,
    }
}

/// Split model output into thinking and answer parts.
fn parse_response(content: &str) -> (String, String) {
    if !content.contains("<answer>") {
        let thinking = match (content.find("<think>"), content.find("</think>")) {
            (Some(start), Some(end)) if start < end => {
                content[start + "<think>".len()..end].trim().to_string()
            }
            _ => String::new(),
        };
        let action = match content.find("</think>") {
            Some(end) => content[end + "</think>".len()..].trim().to_string(),
            None => content.trim().to_string(),
        };
        return (thinking, action);
    }

    let parts: Vec<&str> = content.splitn(2, "<answer>").collect();
    let thinking = parts[0]
        .replace("<think>", "")
        .replace("</think>", "")
        .trim()
        .to_string();
    let action = parts
        .get(1)
        .map(|s| s.replace("</answer>", "").trim().to_string())
        .unwrap_or_default();

    (thinking, action)
}

/// Helper for building conversation messages.
pub struct MessageBuilder;

impl MessageBuilder {
    pub fn create_system_message(content: &str) -> Value {
        json!({
            "role": "system",
            "content": content
        })
    }

    /// Create a user message with an optional base64 PNG attached.
    pub fn create_user_message(text: &str, image_base64: Option<&str>) -> Value {
        let Some(img_data) = image_base64 else {
            return json!({
                "role": "user",
                "content": text
            });
        };

        json!({
            "role": "user",
            "content": [
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:image/png;base64,{}", img_data)
                    }
                },
                {
                    "type": "text",
                    "text": text
                }
            ]
        })
    }

    pub fn create_assistant_message(content: &str) -> Value {
        json!({
            "role": "assistant",
            "content": content
        })
    }

    /// Remove image content from a message to save context space.
    pub fn remove_images_from_message(message: &mut Value) {
        if let Some(Value::Array(arr)) = message.get_mut("content") {
            arr.retain(|item| item.get("type").and_then(|t| t.as_str()) == Some("text"));
        }
    }

    /// The text content of a message, whether plain or multi-part.
    pub fn text_of(message: &Value) -> String {
        match message.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }
}
