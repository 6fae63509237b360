//! Scripted [`ChatModel`] for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::client::{ChatModel, MessageBuilder, ModelError, ModelResponse};

#[derive(Default)]
struct ScriptState {
    replies: VecDeque<Result<String, String>>,
    requests: Vec<Vec<Value>>,
}

/// Replies from a fixed script and records every request.
///
/// Once the script runs out every call fails with an API error.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script from a list of successful replies.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new();
        model
            .lock()
            .replies
            .extend(replies.into_iter().map(|r| Ok(r.into())));
        model
    }

    /// Append a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.lock().replies.push_back(Ok(text.into()));
        self
    }

    /// Append a failing call.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.lock().replies.push_back(Err(message.into()));
        self
    }

    /// Number of requests received.
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Text of the last message of every request, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.lock()
            .requests
            .iter()
            .map(|msgs| msgs.last().map(MessageBuilder::text_of).unwrap_or_default())
            .collect()
    }

    /// Raw messages of every request.
    pub fn requests(&self) -> Vec<Vec<Value>> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[Value]) -> Result<ModelResponse, ModelError> {
        let mut state = self.lock();
        state.requests.push(messages.to_vec());
        match state.replies.pop_front() {
            Some(Ok(text)) => Ok(ModelResponse::from_content(&text)),
            Some(Err(message)) => Err(ModelError::ApiError(message)),
            None => Err(ModelError::ApiError("script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_and_recording() {
        let model = ScriptedModel::with_replies(["first"]).fail("boom").reply("third");

        assert_eq!(model.prompt("a").await.unwrap(), "first");
        assert!(model.prompt("b").await.is_err());
        assert_eq!(model.prompt("c").await.unwrap(), "third");
        assert!(model.prompt("d").await.is_err());

        assert_eq!(model.call_count(), 4);
        assert_eq!(model.prompts(), vec!["a", "b", "c", "d"]);
    }
}
