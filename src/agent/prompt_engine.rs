//! Builds planning prompts from the user's context.

use std::sync::Arc;

use crate::config::prompts::{planning_prompt, PlanContext};
use crate::memory::ContextManager;

/// Memories folded into each planning prompt.
pub const RELEVANT_MEMORY_COUNT: usize = 2;

#[derive(Clone)]
pub struct PromptEngine {
    context: Arc<ContextManager>,
}

impl PromptEngine {
    pub fn new(context: Arc<ContextManager>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<ContextManager> {
        &self.context
    }

    /// Planning prompt personalised with the profile and the most relevant memories.
    pub async fn build_system_prompt(&self, goal: &str) -> String {
        let profile = self.context.profile_snapshot().await;

        let memories = match self.context.query_memory(goal, RELEVANT_MEMORY_COUNT).await {
            Ok(hits) => hits.into_iter().map(|hit| hit.text).collect(),
            Err(e) => {
                tracing::warn!("Memory lookup failed: {}", e);
                Vec::new()
            }
        };

        let ctx = PlanContext {
            hardware: to_json(&profile.hardware_specs),
            preferences: to_json(&profile.preferences),
            habits: to_json(&profile.behavior_patterns),
            memories,
        };
        planning_prompt(goal, &ctx)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
