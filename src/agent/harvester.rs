//! Background extraction of durable user facts.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::prompts::harvester_prompt;
use crate::memory::{MemoryError, ProfileInsights, SharedProfile};
use crate::model::{parse_optional_json, ChatModel, ModelError};

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Profile error: {0}")]
    Memory(#[from] MemoryError),
}

/// Learns from user messages and writes what it finds into the profile.
#[derive(Clone)]
pub struct InsightHarvester {
    model: Option<Arc<dyn ChatModel>>,
    profile: SharedProfile,
}

impl InsightHarvester {
    /// `model` may be `None`, in which case harvesting is a no-op.
    pub fn new(model: Option<Arc<dyn ChatModel>>, profile: SharedProfile) -> Self {
        if model.is_none() {
            tracing::warn!("No API key found for InsightHarvester; profile learning disabled");
        }
        Self { model, profile }
    }

    /// Ask the model for insights in `message` and apply them.
    ///
    /// Returns the insights applied, or `None` when there was nothing new.
    pub async fn extract_insights(
        &self,
        message: &str,
    ) -> Result<Option<ProfileInsights>, HarvestError> {
        let Some(model) = &self.model else {
            return Ok(None);
        };

        let reply = model.prompt(&harvester_prompt(message)).await?;
        let Some(insights) = parse_optional_json::<ProfileInsights>(&reply)? else {
            return Ok(None);
        };
        if insights.is_empty() {
            return Ok(None);
        }

        let changes = self.profile.lock().await.apply_insights(&insights)?;
        tracing::info!(
            "[InsightHarvester] Found new insights ({} changes): {:?}",
            changes,
            insights
        );
        Ok(Some(insights))
    }

    /// Run [`extract_insights`](Self::extract_insights) in the background.
    ///
    /// Errors are logged; the caller never waits on this.
    pub fn spawn(&self, message: impl Into<String>) -> JoinHandle<()> {
        let harvester = self.clone();
        let message = message.into();
        tokio::spawn(async move {
            if let Err(e) = harvester.extract_insights(&message).await {
                tracing::warn!("[InsightHarvester] Error: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ProfileStore;
    use crate::model::mock::ScriptedModel;
    use tokio::sync::Mutex;

    fn shared_profile(dir: &tempfile::TempDir) -> SharedProfile {
        Arc::new(Mutex::new(
            ProfileStore::load(dir.path().join("user_profile.json")).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_applies_insights() {
        let dir = tempfile::tempdir().unwrap();
        let profile = shared_profile(&dir);
        let model = ScriptedModel::with_replies([
            "```json\n{\"hardware_specs\": {\"phone\": \"Pixel 7\"}, \"preferences\": {}, \"behavior_patterns\": [\"orders late at night\"]}\n```",
        ]);
        let harvester = InsightHarvester::new(Some(Arc::new(model.clone())), profile.clone());

        let insights = harvester
            .extract_insights("I use a Pixel 7 and usually order after midnight")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(insights.behavior_patterns.unwrap(), vec!["orders late at night"]);

        let store = profile.lock().await;
        assert_eq!(store.profile().hardware_specs["phone"], "Pixel 7");
        assert!(model.prompts()[0].contains("usually order after midnight"));
    }

    #[tokio::test]
    async fn test_null_reply() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::with_replies(["null"]);
        let harvester = InsightHarvester::new(Some(Arc::new(model)), shared_profile(&dir));
        assert!(harvester.extract_insights("hello").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_without_model_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let harvester = InsightHarvester::new(None, shared_profile(&dir));
        assert!(harvester.extract_insights("hello").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_spawn_updates_shared_profile() {
        let dir = tempfile::tempdir().unwrap();
        let profile = shared_profile(&dir);
        let model = ScriptedModel::with_replies(["{\"preferences\": {\"cab\": \"Uber\"}}"]);
        let harvester = InsightHarvester::new(Some(Arc::new(model)), profile.clone());

        harvester.spawn("I always take Uber").await.unwrap();
        assert_eq!(profile.lock().await.profile().preferences["cab"], "Uber");
    }

    #[tokio::test]
    async fn test_spawn_swallows_errors() {
        let dir = tempfile::tempdir().unwrap();
        let model = ScriptedModel::with_replies(["this is not json"]);
        let harvester = InsightHarvester::new(Some(Arc::new(model)), shared_profile(&dir));
        assert!(harvester.spawn("whatever").await.is_ok());
    }
}
