//! Task verticals built on the [`SmartAgent`] loop.
//!
//! Every mission starts from the home screen, launches its app directly and
//! only then hands the goal to the agent. Answers are parsed as JSON when
//! the model complied and kept as raw text otherwise.

pub mod commerce;
pub mod events;
pub mod rides;

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::adb::{AdbError, Device};
use crate::agent::{AgentConfig, AgentOutcome, SmartAgent};
use crate::config::resolve_package;
use crate::model::{extract_json_block, ChatModel};

/// Mission errors.
#[derive(Error, Debug)]
pub enum MissionError {
    #[error("Could not launch {app}: {source}")]
    Launch {
        app: String,
        #[source]
        source: AdbError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Success,
    Failed,
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissionStatus::Success => f.write_str("success"),
            MissionStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Shared plumbing for every mission: device, model and loop settings.
#[derive(Clone)]
pub struct MissionRunner {
    device: Arc<dyn Device>,
    model: Arc<dyn ChatModel>,
    config: AgentConfig,
    cooldown: Duration,
}

impl MissionRunner {
    pub fn new(device: Arc<dyn Device>, model: Arc<dyn ChatModel>, config: AgentConfig) -> Self {
        Self {
            device,
            model,
            config,
            cooldown: Duration::from_secs(2),
        }
    }

    /// Pause between repeated runs (e.g. one invite per contact).
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Go home, launch `app`, then let the agent pursue `goal`.
    pub async fn run_in_app(
        &self,
        app: &str,
        goal: &str,
        max_steps: u32,
    ) -> Result<AgentOutcome, MissionError> {
        let package = resolve_package(app).unwrap_or_else(|| app.trim().to_string());

        if let Err(e) = self.device.press_home().await {
            tracing::warn!("Could not press home before {}: {}", app, e);
        }
        settle(self.config.delays.home).await;

        self.device
            .launch_package(&package)
            .await
            .map_err(|source| MissionError::Launch {
                app: app.to_string(),
                source,
            })?;
        settle(self.config.delays.open_app).await;

        let mut agent = SmartAgent::new(
            Arc::clone(&self.device),
            Arc::clone(&self.model),
            self.config.clone(),
        );
        Ok(agent.act(goal, max_steps).await)
    }

    pub fn max_steps(&self) -> u32 {
        self.config.max_steps
    }
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

static PRICE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(\.\d+)?").unwrap());

/// Pull a numeric price out of text like `"₹1,299"` or `"Rs. 129"`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let clean = raw
        .to_lowercase()
        .replace(',', "")
        .replace('₹', "")
        .replace("rs.", "")
        .replace("rs", "");
    PRICE_NUMBER
        .find(clean.trim())
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse a FINISH answer as a JSON object, if it is one.
///
/// Single-quoted pseudo-JSON is accepted as a fallback.
pub fn parse_answer(answer: &str) -> Option<serde_json::Map<String, Value>> {
    let block = extract_json_block(answer);
    let start = block.find('{')?;
    let end = block.rfind('}')?;
    if end < start {
        return None;
    }
    let candidate = &block[start..=end];

    let parsed = serde_json::from_str::<Value>(candidate)
        .or_else(|_| serde_json::from_str::<Value>(&candidate.replace('\'', "\"")));
    match parsed {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// String form of a JSON field; numbers are rendered, null is `None`.
pub(crate) fn field(data: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// True when the answer object reports failure.
pub(crate) fn reports_failure(data: &serde_json::Map<String, Value>) -> bool {
    field(data, "status")
        .map(|s| s.eq_ignore_ascii_case("failed") || s.eq_ignore_ascii_case("failure"))
        .unwrap_or(false)
}
