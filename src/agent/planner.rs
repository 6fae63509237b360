//! Goal → plan generation.
//!
//! Two flavours: [`NeuroPlanner::plan_steps`] returns a plain list of
//! high-level step strings and never fails, while
//! [`NeuroPlanner::generate_plan`] asks for a structured [`Plan`] using a
//! prompt personalised by the [`PromptEngine`].

use std::fmt;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::prompt_engine::PromptEngine;
use crate::config::prompts::{planning_prompt, step_list_prompt, PlanContext};
use crate::model::{parse_json, ChatModel, ModelError};

/// Returned by [`NeuroPlanner::plan_steps`] when no model is configured.
pub const MOCK_PLAN: [&str; 2] = ["Mock Action 1", "Mock Action 2"];

/// Returned by [`NeuroPlanner::plan_steps`] when planning fails.
pub const PLANNING_ERROR_STEP: &str = "Error in planning";

/// Planner errors.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("No model configured; set GEMINI_API_KEY or another API key")]
    Unavailable,
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Plan error: {0}")]
    Plan(String),
    #[error("Invalid plan format: {0}")]
    InvalidFormat(String),
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanStep {
    /// A raw device shell command.
    Command { command: String },
    /// A named action with optional arguments.
    Action {
        action: String,
        #[serde(
            default,
            deserialize_with = "lenient_string",
            skip_serializing_if = "Option::is_none"
        )]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
        #[serde(
            default,
            deserialize_with = "lenient_string",
            skip_serializing_if = "Option::is_none"
        )]
        text: Option<String>,
        /// Milliseconds, for `wait`. Numeric strings are accepted.
        #[serde(
            default,
            deserialize_with = "lenient_duration",
            skip_serializing_if = "Option::is_none"
        )]
        duration: Option<f64>,
    },
    /// Free text such as `"open_app Settings"`.
    Text(String),
    /// Anything else the model produced. Executes as a failed step.
    Invalid(Value),
}

/// Strings, numbers and booleans as text; `null` as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected a string, got {}", other))),
    }
}

fn lenient_duration<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| D::Error::custom("duration out of range")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid duration {:?}", s))),
        Some(other) => Err(D::Error::custom(format!("invalid duration {}", other))),
    }
}

impl PlanStep {
    /// Interpret one element of a plan; unrecognised shapes become [`PlanStep::Invalid`].
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(PlanStep::Invalid(value))
    }

    pub fn action(name: impl Into<String>, target: Option<&str>) -> Self {
        PlanStep::Action {
            action: name.into(),
            target: target.map(str::to_string),
            params: None,
            text: None,
            duration: None,
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::Text(text) => f.write_str(text),
            other => write!(f, "{}", serde_json::to_string(other).map_err(|_| fmt::Error)?),
        }
    }
}

/// An ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Interpret a model's JSON reply.
    ///
    /// Accepts a list of steps or an object with a `steps` list. An object
    /// with an `error` field is reported as [`PlannerError::Plan`]. Each
    /// element is read on its own, so one malformed step does not discard
    /// the rest.
    pub fn from_value(value: Value) -> Result<Self, PlannerError> {
        let steps = match value {
            Value::Array(steps) => steps,
            Value::Object(mut map) => {
                if let Some(error) = map.get("error") {
                    let message = error
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string());
                    return Err(PlannerError::Plan(message));
                }
                match map.remove("steps") {
                    Some(Value::Array(steps)) => steps,
                    _ => {
                        return Err(PlannerError::InvalidFormat(
                            "expected a list of steps".to_string(),
                        ))
                    }
                }
            }
            other => {
                return Err(PlannerError::InvalidFormat(format!(
                    "expected a list of steps, got {}",
                    other
                )))
            }
        };

        Ok(Plan::new(steps.into_iter().map(PlanStep::from_value).collect()))
    }
}

pub struct NeuroPlanner {
    model: Option<Arc<dyn ChatModel>>,
    engine: Option<PromptEngine>,
}

impl NeuroPlanner {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model: Some(model),
            engine: None,
        }
    }

    /// A planner with no model; [`plan_steps`](Self::plan_steps) returns the mock plan.
    pub fn unavailable() -> Self {
        Self {
            model: None,
            engine: None,
        }
    }

    pub fn with_prompt_engine(mut self, engine: PromptEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    /// Break `goal` into high-level step strings.
    pub async fn plan_steps(&self, goal: &str, context: &Value) -> Vec<String> {
        let Some(model) = &self.model else {
            tracing::warn!("[Planner] No model available. Returning mock plan.");
            return MOCK_PLAN.iter().map(|s| s.to_string()).collect();
        };

        tracing::info!("[Planner] Planning for: {}", goal);
        let prompt = step_list_prompt(goal, context);

        let result = async {
            let reply = model.prompt(&prompt).await?;
            parse_json::<Vec<String>>(&reply)
        }
        .await;

        match result {
            Ok(steps) => {
                tracing::info!("[Planner] Generated Plan: {:?}", steps);
                steps
            }
            Err(e) => {
                tracing::error!("[Planner] Planning failed: {}", e);
                vec![PLANNING_ERROR_STEP.to_string()]
            }
        }
    }

    /// Generate a structured plan for `goal`.
    pub async fn generate_plan(&self, goal: &str) -> Result<Plan, PlannerError> {
        let model = self.model.as_ref().ok_or(PlannerError::Unavailable)?;

        let prompt = match &self.engine {
            Some(engine) => engine.build_system_prompt(goal).await,
            None => planning_prompt(goal, &PlanContext::default()),
        };

        let reply = model.prompt(&prompt).await?;
        let value: Value = parse_json(&reply)?;
        let plan = Plan::from_value(value)?;
        tracing::debug!("Generated plan with {} steps", plan.len());
        Ok(plan)
    }
}
