//! The observe → decide → act loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::actions::{
    clean_action_line, parse_action, ActionDelays, ActionError, ActionHandler,
};
use crate::adb::{summarize, AdbError, Device, DEFAULT_SUMMARY_LIMIT};
use crate::config::prompts::decision_prompt;
use crate::model::{ChatModel, MessageBuilder, ModelError};

/// Errors from a single agent step. The loop logs these and keeps going.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Action error: {0}")]
    Action(#[from] ActionError),
    #[error("Device error: {0}")]
    Device(#[from] AdbError),
}

/// Configuration for the SmartAgent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of steps before stopping.
    pub max_steps: u32,
    /// Attach a screenshot to every decision request.
    pub vision: bool,
    /// How many screen elements to show the model.
    pub summary_limit: usize,
    /// Pause after a failed step.
    pub error_backoff: Duration,
    pub delays: ActionDelays,
    /// Whether to print progress lines.
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            vision: false,
            summary_limit: DEFAULT_SUMMARY_LIMIT,
            error_backoff: Duration::from_secs(1),
            delays: ActionDelays::default(),
            verbose: true,
        }
    }
}

impl AgentConfig {
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_vision(mut self, vision: bool) -> Self {
        self.vision = vision;
        self
    }

    pub fn with_delays(mut self, delays: ActionDelays) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Disable progress output.
    pub fn quiet(mut self) -> Self {
        self.verbose = false;
        self
    }

    /// No delays anywhere, no output. For mocks.
    pub fn instant() -> Self {
        Self::default()
            .with_delays(ActionDelays::none())
            .with_error_backoff(Duration::ZERO)
            .quiet()
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model emitted FINISH with this answer.
    Finished(String),
    StepBudgetExhausted,
}

impl AgentOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            AgentOutcome::Finished(answer) => Some(answer),
            AgentOutcome::StepBudgetExhausted => None,
        }
    }
}

impl fmt::Display for AgentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentOutcome::Finished(answer) => f.write_str(answer),
            AgentOutcome::StepBudgetExhausted => {
                f.write_str("Max steps reached without definitive answer.")
            }
        }
    }
}

/// LLM-driven agent that works from UI dumps.
///
/// Each step dumps the screen, asks the model for one action from a small
/// vocabulary and executes it, until the model says FINISH or the step
/// budget runs out.
pub struct SmartAgent {
    device: Arc<dyn Device>,
    model: Arc<dyn ChatModel>,
    handler: ActionHandler,
    config: AgentConfig,
    history: Vec<String>,
}

impl SmartAgent {
    pub fn new(device: Arc<dyn Device>, model: Arc<dyn ChatModel>, config: AgentConfig) -> Self {
        Self {
            device,
            model,
            handler: ActionHandler::new(config.delays.clone()),
            config,
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Action lines the model produced during the last run.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Run with the configured step budget.
    pub async fn run(&mut self, goal: &str) -> AgentOutcome {
        self.act(goal, self.config.max_steps).await
    }

    /// Pursue `goal` for at most `max_steps` model decisions.
    pub async fn act(&mut self, goal: &str, max_steps: u32) -> AgentOutcome {
        if self.config.verbose {
            println!("\n--- SmartAgent Goal: {} ---", goal);
        }
        self.history.clear();

        for step in 1..=max_steps {
            if self.config.verbose {
                println!("\nStep {}: Observing...", step);
            }

            match self.step(goal).await {
                Ok(Some(answer)) => {
                    tracing::info!("Finished after {} steps: {}", step, answer);
                    return AgentOutcome::Finished(answer);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Error in loop: {}", e);
                    if !self.config.error_backoff.is_zero() {
                        tokio::time::sleep(self.config.error_backoff).await;
                    }
                }
            }
        }

        tracing::info!("Step budget of {} exhausted for goal: {}", max_steps, goal);
        AgentOutcome::StepBudgetExhausted
    }

    /// Text summary of the current screen.
    pub async fn capture_state(&self) -> String {
        match self.device.ui_dump().await {
            Ok(xml) => summarize(xml.as_deref(), self.config.summary_limit),
            Err(e) => {
                tracing::warn!("UI dump failed: {}", e);
                summarize(None, self.config.summary_limit)
            }
        }
    }

    /// One observe/decide/act cycle. `Some(answer)` when the model finished.
    async fn step(&mut self, goal: &str) -> Result<Option<String>, AgentError> {
        let screen = self.capture_state().await;
        let prompt = decision_prompt(goal, &screen, &self.history);

        let message = if self.config.vision {
            let screenshot = self.device.screenshot().await;
            MessageBuilder::create_user_message(&prompt, Some(&screenshot.base64_data))
        } else {
            MessageBuilder::create_user_message(&prompt, None)
        };

        let response = self.model.complete(&[message]).await?;
        let line = clean_action_line(&response.action);
        if self.config.verbose {
            println!("Agent Decided: {}", line);
        }
        self.history.push(line.clone());

        let action = parse_action(&line)?;
        let result = self.handler.execute(&action, self.device.as_ref()).await;

        if result.should_finish {
            return Ok(Some(result.message.unwrap_or_default()));
        }
        if !result.success {
            tracing::warn!(
                "{} failed: {}",
                action,
                result.message.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::mock::MockDevice;
    use crate::adb::screen::tests::SAMPLE_DUMP;
    use crate::model::mock::ScriptedModel;

    fn agent(device: &MockDevice, model: &ScriptedModel) -> SmartAgent {
        SmartAgent::new(
            Arc::new(device.clone()),
            Arc::new(model.clone()),
            AgentConfig::instant(),
        )
    }

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.summary_limit, 50);
        assert_eq!(config.error_backoff, Duration::from_secs(1));
        assert!(!config.vision);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            AgentOutcome::StepBudgetExhausted.to_string(),
            "Max steps reached without definitive answer."
        );
        assert_eq!(AgentOutcome::Finished("₹129".to_string()).answer(), Some("₹129"));
    }

    #[tokio::test]
    async fn test_runs_until_finish() {
        let device = MockDevice::new().with_dump(SAMPLE_DUMP);
        let model = ScriptedModel::with_replies([
            "TAP_TEXT(\"Search\")",
            "TYPE(\"nuggets\")",
            "ENTER",
            "FINISH(\"₹129\")",
            "HOME",
        ]);
        let mut agent = agent(&device, &model);

        let outcome = agent.act("Find McNuggets price", 10).await;
        assert_eq!(outcome, AgentOutcome::Finished("₹129".to_string()));
        assert_eq!(agent.history().len(), 4);
        assert_eq!(model.call_count(), 4);

        let inputs = device.calls_starting_with("input ");
        assert_eq!(
            inputs,
            vec!["input tap 540 260", "input text nuggets", "input keyevent 66"]
        );
    }

    #[tokio::test]
    async fn test_step_budget() {
        let device = MockDevice::new().with_dump(SAMPLE_DUMP);
        let model = ScriptedModel::with_replies(["WAIT", "WAIT", "WAIT"]);
        let mut agent = agent(&device, &model);

        let outcome = agent.act("Wait forever", 2).await;
        assert_eq!(outcome, AgentOutcome::StepBudgetExhausted);
        assert_eq!(model.call_count(), 2);
        assert_eq!(agent.history(), &["WAIT".to_string(), "WAIT".to_string()]);
    }

    #[tokio::test]
    async fn test_errors_do_not_stop_the_loop() {
        let device = MockDevice::new().with_dump(SAMPLE_DUMP);
        let model = ScriptedModel::new()
            .fail("503 Service Unavailable")
            .reply("let me think about it")
            .reply("TAP_TEXT(\"Nonexistent\")")
            .reply("FINISH(\"done\")");
        let mut agent = agent(&device, &model);

        let outcome = agent.act("Anything", 5).await;
        assert_eq!(outcome.answer(), Some("done"));
        // The failed model call produced no history entry.
        assert_eq!(agent.history().len(), 3);
    }

    #[tokio::test]
    async fn test_prompt_carries_screen_and_history() {
        let device = MockDevice::new().with_dump(SAMPLE_DUMP);
        let model = ScriptedModel::with_replies(["HOME", "FINISH(\"ok\")"]);
        let mut agent = agent(&device, &model);
        agent.act("Go home", 3).await;

        let prompts = model.prompts();
        assert!(prompts[0].contains("Element: 'Chicken McNuggets' Bounds: [40,800][700,880]"));
        assert!(prompts[0].contains("(none yet)"));
        assert!(prompts[1].contains("1. HOME"));
    }

    #[tokio::test]
    async fn test_empty_screen() {
        let device = MockDevice::new();
        let model = ScriptedModel::with_replies(["FINISH(\"nothing\")"]);
        let mut agent = agent(&device, &model);
        agent.act("Look", 1).await;
        assert!(model.prompts()[0].contains("Screen is empty or protected."));
    }

    #[tokio::test]
    async fn test_vision_attaches_screenshot() {
        let device = MockDevice::new().with_dump(SAMPLE_DUMP);
        let model = ScriptedModel::with_replies(["FINISH(\"seen\")"]);
        let mut agent = SmartAgent::new(
            Arc::new(device.clone()),
            Arc::new(model.clone()),
            AgentConfig::instant().with_vision(true),
        );
        agent.act("Look", 1).await;

        let request = &model.requests()[0];
        assert_eq!(request[0]["content"][0]["type"], "image_url");
    }

    #[tokio::test]
    async fn test_history_resets_between_runs() {
        let device = MockDevice::new().with_dump(SAMPLE_DUMP);
        let model = ScriptedModel::with_replies(["FINISH(\"a\")", "FINISH(\"b\")"]);
        let mut agent = agent(&device, &model);
        agent.act("first", 2).await;
        agent.act("second", 2).await;
        assert_eq!(agent.history(), &["FINISH(\"b\")".to_string()]);
    }
}
