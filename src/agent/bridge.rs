//! Executes generated plans step by step on the device.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::planner::{Plan, PlanStep};
use crate::actions::{Action, ActionDelays, ActionHandler, ActionResult};
use crate::adb::Device;

/// Wait used when a `wait` step carries no duration.
pub const DEFAULT_WAIT_MS: u64 = 1000;

/// Outcome of one plan step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// What happened while executing a plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub steps: Vec<StepReport>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> usize {
        self.steps.iter().filter(|s| s.success).count()
    }

    pub fn failed(&self) -> usize {
        self.steps.len() - self.succeeded()
    }
}

/// Runs [`Plan`]s against a device. Failed steps are logged and skipped.
pub struct PlanBridge {
    device: Arc<dyn Device>,
    handler: ActionHandler,
    verbose: bool,
}

impl PlanBridge {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            handler: ActionHandler::default(),
            verbose: true,
        }
    }

    pub fn with_delays(mut self, delays: ActionDelays) -> Self {
        self.handler = ActionHandler::new(delays);
        self
    }

    pub fn quiet(mut self) -> Self {
        self.verbose = false;
        self
    }

    /// Execute every step in order.
    pub async fn execute_sequence(&self, plan: &Plan) -> ExecutionReport {
        if self.verbose {
            println!("Executing Plan...");
        }

        let mut report = ExecutionReport::default();
        for step in &plan.steps {
            let label = step.to_string();
            if self.verbose {
                println!("Step: {}", label);
            }

            let result = self.execute_step(step).await;
            if !result.success {
                tracing::warn!(
                    "Step failed: {}: {}",
                    label,
                    result.message.as_deref().unwrap_or("unknown error")
                );
            }
            report.steps.push(StepReport {
                step: label,
                success: result.success,
                message: result.message,
            });
        }
        report
    }

    /// Execute a single named action, e.g. `("open_app", "Settings")`.
    pub async fn execute_action(&self, action_type: &str, selector: &str) -> ActionResult {
        match to_action(action_type, Some(selector)) {
            Some(action) => self.handler.execute(&action, self.device.as_ref()).await,
            None => ActionResult::failure(format!("Unsupported action: {}", action_type)),
        }
    }

    async fn execute_step(&self, step: &PlanStep) -> ActionResult {
        match step {
            PlanStep::Command { command } => self.run_shell(command).await,
            PlanStep::Action {
                action,
                target,
                params,
                text,
                duration,
            } => {
                if action.eq_ignore_ascii_case("wait") {
                    let ms = duration
                        .filter(|d| d.is_finite() && *d >= 0.0)
                        .map(|d| d as u64)
                        .unwrap_or(DEFAULT_WAIT_MS);
                    if self.verbose {
                        println!("Waiting {}ms...", ms);
                    }
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    return ActionResult::success();
                }

                let argument = text
                    .clone()
                    .or_else(|| target.clone())
                    .or_else(|| params.as_ref().and_then(param_text));
                self.execute_action(action, argument.as_deref().unwrap_or(""))
                    .await
            }
            PlanStep::Invalid(value) => {
                ActionResult::failure(format!("Unrecognized plan step: {}", value))
            }
            PlanStep::Text(text) => {
                let text = text.trim();
                let (verb, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
                self.execute_action(verb, rest.trim()).await
            }
        }
    }

    async fn run_shell(&self, command: &str) -> ActionResult {
        let command = command.trim();
        let command = command.strip_prefix("adb shell ").unwrap_or(command);
        let args: Vec<&str> = command.split_whitespace().collect();
        if args.is_empty() {
            return ActionResult::failure("Empty command");
        }
        match self.device.shell(&args).await {
            Ok(output) => {
                if !output.is_empty() {
                    tracing::debug!("{} -> {}", command, output);
                }
                ActionResult::success()
            }
            Err(e) => ActionResult::failure(format!("Command failed: {}", e)),
        }
    }
}

fn param_text(params: &Value) -> Option<String> {
    match params {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["text", "target", "app", "package", "name"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Map a plan verb onto the action vocabulary.
fn to_action(action_type: &str, argument: Option<&str>) -> Option<Action> {
    let argument = argument.map(str::trim).filter(|a| !a.is_empty());
    let verb = action_type.trim().to_lowercase().replace('-', "_");

    let action = match verb.as_str() {
        "open_app" | "open" | "launch" | "launch_app" | "start_app" => {
            Action::OpenApp(argument?.to_string())
        }
        "tap" | "tap_text" | "click" | "press" => Action::TapText(argument?.to_string()),
        "type" | "input" | "input_text" | "type_text" => Action::Type(argument?.to_string()),
        "enter" | "search" | "submit" => Action::Enter,
        "home" | "go_home" => Action::Home,
        "back" | "go_back" => Action::Back,
        "wait" => Action::Wait,
        _ => return None,
    };
    Some(action)
}
