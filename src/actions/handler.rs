//! Executes parsed actions against a device.

use std::time::Duration;

use crate::adb::{keycode, Device};
use crate::config::resolve_package;

use super::parser::Action;

/// Result of an action execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub should_finish: bool,
    pub message: Option<String>,
}

impl ActionResult {
    pub fn success() -> Self {
        Self {
            success: true,
            should_finish: false,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            should_finish: false,
            message: Some(message.into()),
        }
    }

    pub fn finish(message: Option<String>) -> Self {
        Self {
            success: true,
            should_finish: true,
            message,
        }
    }
}

/// Settle time after each kind of action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDelays {
    pub tap: Duration,
    pub enter: Duration,
    pub home: Duration,
    pub back: Duration,
    pub wait: Duration,
    pub open_app: Duration,
}

impl Default for ActionDelays {
    fn default() -> Self {
        Self {
            tap: Duration::from_secs(2),
            enter: Duration::from_secs(2),
            home: Duration::from_secs(1),
            back: Duration::from_secs(1),
            wait: Duration::from_secs(2),
            open_app: Duration::from_secs(2),
        }
    }
}

impl ActionDelays {
    /// No settling at all; for tests and mocks.
    pub fn none() -> Self {
        Self {
            tap: Duration::ZERO,
            enter: Duration::ZERO,
            home: Duration::ZERO,
            back: Duration::ZERO,
            wait: Duration::ZERO,
            open_app: Duration::ZERO,
        }
    }
}

/// Handles execution of actions from model output.
#[derive(Debug, Clone, Default)]
pub struct ActionHandler {
    delays: ActionDelays,
}

impl ActionHandler {
    pub fn new(delays: ActionDelays) -> Self {
        Self { delays }
    }

    pub fn delays(&self) -> &ActionDelays {
        &self.delays
    }

    /// Execute an action on `device`.
    ///
    /// Device errors become failed results; they never abort the caller.
    pub async fn execute(&self, action: &Action, device: &dyn Device) -> ActionResult {
        match action {
            Action::Finish(answer) => ActionResult::finish(Some(answer.clone())),
            Action::TapText(text) => self.handle_tap_text(text, device).await,
            Action::Type(text) => match device.input_text(text).await {
                Ok(()) => ActionResult::success(),
                Err(e) => ActionResult::failure(format!("Type failed: {}", e)),
            },
            Action::Enter => {
                self.key_then_settle(device, keycode::ENTER, self.delays.enter)
                    .await
            }
            Action::Home => {
                let result = match device.press_home().await {
                    Ok(()) => ActionResult::success(),
                    Err(e) => ActionResult::failure(format!("Home failed: {}", e)),
                };
                settle(self.delays.home).await;
                result
            }
            Action::Back => {
                self.key_then_settle(device, keycode::BACK, self.delays.back)
                    .await
            }
            Action::Wait => {
                settle(self.delays.wait).await;
                ActionResult::success()
            }
            Action::OpenApp(app) => self.handle_open_app(app, device).await,
        }
    }

    async fn handle_tap_text(&self, text: &str, device: &dyn Device) -> ActionResult {
        let result = match device.tap_text(text).await {
            Ok(true) => ActionResult::success(),
            Ok(false) => ActionResult::failure(format!("Could not find text: '{}'", text)),
            Err(e) => ActionResult::failure(format!("Tap failed: {}", e)),
        };
        settle(self.delays.tap).await;
        result
    }

    async fn handle_open_app(&self, app: &str, device: &dyn Device) -> ActionResult {
        let package = resolve_package(app).unwrap_or_else(|| app.trim().to_string());
        tracing::info!("Opening {} ({})", app, package);
        let result = match device.launch_package(&package).await {
            Ok(()) => ActionResult::success(),
            Err(e) => ActionResult::failure(format!("Could not open {}: {}", app, e)),
        };
        settle(self.delays.open_app).await;
        result
    }

    async fn key_then_settle(
        &self,
        device: &dyn Device,
        key: &str,
        delay: Duration,
    ) -> ActionResult {
        let result = match device.key_event(key).await {
            Ok(()) => ActionResult::success(),
            Err(e) => ActionResult::failure(format!("Key event {} failed: {}", key, e)),
        };
        settle(delay).await;
        result
    }
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::mock::MockDevice;
    use crate::adb::screen::tests::SAMPLE_DUMP;

    fn handler() -> ActionHandler {
        ActionHandler::new(ActionDelays::none())
    }

    #[test]
    fn test_action_result() {
        let success = ActionResult::success();
        assert!(success.success);
        assert!(!success.should_finish);

        let failure = ActionResult::failure("Error");
        assert!(!failure.success);
        assert_eq!(failure.message, Some("Error".to_string()));

        let finish = ActionResult::finish(Some("Done".to_string()));
        assert!(finish.success);
        assert!(finish.should_finish);
    }

    #[test]
    fn test_default_delays() {
        let delays = ActionDelays::default();
        assert_eq!(delays.tap, Duration::from_secs(2));
        assert_eq!(delays.home, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_tap_text() {
        let device = MockDevice::new().with_dump(SAMPLE_DUMP);
        let result = handler()
            .execute(&Action::TapText("Cart".to_string()), &device)
            .await;
        assert!(result.success);
        assert_eq!(device.calls().last().unwrap(), "input tap 970 120");

        let result = handler()
            .execute(&Action::TapText("Checkout".to_string()), &device)
            .await;
        assert!(!result.success);
        assert!(result.message.unwrap().contains("Checkout"));
    }

    #[tokio::test]
    async fn test_key_actions() {
        let device = MockDevice::new();
        let h = handler();
        h.execute(&Action::Enter, &device).await;
        h.execute(&Action::Home, &device).await;
        h.execute(&Action::Back, &device).await;
        assert_eq!(
            device.calls(),
            vec![
                "input keyevent 66",
                "input keyevent KEYCODE_HOME",
                "input keyevent 4"
            ]
        );
    }

    #[tokio::test]
    async fn test_wait_and_finish_touch_nothing() {
        let device = MockDevice::new();
        assert!(handler().execute(&Action::Wait, &device).await.success);
        let result = handler()
            .execute(&Action::Finish("₹129".to_string()), &device)
            .await;
        assert!(result.should_finish);
        assert_eq!(result.message.as_deref(), Some("₹129"));
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_open_app_resolves_name() {
        let device = MockDevice::new();
        let result = handler()
            .execute(&Action::OpenApp("Settings".to_string()), &device)
            .await;
        assert!(result.success);
        assert_eq!(
            device.calls(),
            vec!["monkey -p com.android.settings -c android.intent.category.LAUNCHER 1"]
        );
    }

    #[tokio::test]
    async fn test_device_failure_is_a_result() {
        let device = MockDevice::new().with_failure("input keyevent 66", "device offline");
        let result = handler().execute(&Action::Enter, &device).await;
        assert!(!result.success);
        assert!(result.message.unwrap().contains("device offline"));
    }
}
