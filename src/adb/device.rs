//! Device control: the [`Device`] trait and its adb-backed implementation.

use std::time::Duration;

use async_trait::async_trait;

use super::connection::{
    first_online_device, run_adb, run_adb_checked, AdbError, DEFAULT_ADB_TIMEOUT_SECS,
};
use super::input::{adb_keyboard_args, escape_input_text, is_plain_input, ADB_KEYBOARD_IME};
use super::screen::{self, DUMP_BANNER, WINDOW_DUMP_PATH};
use super::screenshot::{decode_screencap, Screenshot};

/// Key codes used by the action vocabulary.
pub mod keycode {
    pub const HOME: &str = "KEYCODE_HOME";
    pub const BACK: &str = "4";
    pub const ENTER: &str = "66";
}

/// A controllable Android device.
///
/// Only [`Device::shell`] is required; every other operation is expressed as
/// device shell commands on top of it. Implementations may override the
/// higher-level methods when they have a cheaper path.
#[async_trait]
pub trait Device: Send + Sync {
    /// Serial of the targeted device, if pinned.
    fn device_id(&self) -> Option<&str>;

    /// Run `adb shell <args>` and return trimmed stdout.
    async fn shell(&self, args: &[&str]) -> Result<String, AdbError>;

    /// Dump the current UI hierarchy. `Ok(None)` when nothing usable came back.
    async fn ui_dump(&self) -> Result<Option<String>, AdbError> {
        // A stale dump from a previous step must never be read back.
        let _ = self.shell(&["rm", WINDOW_DUMP_PATH]).await;
        let _ = self.shell(&["uiautomator", "dump"]).await;

        let output = self.shell(&["cat", WINDOW_DUMP_PATH]).await?;
        if output.contains(DUMP_BANNER) && !screen::is_hierarchy(&output) {
            return Ok(None);
        }
        if output.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(output))
    }

    /// Tap at absolute pixel coordinates.
    async fn tap(&self, x: i32, y: i32) -> Result<(), AdbError> {
        self.shell(&["input", "tap", &x.to_string(), &y.to_string()])
            .await
            .map(|_| ())
    }

    /// Tap the centre of the first element labelled `text`.
    ///
    /// Returns `Ok(false)` when no such element is on screen.
    async fn tap_text(&self, text: &str) -> Result<bool, AdbError> {
        let Some(xml) = self.ui_dump().await? else {
            return Ok(false);
        };
        match screen::locate_text(&xml, text, false) {
            Some((x, y)) => {
                tracing::info!("Tapping '{}' at ({}, {})", text, x, y);
                self.tap(x, y).await?;
                Ok(true)
            }
            None => {
                tracing::info!("Could not find text: '{}'", text);
                Ok(false)
            }
        }
    }

    /// Type text into the focused field.
    async fn input_text(&self, text: &str) -> Result<(), AdbError> {
        if is_plain_input(text) {
            let escaped = escape_input_text(text);
            return self.shell(&["input", "text", &escaped]).await.map(|_| ());
        }

        let original_ime = self
            .shell(&["settings", "get", "secure", "default_input_method"])
            .await
            .unwrap_or_default();
        if !original_ime.contains(ADB_KEYBOARD_IME) {
            self.shell(&["ime", "set", ADB_KEYBOARD_IME]).await?;
        }

        let args = adb_keyboard_args(text);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = self.shell(&arg_refs).await.map(|_| ());

        if !original_ime.is_empty() && !original_ime.contains(ADB_KEYBOARD_IME) {
            let _ = self.shell(&["ime", "set", &original_ime]).await;
        }
        result
    }

    /// Send a key event (`KEYCODE_*` name or numeric code).
    async fn key_event(&self, key: &str) -> Result<(), AdbError> {
        self.shell(&["input", "keyevent", key]).await.map(|_| ())
    }

    /// Launch an app by package name through its launcher intent.
    async fn launch_package(&self, package: &str) -> Result<(), AdbError> {
        let output = self
            .shell(&[
                "monkey",
                "-p",
                package,
                "-c",
                "android.intent.category.LAUNCHER",
                "1",
            ])
            .await?;
        if output.contains("No activities found") {
            return Err(AdbError::CommandFailed(format!(
                "package {} is not installed",
                package
            )));
        }
        Ok(())
    }

    /// Press the home button.
    async fn press_home(&self) -> Result<(), AdbError> {
        self.key_event(keycode::HOME).await
    }

    /// Capture the screen for vision mode.
    async fn screenshot(&self) -> Screenshot {
        Screenshot::fallback(false)
    }
}

/// A device reached through the `adb` binary.
#[derive(Debug, Clone)]
pub struct AdbDevice {
    adb_path: String,
    device_id: Option<String>,
    timeout: Duration,
}

impl Default for AdbDevice {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AdbDevice {
    /// Create a handle; `device_id` pins `-s <serial>` on every command.
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            adb_path: "adb".to_string(),
            device_id,
            timeout: Duration::from_secs(DEFAULT_ADB_TIMEOUT_SECS),
        }
    }

    /// Use a custom adb binary.
    pub fn with_adb_path(mut self, adb_path: impl Into<String>) -> Self {
        self.adb_path = adb_path.into();
        self
    }

    /// Override the per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the target device.
    ///
    /// A pinned serial is kept as-is. Otherwise the first online device from
    /// `adb devices` is selected.
    pub async fn connect(&mut self) -> Result<String, AdbError> {
        if let Some(id) = &self.device_id {
            return Ok(id.clone());
        }

        let output = run_adb_checked(&self.adb_path, None, &["devices"], self.timeout).await?;
        match first_online_device(&output) {
            Some(id) => {
                tracing::info!("Using device {}", id);
                self.device_id = Some(id.clone());
                Ok(id)
            }
            None => Err(AdbError::DeviceNotFound(
                "no online device in `adb devices`".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Device for AdbDevice {
    fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    async fn shell(&self, args: &[&str]) -> Result<String, AdbError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        run_adb_checked(&self.adb_path, self.device_id.as_deref(), &full, self.timeout).await
    }

    async fn screenshot(&self) -> Screenshot {
        match run_adb(
            &self.adb_path,
            self.device_id.as_deref(),
            &["exec-out", "screencap", "-p"],
            self.timeout,
        )
        .await
        {
            Ok(output) => decode_screencap(&output.stdout, &String::from_utf8_lossy(&output.stderr)),
            Err(e) => {
                tracing::error!("Screenshot command failed: {}", e);
                Screenshot::fallback(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::mock::MockDevice;
    use crate::adb::screen::tests::SAMPLE_DUMP;

    #[tokio::test]
    async fn test_ui_dump_sequence() {
        let device = MockDevice::new().with_dump(SAMPLE_DUMP);
        let xml = device.ui_dump().await.unwrap().unwrap();
        assert!(xml.contains("Chicken McNuggets"));

        let calls = device.calls();
        assert_eq!(calls[0], "rm /sdcard/window_dump.xml");
        assert_eq!(calls[1], "uiautomator dump");
        assert_eq!(calls[2], "cat /sdcard/window_dump.xml");
    }

    #[tokio::test]
    async fn test_ui_dump_banner_only() {
        let device = MockDevice::new().with_dump("UI hierchary dumped to: /sdcard/window_dump.xml");
        assert!(device.ui_dump().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tap_text_taps_center() {
        let device = MockDevice::new().with_dump(SAMPLE_DUMP);
        assert!(device.tap_text("McNuggets").await.unwrap());
        assert_eq!(device.calls().last().unwrap(), "input tap 370 840");
    }

    #[tokio::test]
    async fn test_tap_text_missing() {
        let device = MockDevice::new().with_dump(SAMPLE_DUMP);
        assert!(!device.tap_text("Checkout").await.unwrap());
        assert!(!device.calls().iter().any(|c| c.starts_with("input tap")));
    }

    #[tokio::test]
    async fn test_input_text_ascii() {
        let device = MockDevice::new();
        device.input_text("chicken nuggets").await.unwrap();
        assert_eq!(device.calls(), vec!["input text chicken%snuggets"]);
    }

    #[tokio::test]
    async fn test_input_text_unicode_switches_ime() {
        let device = MockDevice::new().with_response(
            "settings get secure default_input_method",
            "com.google.android.inputmethod.latin/.LatinIME",
        );
        device.input_text("पनीर").await.unwrap();

        let calls = device.calls();
        assert_eq!(calls[1], format!("ime set {}", ADB_KEYBOARD_IME));
        assert!(calls[2].starts_with("am broadcast -a ADB_INPUT_B64"));
        assert_eq!(calls[3], "ime set com.google.android.inputmethod.latin/.LatinIME");
    }

    #[tokio::test]
    async fn test_launch_package_not_installed() {
        let device = MockDevice::new().with_response(
            "monkey -p com.example.missing -c android.intent.category.LAUNCHER 1",
            "** No activities found to run, monkey aborted.",
        );
        assert!(device.launch_package("com.example.missing").await.is_err());
    }

    #[tokio::test]
    async fn test_connect_pinned_device() {
        let mut device = AdbDevice::new(Some("emulator-5554".to_string()));
        assert_eq!(device.connect().await.unwrap(), "emulator-5554");
    }
}
