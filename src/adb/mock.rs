//! In-memory [`Device`] for deterministic tests.
//!
//! Records every shell command and serves canned outputs, so agent loops
//! can run without a phone attached.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::connection::AdbError;
use super::device::Device;
use super::screen::WINDOW_DUMP_PATH;

#[derive(Default)]
struct MockState {
    calls: Vec<String>,
    responses: HashMap<String, String>,
    failures: HashMap<String, String>,
    dumps: VecDeque<String>,
    last_dump: Option<String>,
}

/// A fake device that answers shell commands from a script.
///
/// # Example
/// ```
/// use neuro_run::adb::{mock::MockDevice, Device};
///
/// # tokio_test_block_on(async {
/// let device = MockDevice::new().with_response("getprop ro.product.model", "Pixel 7");
/// assert_eq!(device.shell(&["getprop", "ro.product.model"]).await.unwrap(), "Pixel 7");
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `output` whenever the joined command equals `command`.
    pub fn with_response(self, command: &str, output: &str) -> Self {
        self.lock()
            .responses
            .insert(command.to_string(), output.to_string());
        self
    }

    /// Fail whenever the joined command equals `command`.
    pub fn with_failure(self, command: &str, message: &str) -> Self {
        self.lock()
            .failures
            .insert(command.to_string(), message.to_string());
        self
    }

    /// Serve `xml` for every UI dump.
    pub fn with_dump(self, xml: &str) -> Self {
        self.lock().last_dump = Some(xml.to_string());
        self
    }

    /// Serve these dumps in order; the last one repeats once exhausted.
    pub fn with_dumps<I, S>(self, dumps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().dumps.extend(dumps.into_iter().map(Into::into));
        self
    }

    /// All shell commands received so far, space-joined.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Commands that start with `prefix`.
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Device for MockDevice {
    fn device_id(&self) -> Option<&str> {
        Some("mock-device")
    }

    async fn shell(&self, args: &[&str]) -> Result<String, AdbError> {
        let command = args.join(" ");
        let mut state = self.lock();
        state.calls.push(command.clone());

        if let Some(message) = state.failures.get(&command) {
            return Err(AdbError::CommandFailed(message.clone()));
        }

        if command == format!("cat {}", WINDOW_DUMP_PATH) {
            if let Some(next) = state.dumps.pop_front() {
                state.last_dump = Some(next);
            }
            return Ok(state.last_dump.clone().unwrap_or_default());
        }

        Ok(state.responses.get(&command).cloned().unwrap_or_default())
    }
}
