//! ADB process plumbing and connection management.

use std::process::Output;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Default timeout applied to every adb invocation.
pub const DEFAULT_ADB_TIMEOUT_SECS: u64 = 20;

/// Type of ADB connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Wifi,
    Remote,
}

/// Information about a connected device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

impl DeviceInfo {
    /// Whether the device is ready to accept commands.
    pub fn is_online(&self) -> bool {
        self.status == "device"
    }
}

/// ADB errors.
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("adb command timed out after {0}s")]
    Timeout(u64),
    #[error("ADB not found: {0}")]
    NotInstalled(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Invalid UI dump: {0}")]
    InvalidDump(String),
}

/// Build the full adb argument list, with `-s <id>` when a device is pinned.
pub(crate) fn adb_args(device_id: Option<&str>, args: &[&str]) -> Vec<String> {
    let mut full = Vec::with_capacity(args.len() + 2);
    if let Some(id) = device_id {
        full.push("-s".to_string());
        full.push(id.to_string());
    }
    full.extend(args.iter().map(|a| a.to_string()));
    full
}

/// Run adb with a timeout and return the raw process output.
pub(crate) async fn run_adb(
    adb_path: &str,
    device_id: Option<&str>,
    args: &[&str],
    timeout: Duration,
) -> Result<Output, AdbError> {
    let full = adb_args(device_id, args);
    tracing::trace!(cmd = %full.join(" "), "adb");

    let child = Command::new(adb_path).args(&full).kill_on_drop(true).output();

    tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| AdbError::Timeout(timeout.as_secs()))?
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AdbError::NotInstalled(format!("'{}' is not in PATH", adb_path))
            }
            _ => AdbError::CommandFailed(e.to_string()),
        })
}

/// Run adb and return trimmed stdout, failing on a non-zero exit status.
pub(crate) async fn run_adb_checked(
    adb_path: &str,
    device_id: Option<&str>,
    args: &[&str],
    timeout: Duration,
) -> Result<String, AdbError> {
    let output = run_adb(adb_path, device_id, args, timeout).await?;
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

    if output.status.success() {
        Ok(stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            stdout
        } else {
            stderr.trim().to_string()
        };
        Err(AdbError::CommandFailed(detail))
    }
}

/// Parse the output of `adb devices [-l]`.
pub fn parse_device_list(output: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for line in output.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('*') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let device_id = parts[0].to_string();
        let connection_type = if device_id.contains(':') {
            ConnectionType::Remote
        } else if device_id.starts_with("emulator-") {
            ConnectionType::Wifi
        } else {
            ConnectionType::Usb
        };

        let model = parts
            .iter()
            .find(|p| p.starts_with("model:"))
            .map(|m| m.trim_start_matches("model:").to_string());

        devices.push(DeviceInfo {
            device_id,
            status: parts[1].to_string(),
            connection_type,
            model,
        });
    }

    devices
}

/// Pick the first online device from `adb devices` output.
pub fn first_online_device(output: &str) -> Option<String> {
    parse_device_list(output)
        .into_iter()
        .find(|d| d.is_online())
        .map(|d| d.device_id)
}

/// Default port for `adb connect` when the address has none.
pub const DEFAULT_ADB_PORT: u16 = 5555;

/// Append the default port unless `address` already carries one.
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    if address.contains(':') {
        address.to_string()
    } else {
        format!("{}:{}", address, DEFAULT_ADB_PORT)
    }
}

/// Judge the combined stdout/stderr of `adb connect`.
pub fn check_connect_output(address: &str, output: &str) -> Result<String, AdbError> {
    let lower = output.to_lowercase();
    if lower.contains("connected") && !lower.contains("cannot") {
        Ok(format!("Connected to {}", address))
    } else {
        Err(AdbError::Connection(output.trim().to_string()))
    }
}

/// Manages the adb server and remote device connections.
///
/// # Example
/// ```rust,no_run
/// use neuro_run::adb::ADBConnection;
///
/// # async fn demo() -> Result<(), neuro_run::adb::AdbError> {
/// let conn = ADBConnection::new();
/// conn.connect("192.168.1.100:5555").await?;
/// let devices = conn.list_devices().await?;
/// # Ok(())
/// # }
/// ```
pub struct ADBConnection {
    adb_path: String,
    timeout: Duration,
}

impl Default for ADBConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ADBConnection {
    /// Create a connection manager using `adb` from PATH.
    pub fn new() -> Self {
        Self::with_path("adb")
    }

    /// Create a connection manager with a custom adb binary.
    pub fn with_path(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            timeout: Duration::from_secs(DEFAULT_ADB_TIMEOUT_SECS),
        }
    }

    /// Connect to a remote device via TCP/IP. Port 5555 is assumed when omitted.
    pub async fn connect(&self, address: &str) -> Result<String, AdbError> {
        let address = normalize_address(address);
        let output = run_adb(&self.adb_path, None, &["connect", &address], self.timeout).await?;
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        check_connect_output(&address, &combined)
    }

    /// Disconnect a remote device, or all of them when `address` is None.
    pub async fn disconnect(&self, address: Option<&str>) -> Result<String, AdbError> {
        let mut args = vec!["disconnect"];
        if let Some(addr) = address {
            args.push(addr);
        }
        run_adb_checked(&self.adb_path, None, &args, self.timeout).await
    }

    /// List all attached devices.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let stdout = run_adb_checked(&self.adb_path, None, &["devices", "-l"], self.timeout).await?;
        Ok(parse_device_list(&stdout))
    }

    /// Check whether the adb binary responds.
    pub async fn is_running(&self) -> bool {
        run_adb(&self.adb_path, None, &["devices"], self.timeout)
            .await
            .is_ok()
    }

    /// Start the adb server.
    pub async fn start_server(&self) -> Result<(), AdbError> {
        run_adb_checked(&self.adb_path, None, &["start-server"], self.timeout).await?;
        Ok(())
    }

    /// Kill the adb server.
    pub async fn kill_server(&self) -> Result<(), AdbError> {
        run_adb_checked(&self.adb_path, None, &["kill-server"], self.timeout).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES_OUTPUT: &str = "List of devices attached\n\
        R58M123ABC\toffline\n\
        emulator-5554\tdevice product:sdk_gphone64 model:sdk_gphone64_x86_64 device:emu64x\n\
        192.168.1.20:5555\tdevice model:Pixel_7\n";

    #[test]
    fn test_adb_args() {
        assert_eq!(adb_args(None, &["devices"]), vec!["devices"]);
        assert_eq!(
            adb_args(Some("device123"), &["shell", "ls"]),
            vec!["-s", "device123", "shell", "ls"]
        );
    }

    #[test]
    fn test_parse_device_list() {
        let devices = parse_device_list(DEVICES_OUTPUT);
        assert_eq!(devices.len(), 3);
        assert!(!devices[0].is_online());
        assert_eq!(devices[1].model.as_deref(), Some("sdk_gphone64_x86_64"));
        assert_eq!(devices[2].connection_type, ConnectionType::Remote);
    }

    #[test]
    fn test_first_online_device_skips_offline() {
        assert_eq!(
            first_online_device(DEVICES_OUTPUT),
            Some("emulator-5554".to_string())
        );
        assert_eq!(first_online_device("List of devices attached\n\n"), None);
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("192.168.1.100"), "192.168.1.100:5555");
        assert_eq!(normalize_address(" 10.0.0.2:5037 "), "10.0.0.2:5037");
    }

    #[test]
    fn test_check_connect_output() {
        assert_eq!(
            check_connect_output("10.0.0.2:5555", "connected to 10.0.0.2:5555\n").unwrap(),
            "Connected to 10.0.0.2:5555"
        );
        assert!(check_connect_output("10.0.0.2:5555", "already connected to 10.0.0.2:5555").is_ok());

        let err = check_connect_output(
            "10.0.0.9:5555",
            "cannot connect to 10.0.0.9:5555: Connection refused (111)\n",
        )
        .unwrap_err();
        assert!(matches!(err, AdbError::Connection(msg) if msg.ends_with("(111)")));
        assert!(check_connect_output("10.0.0.9:5555", "failed to connect to '10.0.0.9:5555'").is_err());
    }

    #[tokio::test]
    async fn test_server_control_without_adb() {
        let conn = ADBConnection::with_path("definitely-not-an-adb-binary");
        assert!(matches!(conn.start_server().await, Err(AdbError::NotInstalled(_))));
        assert!(matches!(conn.kill_server().await, Err(AdbError::NotInstalled(_))));
        assert!(matches!(
            conn.disconnect(Some("10.0.0.2:5555")).await,
            Err(AdbError::NotInstalled(_))
        ));
        assert!(matches!(
            conn.connect("10.0.0.2").await,
            Err(AdbError::NotInstalled(_))
        ));
        assert!(!conn.is_running().await);
    }

    #[tokio::test]
    async fn test_missing_adb_binary() {
        let err = run_adb(
            "definitely-not-an-adb-binary",
            None,
            &["devices"],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AdbError::NotInstalled(_)));
    }
}
