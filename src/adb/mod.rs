//! ADB (Android Debug Bridge) module for device interaction.

mod connection;
mod device;
pub mod input;
pub mod mock;
pub mod screen;
mod screenshot;

pub use connection::{
    check_connect_output, first_online_device, normalize_address, parse_device_list,
    ADBConnection, AdbError, ConnectionType, DeviceInfo, DEFAULT_ADB_PORT,
    DEFAULT_ADB_TIMEOUT_SECS,
};
pub use device::{keycode, AdbDevice, Device};
pub use screen::{summarize, UiNode, DEFAULT_SUMMARY_LIMIT};
pub use screenshot::Screenshot;
