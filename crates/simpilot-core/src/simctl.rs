//! Interface to Apple's `xcrun simctl` command-line tool.
//!
//! This module wraps the simulator control tool for device enumeration,
//! lifecycle changes, app management and screenshot capture.
//!
//! Every command runs with its stdout and stderr captured. Nothing from a
//! child process is ever forwarded to this process's stdout, which carries
//! the MCP transport.
//!
//! # Requirements
//!
//! Xcode must be installed for `xcrun simctl` to be available.
//!
//! # Example
//!
//! ```no_run
//! use simpilot_core::simctl::Simctl;
//!
//! # async fn example() -> Result<(), simpilot_core::simctl::SimctlError> {
//! for device in Simctl::list_devices().await? {
//!     println!("{}: {} ({})", device.name, device.udid, device.state);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::process::{Output, Stdio};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors that can occur when interacting with simctl.
#[derive(Error, Debug)]
pub enum SimctlError {
    /// A simctl command failed to execute successfully.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Failed to parse JSON output from simctl.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// An I/O error occurred while executing the command.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle state of a simulator as reported by simctl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    Shutdown,
    Booted,
    Booting,
    ShuttingDown,
    Unknown,
}

impl DeviceState {
    /// Maps a simctl state string onto a [`DeviceState`].
    ///
    /// Strings simctl may add in the future map to [`DeviceState::Unknown`].
    pub fn from_simctl(state: &str) -> Self {
        match state {
            "Shutdown" => Self::Shutdown,
            "Booted" => Self::Booted,
            "Booting" => Self::Booting,
            "Shutting Down" | "ShuttingDown" => Self::ShuttingDown,
            _ => Self::Unknown,
        }
    }

    /// Whether the simulator is up or on its way up.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Booted | Self::Booting)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Shutdown => "Shutdown",
            Self::Booted => "Booted",
            Self::Booting => "Booting",
            Self::ShuttingDown => "Shutting Down",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A read-only snapshot of one iOS Simulator device.
///
/// Snapshots are taken fresh on every enumeration; the state may already be
/// stale by the time a caller acts on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// The unique device identifier (UDID) for this simulator.
    pub udid: String,

    /// The human-readable name of the device (e.g., "iPhone 15 Pro").
    pub name: String,

    /// The runtime identifier the device belongs to
    /// (e.g., "com.apple.CoreSimulator.SimRuntime.iOS-17-0").
    pub runtime: String,

    /// The current state of the device.
    pub state: DeviceState,

    /// Whether simctl considers the device usable.
    pub is_available: bool,
}

impl Device {
    /// Creates an available, shut-down device snapshot.
    pub fn new(udid: impl Into<String>, name: impl Into<String>, runtime: impl Into<String>) -> Self {
        Self {
            udid: udid.into(),
            name: name.into(),
            runtime: runtime.into(),
            state: DeviceState::Shutdown,
            is_available: true,
        }
    }

    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.is_available = false;
        self
    }

    /// Human-readable OS version derived from the runtime identifier.
    ///
    /// `com.apple.CoreSimulator.SimRuntime.iOS-16-4` becomes `iOS 16.4`.
    /// Identifiers that don't follow the CoreSimulator scheme are returned
    /// unchanged.
    pub fn os_version(&self) -> String {
        runtime_display_name(&self.runtime)
    }
}

/// Renders a runtime identifier as `<platform> <version>`.
pub fn runtime_display_name(runtime: &str) -> String {
    let tail = runtime.rsplit('.').next().unwrap_or(runtime);
    match tail.split_once('-') {
        Some((platform, version)) if !platform.is_empty() && !version.is_empty() => {
            format!("{} {}", platform, version.replace('-', "."))
        }
        _ => runtime.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    udid: String,
    name: String,
    state: String,
    #[serde(rename = "isAvailable", default)]
    is_available: Option<bool>,
    /// Older Xcode releases report `"(available)"` / `"(unavailable, ...)"`.
    #[serde(default)]
    availability: Option<String>,
}

impl RawDevice {
    fn into_device(self, runtime: &str) -> Device {
        let is_available = match (self.is_available, self.availability.as_deref()) {
            (Some(flag), _) => flag,
            (None, Some(text)) => !text.contains("unavailable"),
            (None, None) => true,
        };
        Device {
            udid: self.udid,
            name: self.name,
            runtime: runtime.to_string(),
            state: DeviceState::from_simctl(&self.state),
            is_available,
        }
    }
}

/// Runtime groups stay in the order simctl prints them.
#[derive(Debug, Deserialize)]
struct DeviceList {
    devices: IndexMap<String, Vec<RawDevice>>,
}

/// Captured result of a process spawned inside a simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Wrapper for `xcrun simctl` commands.
///
/// Provides associated async functions for interacting with iOS Simulator
/// devices. Each call spawns one `xcrun` process.
pub struct Simctl;

impl Simctl {
    /// Lists every simulator device known to simctl.
    ///
    /// Queries `xcrun simctl list devices -j` and flattens the per-runtime
    /// groups into one list, copying the runtime key into each device.
    ///
    /// # Errors
    ///
    /// - [`SimctlError::Io`] if the command fails to execute
    /// - [`SimctlError::CommandFailed`] if simctl returns a non-zero exit code
    /// - [`SimctlError::JsonParse`] if the output cannot be parsed as JSON
    pub async fn list_devices() -> Result<Vec<Device>, SimctlError> {
        let output = run(&["list", "devices", "-j"]).await?;
        Self::parse_device_list(&output.stdout)
    }

    /// Boots a simulator device.
    ///
    /// A simulator that is already booted is not treated as an error.
    pub async fn boot(udid: &str) -> Result<(), SimctlError> {
        match run(&["boot", udid]).await {
            Err(SimctlError::CommandFailed(stderr)) if stderr.contains("current state: Booted") => {
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    /// Shuts down a simulator device.
    ///
    /// A simulator that is already shut down is not treated as an error.
    pub async fn shutdown(udid: &str) -> Result<(), SimctlError> {
        match run(&["shutdown", udid]).await {
            Err(SimctlError::CommandFailed(stderr))
                if stderr.contains("current state: Shutdown") =>
            {
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    /// Installs an `.app` bundle onto a booted simulator.
    pub async fn install_app(udid: &str, app_path: &Path) -> Result<(), SimctlError> {
        let path = app_path.to_string_lossy();
        run(&["install", udid, path.as_ref()]).await.map(|_| ())
    }

    /// Launches an installed app by bundle identifier.
    ///
    /// `args` are passed through to the app's `main`.
    pub async fn launch_app(udid: &str, bundle_id: &str, args: &[String]) -> Result<(), SimctlError> {
        let mut cmd: Vec<&str> = vec!["launch", udid, bundle_id];
        cmd.extend(args.iter().map(String::as_str));
        run(&cmd).await.map(|_| ())
    }

    /// Terminates a running app by bundle identifier.
    pub async fn terminate_app(udid: &str, bundle_id: &str) -> Result<(), SimctlError> {
        run(&["terminate", udid, bundle_id]).await.map(|_| ())
    }

    /// Takes a screenshot of the simulator screen and returns PNG bytes.
    ///
    /// The image is written to a temporary file which is removed after it
    /// has been read back.
    pub async fn screenshot(udid: &str) -> Result<Vec<u8>, SimctlError> {
        let temp_path = std::env::temp_dir()
            .join(format!("simpilot_screenshot_{}.png", uuid::Uuid::new_v4()));
        let temp = temp_path.to_string_lossy().to_string();

        run(&["io", udid, "screenshot", "--type=png", &temp]).await?;

        let bytes = tokio::fs::read(&temp_path).await;
        let _ = tokio::fs::remove_file(&temp_path).await;
        Ok(bytes?)
    }

    /// Runs an arbitrary executable inside the simulator via `simctl spawn`.
    ///
    /// A non-zero exit status is reported through [`ProcessOutput::exit_code`]
    /// rather than as an error.
    pub async fn spawn(udid: &str, program: &str, args: &[String]) -> Result<ProcessOutput, SimctlError> {
        let mut cmd: Vec<&str> = vec!["spawn", udid, program];
        cmd.extend(args.iter().map(String::as_str));
        let output = xcrun(&cmd).await?;
        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Parses device list JSON into a flat vector of devices.
    ///
    /// Takes raw bytes as printed by `simctl list devices -j`. Runtime groups
    /// are visited in key order, so the result is deterministic.
    ///
    /// # Errors
    ///
    /// - [`SimctlError::JsonParse`] if the JSON is invalid or has unexpected structure
    pub fn parse_device_list(json: &[u8]) -> Result<Vec<Device>, SimctlError> {
        let device_list: DeviceList = serde_json::from_slice(json)?;
        let devices = device_list
            .devices
            .into_iter()
            .flat_map(|(runtime, devices)| {
                devices
                    .into_iter()
                    .map(move |raw| raw.into_device(&runtime))
            })
            .collect();
        Ok(devices)
    }
}

/// UDIDs of the booted devices in a snapshot.
pub fn booted_udids_in(devices: &[Device]) -> Vec<String> {
    devices
        .iter()
        .filter(|d| d.state == DeviceState::Booted)
        .map(|d| d.udid.clone())
        .collect()
}

async fn xcrun(args: &[&str]) -> Result<Output, SimctlError> {
    debug!(args = ?args, "xcrun simctl");
    let output = Command::new("xcrun")
        .arg("simctl")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await?;
    Ok(output)
}

/// Runs a simctl subcommand, mapping a non-zero exit status to
/// [`SimctlError::CommandFailed`] carrying stderr.
async fn run(args: &[&str]) -> Result<Output, SimctlError> {
    let output = xcrun(args).await?;
    if !output.status.success() {
        return Err(SimctlError::CommandFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sample JSON matching actual simctl output format
    const SAMPLE_DEVICE_LIST: &str = r#"{
        "devices": {
            "com.apple.CoreSimulator.SimRuntime.iOS-17-0": [
                {
                    "udid": "A1B2C3D4-E5F6-7890-ABCD-EF1234567890",
                    "name": "iPhone 15 Pro",
                    "state": "Booted",
                    "isAvailable": true,
                    "deviceTypeIdentifier": "com.apple.CoreSimulator.SimDeviceType.iPhone-15-Pro"
                },
                {
                    "udid": "B2C3D4E5-F6A7-8901-BCDE-F12345678901",
                    "name": "iPhone 15",
                    "state": "Shutdown",
                    "isAvailable": true
                }
            ],
            "com.apple.CoreSimulator.SimRuntime.iOS-16-4": [
                {
                    "udid": "C3D4E5F6-A7B8-9012-CDEF-123456789012",
                    "name": "iPhone 14",
                    "state": "Shutdown",
                    "isAvailable": false,
                    "availabilityError": "runtime profile not found"
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_device_list_success() {
        let devices = Simctl::parse_device_list(SAMPLE_DEVICE_LIST.as_bytes())
            .expect("Should parse valid JSON");

        assert_eq!(devices.len(), 3);

        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"iPhone 15 Pro"));
        assert!(names.contains(&"iPhone 15"));
        assert!(names.contains(&"iPhone 14"));
    }

    #[test]
    fn test_parse_copies_runtime_key_into_devices() {
        let devices = Simctl::parse_device_list(SAMPLE_DEVICE_LIST.as_bytes()).unwrap();
        let iphone14 = devices.iter().find(|d| d.name == "iPhone 14").unwrap();
        assert_eq!(iphone14.runtime, "com.apple.CoreSimulator.SimRuntime.iOS-16-4");
    }

    #[test]
    fn test_parse_keeps_simctl_runtime_order() {
        let json = r#"{"devices": {
            "com.apple.CoreSimulator.SimRuntime.iOS-18-0": [
                {"udid": "N1", "name": "iPhone 16", "state": "Shutdown", "isAvailable": true}
            ],
            "com.apple.CoreSimulator.SimRuntime.iOS-9-3": [
                {"udid": "O1", "name": "iPhone 6s", "state": "Shutdown", "isAvailable": true}
            ],
            "com.apple.CoreSimulator.SimRuntime.iOS-17-0": [
                {"udid": "M1", "name": "iPhone 15", "state": "Shutdown", "isAvailable": true}
            ]
        }}"#;
        let devices = Simctl::parse_device_list(json.as_bytes()).unwrap();
        let udids: Vec<&str> = devices.iter().map(|d| d.udid.as_str()).collect();
        assert_eq!(udids, vec!["N1", "O1", "M1"]);
    }

    #[test]
    fn test_parse_availability_flag() {
        let devices = Simctl::parse_device_list(SAMPLE_DEVICE_LIST.as_bytes()).unwrap();
        let iphone14 = devices.iter().find(|d| d.name == "iPhone 14").unwrap();
        assert!(!iphone14.is_available);
        let iphone15 = devices.iter().find(|d| d.name == "iPhone 15").unwrap();
        assert!(iphone15.is_available);
    }

    #[test]
    fn test_parse_legacy_availability_string() {
        let json = r#"{
            "devices": {
                "iOS 12.4": [
                    {"udid": "u1", "name": "iPhone X", "state": "Shutdown", "availability": "(available)"},
                    {"udid": "u2", "name": "iPhone 6", "state": "Shutdown", "availability": "(unavailable, runtime profile not found)"}
                ]
            }
        }"#;
        let devices = Simctl::parse_device_list(json.as_bytes()).unwrap();
        assert!(devices[0].is_available);
        assert!(!devices[1].is_available);
    }

    #[test]
    fn test_parse_missing_availability_means_available() {
        let json = r#"{"devices": {"rt": [{"udid": "u", "name": "n", "state": "Booted"}]}}"#;
        let devices = Simctl::parse_device_list(json.as_bytes()).unwrap();
        assert!(devices[0].is_available);
        assert_eq!(devices[0].state, DeviceState::Booted);
    }

    #[test]
    fn test_parse_device_list_empty() {
        let devices = Simctl::parse_device_list(br#"{"devices": {}}"#)
            .expect("Should parse empty device list");
        assert!(devices.is_empty());
    }

    #[test]
    fn test_parse_device_list_invalid_json() {
        let result = Simctl::parse_device_list(b"not valid json");
        match result {
            Err(SimctlError::JsonParse(_)) => {}
            Err(e) => panic!("Expected JsonParse error, got: {:?}", e),
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }

    #[test]
    fn test_parse_device_list_missing_devices_key() {
        let result = Simctl::parse_device_list(br#"{"something_else": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_device_state_mapping() {
        assert_eq!(DeviceState::from_simctl("Booted"), DeviceState::Booted);
        assert_eq!(DeviceState::from_simctl("Shutdown"), DeviceState::Shutdown);
        assert_eq!(DeviceState::from_simctl("Booting"), DeviceState::Booting);
        assert_eq!(DeviceState::from_simctl("Shutting Down"), DeviceState::ShuttingDown);
        assert_eq!(DeviceState::from_simctl("Creating"), DeviceState::Unknown);
        assert!(DeviceState::Booting.is_running());
        assert!(!DeviceState::ShuttingDown.is_running());
    }

    #[test]
    fn test_booted_udids_in() {
        let devices = Simctl::parse_device_list(SAMPLE_DEVICE_LIST.as_bytes()).unwrap();
        assert_eq!(
            booted_udids_in(&devices),
            vec!["A1B2C3D4-E5F6-7890-ABCD-EF1234567890".to_string()]
        );
        assert!(booted_udids_in(&[]).is_empty());
    }

    #[test]
    fn test_runtime_display_name() {
        assert_eq!(
            runtime_display_name("com.apple.CoreSimulator.SimRuntime.iOS-16-4"),
            "iOS 16.4"
        );
        assert_eq!(
            runtime_display_name("com.apple.CoreSimulator.SimRuntime.watchOS-10-0"),
            "watchOS 10.0"
        );
        assert_eq!(runtime_display_name("iOS 12.4"), "iOS 12.4");
    }

    #[test]
    fn test_simctl_error_display() {
        let cmd_err = SimctlError::CommandFailed("test error".to_string());
        assert!(cmd_err.to_string().contains("test error"));
    }

    #[cfg(target_os = "macos")]
    mod macos_tests {
        use super::*;

        #[tokio::test]
        async fn test_boot_with_invalid_udid() {
            let result = Simctl::boot("invalid-udid-that-does-not-exist").await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_screenshot_with_invalid_udid() {
            let result = Simctl::screenshot("invalid-udid-that-does-not-exist").await;
            assert!(result.is_err());
        }
    }
}
