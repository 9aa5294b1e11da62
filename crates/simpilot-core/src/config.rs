//! Persistent configuration for simpilot.
//!
//! Settings live in `~/.simpilot/config.json`. Every field is optional; a
//! missing or unreadable file yields the built-in defaults. The server
//! overlays command-line flags and environment variables on top before
//! handing the core its [`SessionDefaults`] and [`BootPolicy`].
//!
//! # Example
//!
//! ```no_run
//! use simpilot_core::config::SimpilotConfig;
//!
//! let config = SimpilotConfig::load();
//! let defaults = config.session_defaults();
//! println!("default device: {}", defaults.device_name);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const CONFIG_FILENAME: &str = "config.json";

pub const DEFAULT_DEVICE: &str = "iPhone 15";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BOOT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BOOT_POLL_INITIAL_MS: u64 = 250;
pub const DEFAULT_BOOT_POLL_MAX_MS: u64 = 2000;

/// Returns the simpilot home directory (`~/.simpilot/`).
pub fn simpilot_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".simpilot")
}

/// Default location for log files (`~/.simpilot/logs/`).
pub fn default_log_dir() -> PathBuf {
    simpilot_dir().join("logs")
}

/// Process-wide defaults applied to session creation when the caller leaves
/// a field unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDefaults {
    pub device_name: String,
    pub platform_version: Option<String>,
    /// Upper bound on device resolution during session creation.
    pub timeout: Duration,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE.to_string(),
            platform_version: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// How long to wait for a booted state after starting a device, and how
/// often to look.
///
/// The interval starts at `initial_interval` and doubles after every check,
/// capped at `max_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootPolicy {
    pub timeout: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for BootPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_BOOT_TIMEOUT_SECS),
            initial_interval: Duration::from_millis(DEFAULT_BOOT_POLL_INITIAL_MS),
            max_interval: Duration::from_millis(DEFAULT_BOOT_POLL_MAX_MS),
        }
    }
}

/// Persistent simpilot configuration.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct SimpilotConfig {
    /// Device name used when a session request names none.
    #[serde(default)]
    pub default_device: Option<String>,

    /// OS version used when a session request names none.
    #[serde(default)]
    pub default_os: Option<String>,

    /// Resolution timeout for session creation, in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub boot_timeout_secs: Option<u64>,

    #[serde(default)]
    pub boot_poll_initial_ms: Option<u64>,

    #[serde(default)]
    pub boot_poll_max_ms: Option<u64>,

    /// Directory for the server log file.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl SimpilotConfig {
    /// Load config from `~/.simpilot/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&simpilot_dir().join(CONFIG_FILENAME))
    }

    /// Load config from an explicit path, with the same fallback as [`load`](Self::load).
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn session_defaults(&self) -> SessionDefaults {
        let fallback = SessionDefaults::default();
        SessionDefaults {
            device_name: self
                .default_device
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(fallback.device_name),
            platform_version: self.default_os.clone().filter(|v| !v.trim().is_empty()),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(fallback.timeout),
        }
    }

    pub fn boot_policy(&self) -> BootPolicy {
        let fallback = BootPolicy::default();
        let initial_interval = self
            .boot_poll_initial_ms
            .map(Duration::from_millis)
            .unwrap_or(fallback.initial_interval);
        BootPolicy {
            timeout: self
                .boot_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(fallback.timeout),
            initial_interval,
            max_interval: self
                .boot_poll_max_ms
                .map(Duration::from_millis)
                .unwrap_or(fallback.max_interval)
                .max(initial_interval),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_dir)
    }
}
