//! Command-line flags and their overlay on the config file.
//!
//! Precedence, lowest first: built-in defaults, `~/.simpilot/config.json`
//! (or `--config`), then flags and their environment variables.

use std::path::PathBuf;

use clap::Parser;
use simpilot_core::config::{BootPolicy, SessionDefaults, SimpilotConfig};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "simpilot-mcp")]
#[command(about = "MCP server for driving iOS Simulators over stdio", version)]
pub struct Args {
    /// Device name used when create_session names none
    #[arg(long, env = "SIMPILOT_DEFAULT_DEVICE")]
    pub default_device: Option<String>,

    /// OS version pinned when create_session names none
    #[arg(long, env = "SIMPILOT_DEFAULT_OS")]
    pub default_os: Option<String>,

    /// Device resolution timeout in seconds
    #[arg(long, env = "SIMPILOT_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Directory for simpilot-mcp.log
    #[arg(long, env = "SIMPILOT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Config file to read instead of ~/.simpilot/config.json
    #[arg(long, env = "SIMPILOT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Fully resolved server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub defaults: SessionDefaults,
    pub boot_policy: BootPolicy,
    pub log_dir: PathBuf,
}

impl Args {
    pub fn load_config(&self) -> SimpilotConfig {
        match &self.config {
            Some(path) => SimpilotConfig::load_from(path),
            None => SimpilotConfig::load(),
        }
    }

    /// Overlays these flags on `config`.
    pub fn settings(&self, mut config: SimpilotConfig) -> ServerSettings {
        if let Some(device) = self.default_device.clone().filter(|d| !d.trim().is_empty()) {
            config.default_device = Some(device);
        }
        if let Some(os) = self.default_os.clone().filter(|v| !v.trim().is_empty()) {
            config.default_os = Some(os);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = Some(timeout);
        }
        if let Some(log_dir) = self.log_dir.clone() {
            config.log_dir = Some(log_dir);
        }

        ServerSettings {
            defaults: config.session_defaults(),
            boot_policy: config.boot_policy(),
            log_dir: config.log_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn flags_override_config_file() {
        let config = SimpilotConfig {
            default_device: Some("iPhone 14".to_string()),
            default_os: Some("16.4".to_string()),
            timeout_secs: Some(10),
            ..Default::default()
        };
        let args = Args {
            default_device: Some("iPad Air".to_string()),
            timeout: Some(3),
            ..Default::default()
        };

        let settings = args.settings(config);
        assert_eq!(settings.defaults.device_name, "iPad Air");
        assert_eq!(settings.defaults.platform_version.as_deref(), Some("16.4"));
        assert_eq!(settings.defaults.timeout, Duration::from_secs(3));
    }

    #[test]
    fn blank_flags_do_not_clear_config() {
        let config = SimpilotConfig {
            default_device: Some("iPhone 14".to_string()),
            ..Default::default()
        };
        let args = Args {
            default_device: Some(" ".to_string()),
            ..Default::default()
        };
        assert_eq!(args.settings(config).defaults.device_name, "iPhone 14");
    }

    #[test]
    fn defaults_without_flags_or_file() {
        let settings = Args::default().settings(SimpilotConfig::default());
        assert_eq!(settings.defaults, SessionDefaults::default());
        assert_eq!(settings.boot_policy, BootPolicy::default());
    }

    #[test]
    fn parses_long_flags() {
        let args = Args::try_parse_from([
            "simpilot-mcp",
            "--default-device",
            "iPhone 15 Pro",
            "--default-os",
            "17.0",
            "--log-dir",
            "/tmp/simpilot",
        ])
        .unwrap();
        assert_eq!(args.default_device.as_deref(), Some("iPhone 15 Pro"));
        assert_eq!(args.default_os.as_deref(), Some("17.0"));
        assert_eq!(args.log_dir, Some(PathBuf::from("/tmp/simpilot")));
    }

    #[test]
    fn explicit_config_path_is_read() {
        let path = std::env::temp_dir().join(format!("simpilot_mcp_config_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"default_device": "iPhone SE (3rd generation)"}"#).unwrap();
        let args = Args {
            config: Some(path.clone()),
            ..Default::default()
        };
        let config = args.load_config();
        let _ = std::fs::remove_file(&path);
        assert_eq!(config.default_device.as_deref(), Some("iPhone SE (3rd generation)"));
    }
}
