//! MCP tool parameter and response types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use simpilot_core::session::Session;

// =============================================================================
// Listings
// =============================================================================

/// Parameters for tools that take no arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NoParams {}

// =============================================================================
// Session management
// =============================================================================

/// Parameters for create_session
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CreateSessionParams {
    /// Simulator name (e.g. "iPhone 15 Pro") or UDID. Partial names are
    /// accepted; an exact name always wins over longer names containing it.
    /// Defaults to the server's configured device.
    #[serde(default)]
    pub device_name: Option<String>,

    /// OS version to pin (e.g. "17.0"). Defaults to the server's configured
    /// version, if any.
    #[serde(default)]
    pub platform_version: Option<String>,

    /// Seconds to allow for device resolution.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Parameters for tools addressing one session
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionParams {
    /// Session identifier returned by create_session
    pub session_id: String,
}

/// Session details returned by session tools
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionResponse {
    pub session_id: String,
    pub udid: String,
    /// Device name as requested
    pub device_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp
    pub last_used_at: String,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.to_string(),
            udid: session.udid.clone(),
            device_name: session.device_name.clone(),
            platform_version: session.platform_version.clone(),
            created_at: session.created_at.to_rfc3339(),
            last_used_at: session.last_used_at.to_rfc3339(),
        }
    }
}

// =============================================================================
// Direct device access
// =============================================================================

/// Parameters for tools addressing a simulator by UDID
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UdidParams {
    /// Simulator UDID (8-4-4-4-12 hex)
    pub udid: String,
}

// =============================================================================
// Apps
// =============================================================================

/// Parameters for install_app
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallAppParams {
    pub session_id: String,

    /// Path to a built `.app` bundle on the host
    pub app_path: String,
}

/// Parameters for launch_app
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LaunchAppParams {
    pub session_id: String,

    /// Bundle identifier (e.g. "com.example.MyApp")
    pub bundle_id: String,

    /// Arguments passed to the app on launch
    #[serde(default)]
    pub args: Vec<String>,
}

/// Parameters for terminate_app
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TerminateAppParams {
    pub session_id: String,
    pub bundle_id: String,
}

// =============================================================================
// Interaction
// =============================================================================

/// Parameters for tap
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TapParams {
    pub session_id: String,

    /// X coordinate in points
    pub x: f64,

    /// Y coordinate in points
    pub y: f64,
}

/// Parameters for screenshot
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScreenshotParams {
    pub session_id: String,

    /// Also write the PNG to this path on the host (`~` is expanded)
    #[serde(default)]
    pub save_path: Option<String>,
}

/// Outcome of an action tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub udid: Option<String>,

    pub success: bool,

    pub message: String,
}
