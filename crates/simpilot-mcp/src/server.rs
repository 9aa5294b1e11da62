//! Simulator MCP server.
//!
//! Routes MCP tool calls to the [`SessionRegistry`] using rmcp's
//! `#[tool_router]` pattern. All user-facing text is produced here; the
//! registry only reports success, failure, or a typed resolution error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router, ErrorData as McpError, RoleServer,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use simpilot_core::error::RegistryError;
use simpilot_core::registry::{EndedSession, SessionOptions, SessionRegistry};
use simpilot_core::resolver::is_udid;
use simpilot_core::session::{Session, SessionInfo};

use crate::format::{devices_table, resolve_failure, sessions_table};
use crate::tools::*;

pub const SESSIONS_URI: &str = "simulator://sessions";
pub const DEVICES_URI: &str = "simulator://devices";

/// Trim whitespace and one pair of matching surrounding quotes.
fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    let quoted = s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')));
    if quoted {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn parse_session_id(raw: &str) -> Result<Uuid, McpError> {
    Uuid::parse_str(strip_quotes(raw)).map_err(|_| {
        McpError::invalid_params(format!("Invalid session ID format: {raw}"), None)
    })
}

fn parse_udid(raw: &str) -> Result<String, McpError> {
    let udid = strip_quotes(raw);
    if is_udid(udid) {
        Ok(udid.to_string())
    } else {
        Err(McpError::invalid_params(
            format!("Invalid UDID format: {raw}. Expected XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX"),
            None,
        ))
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

fn json_text<T: serde::Serialize>(value: &T, fallback: impl FnOnce() -> String) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| fallback())
}

fn action_result(response: ActionResponse) -> CallToolResult {
    let success = response.success;
    let text = json_text(&response, || response.message.clone());
    if success {
        CallToolResult::success(vec![Content::text(text)])
    } else {
        CallToolResult::error(vec![Content::text(text)])
    }
}

fn session_not_found(id: &Uuid) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format!(
        "Session '{id}' not found. Use list_sessions to see active sessions."
    ))])
}

/// iOS Simulator MCP server.
#[derive(Clone)]
pub struct SimulatorMcpServer {
    registry: Arc<SessionRegistry>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SimulatorMcpServer {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            tool_router: Self::tool_router(),
        }
    }

    /// Looks up a session by its raw id, producing a tool error if absent.
    async fn session(&self, raw_id: &str) -> Result<Result<Session, CallToolResult>, McpError> {
        let id = parse_session_id(raw_id)?;
        Ok(self.registry.get(&id).await.ok_or_else(|| session_not_found(&id)))
    }

    fn session_action(
        session: &Session,
        success: bool,
        done: String,
        failed: String,
    ) -> CallToolResult {
        action_result(ActionResponse {
            session_id: Some(session.id.to_string()),
            udid: Some(session.udid.clone()),
            success,
            message: if success { done } else { failed },
        })
    }

    pub(crate) async fn sessions_json(&self) -> String {
        let sessions: Vec<SessionInfo> = self.registry.list().await.iter().map(Session::info).collect();
        json_text(&sessions, || "[]".to_string())
    }

    pub(crate) async fn devices_json(&self) -> Result<String, McpError> {
        let devices = self.registry.list_devices().await.map_err(|e| {
            McpError::internal_error(format!("Failed to enumerate simulators: {e}"), None)
        })?;
        Ok(json_text(&devices, || "[]".to_string()))
    }

    // ── Devices ─────────────────────────────────────────────────────────

    #[tool(description = "List available iOS simulators with their OS version, state, UDID and number of sessions bound to each")]
    #[instrument(skip_all)]
    async fn list_available_devices(
        &self,
        Parameters(_params): Parameters<NoParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.registry.list_devices().await {
            Ok(devices) => {
                let available: Vec<_> = devices.into_iter().filter(|d| d.is_available).collect();
                info!(count = available.len(), "listed available devices");
                let sessions = self.registry.list().await;
                Ok(CallToolResult::success(vec![Content::text(devices_table(
                    &available, &sessions,
                ))]))
            }
            Err(e) => {
                warn!(error = %e, "device enumeration failed");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Failed to enumerate simulators: {e}"
                ))]))
            }
        }
    }

    #[tool(description = "List iOS simulators that are currently booted")]
    #[instrument(skip_all)]
    async fn list_booted_devices(
        &self,
        Parameters(_params): Parameters<NoParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.registry.booted_devices().await {
            Ok(booted) => {
                if booted.is_empty() {
                    return Ok(CallToolResult::success(vec![Content::text(
                        "No booted simulators.",
                    )]));
                }
                let sessions = self.registry.list().await;
                Ok(CallToolResult::success(vec![Content::text(devices_table(
                    &booted, &sessions,
                ))]))
            }
            Err(e) => {
                warn!(error = %e, "device enumeration failed");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Failed to enumerate simulators: {e}"
                ))]))
            }
        }
    }

    #[tool(description = "Boot a simulator by UDID, independent of any session, and wait until it reports Booted")]
    #[instrument(skip_all)]
    async fn boot_device(
        &self,
        Parameters(params): Parameters<UdidParams>,
    ) -> Result<CallToolResult, McpError> {
        let udid = parse_udid(&params.udid)?;
        let success = self.registry.boot_by_udid(&udid).await;
        Ok(action_result(ActionResponse {
            session_id: None,
            message: if success {
                format!("Simulator {udid} is booted")
            } else {
                format!("Failed to boot simulator {udid}")
            },
            udid: Some(udid),
            success,
        }))
    }

    #[tool(description = "Shut down a simulator by UDID, independent of any session. Sessions bound to it are kept")]
    #[instrument(skip_all)]
    async fn shutdown_device(
        &self,
        Parameters(params): Parameters<UdidParams>,
    ) -> Result<CallToolResult, McpError> {
        let udid = parse_udid(&params.udid)?;
        let success = self.registry.shutdown_by_udid(&udid).await;
        Ok(action_result(ActionResponse {
            session_id: None,
            message: if success {
                format!("Simulator {udid} is shut down")
            } else {
                format!("Simulator {udid} is still booted")
            },
            udid: Some(udid),
            success,
        }))
    }

    // ── Sessions ────────────────────────────────────────────────────────

    #[tool(description = "Create a session bound to a simulator chosen by name (exact, then whole-word, then partial match) or UDID. Does not boot the simulator")]
    #[instrument(skip_all)]
    async fn create_session(
        &self,
        Parameters(params): Parameters<CreateSessionParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(
            device = ?params.device_name,
            version = ?params.platform_version,
            "creating session"
        );

        let options = SessionOptions {
            device_name: params.device_name.map(|n| strip_quotes(&n).to_string()),
            platform_version: params.platform_version.map(|v| strip_quotes(&v).to_string()),
            timeout: params.timeout_secs.map(Duration::from_secs),
        };

        match self.registry.create(options).await {
            Ok(session) => {
                let response = SessionResponse::from(&session);
                Ok(CallToolResult::success(vec![Content::text(json_text(
                    &response,
                    || session.id.to_string(),
                ))]))
            }
            Err(RegistryError::Resolve(e)) => {
                warn!(error = %e, "session creation failed");
                Ok(CallToolResult::error(vec![Content::text(resolve_failure(&e))]))
            }
            Err(e) => {
                warn!(error = %e, "session creation failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }

    #[tool(description = "List active sessions, oldest first")]
    #[instrument(skip_all)]
    async fn list_sessions(
        &self,
        Parameters(_params): Parameters<NoParams>,
    ) -> Result<CallToolResult, McpError> {
        let sessions = self.registry.list().await;
        Ok(CallToolResult::success(vec![Content::text(sessions_table(&sessions))]))
    }

    #[tool(description = "Get details of one session")]
    #[instrument(skip_all)]
    async fn get_session(
        &self,
        Parameters(params): Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        let session = match self.session(&params.session_id).await? {
            Ok(session) => session,
            Err(not_found) => return Ok(not_found),
        };
        let response = SessionResponse::from(&session);
        Ok(CallToolResult::success(vec![Content::text(json_text(
            &response,
            || session.id.to_string(),
        ))]))
    }

    #[tool(description = "End a session: shut its simulator down if running, then forget the session. The session is removed even if shutdown fails")]
    #[instrument(skip_all)]
    async fn terminate_session(
        &self,
        Parameters(params): Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = parse_session_id(&params.session_id)?;
        let Some(EndedSession { session, stopped }) = self.registry.end_session(&id).await else {
            return Ok(session_not_found(&id));
        };

        Ok(action_result(ActionResponse {
            session_id: Some(id.to_string()),
            udid: Some(session.udid.clone()),
            success: stopped,
            message: if stopped {
                "Session terminated".to_string()
            } else {
                format!(
                    "Session removed, but simulator {} could not be confirmed shut down",
                    session.udid
                )
            },
        }))
    }

    #[tool(description = "Boot the session's simulator. Returns once the boot command is accepted")]
    #[instrument(skip_all)]
    async fn boot_session(
        &self,
        Parameters(params): Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        let session = match self.session(&params.session_id).await? {
            Ok(session) => session,
            Err(not_found) => return Ok(not_found),
        };
        let success = self.registry.boot(&session.id).await;
        Ok(Self::session_action(
            &session,
            success,
            "Simulator boot started".to_string(),
            format!("Failed to boot simulator {}", session.udid),
        ))
    }

    #[tool(description = "Shut down the session's simulator and confirm it is no longer booted. The session is kept")]
    #[instrument(skip_all)]
    async fn shutdown_session(
        &self,
        Parameters(params): Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        let session = match self.session(&params.session_id).await? {
            Ok(session) => session,
            Err(not_found) => return Ok(not_found),
        };
        let success = self.registry.shutdown(&session.id).await;
        Ok(Self::session_action(
            &session,
            success,
            "Simulator shut down".to_string(),
            format!("Simulator {} is still booted", session.udid),
        ))
    }

    // ── Apps ────────────────────────────────────────────────────────────

    #[tool(description = "Install a built .app bundle on the session's simulator")]
    #[instrument(skip_all)]
    async fn install_app(
        &self,
        Parameters(params): Parameters<InstallAppParams>,
    ) -> Result<CallToolResult, McpError> {
        let session = match self.session(&params.session_id).await? {
            Ok(session) => session,
            Err(not_found) => return Ok(not_found),
        };
        let path = expand_home(strip_quotes(&params.app_path));
        let success = self.registry.install_app(&session.id, &path).await;
        Ok(Self::session_action(
            &session,
            success,
            format!("Installed {}", path.display()),
            format!("Failed to install {}", path.display()),
        ))
    }

    #[tool(description = "Launch an installed app by bundle identifier, optionally with launch arguments")]
    #[instrument(skip_all)]
    async fn launch_app(
        &self,
        Parameters(params): Parameters<LaunchAppParams>,
    ) -> Result<CallToolResult, McpError> {
        let session = match self.session(&params.session_id).await? {
            Ok(session) => session,
            Err(not_found) => return Ok(not_found),
        };
        let success = self
            .registry
            .launch_app(&session.id, &params.bundle_id, &params.args)
            .await;
        Ok(Self::session_action(
            &session,
            success,
            format!("Launched {}", params.bundle_id),
            format!("Failed to launch {}", params.bundle_id),
        ))
    }

    #[tool(description = "Terminate a running app by bundle identifier")]
    #[instrument(skip_all)]
    async fn terminate_app(
        &self,
        Parameters(params): Parameters<TerminateAppParams>,
    ) -> Result<CallToolResult, McpError> {
        let session = match self.session(&params.session_id).await? {
            Ok(session) => session,
            Err(not_found) => return Ok(not_found),
        };
        let success = self
            .registry
            .terminate_app(&session.id, &params.bundle_id)
            .await;
        Ok(Self::session_action(
            &session,
            success,
            format!("Terminated {}", params.bundle_id),
            format!("Failed to terminate {}", params.bundle_id),
        ))
    }

    // ── Interaction ─────────────────────────────────────────────────────

    #[tool(description = "Tap at screen coordinates (in points) on the session's simulator. Requires the axe CLI")]
    #[instrument(skip_all)]
    async fn tap(
        &self,
        Parameters(params): Parameters<TapParams>,
    ) -> Result<CallToolResult, McpError> {
        if !params.x.is_finite() || !params.y.is_finite() || params.x < 0.0 || params.y < 0.0 {
            return Err(McpError::invalid_params(
                format!("Invalid coordinates: ({}, {})", params.x, params.y),
                None,
            ));
        }
        let session = match self.session(&params.session_id).await? {
            Ok(session) => session,
            Err(not_found) => return Ok(not_found),
        };
        let success = self.registry.tap(&session.id, params.x, params.y).await;
        Ok(Self::session_action(
            &session,
            success,
            format!("Tapped at ({}, {})", params.x, params.y),
            format!("Failed to tap at ({}, {})", params.x, params.y),
        ))
    }

    #[tool(description = "Capture the session's screen as a PNG image, optionally also saving it to a file")]
    #[instrument(skip_all)]
    async fn screenshot(
        &self,
        Parameters(params): Parameters<ScreenshotParams>,
    ) -> Result<CallToolResult, McpError> {
        let session = match self.session(&params.session_id).await? {
            Ok(session) => session,
            Err(not_found) => return Ok(not_found),
        };

        let Some(png) = self.registry.screenshot(&session.id).await else {
            return Ok(Self::session_action(
                &session,
                false,
                String::new(),
                format!("Failed to capture screenshot of {}", session.udid),
            ));
        };

        let mut message = format!("Captured {} bytes", png.len());
        if let Some(save_path) = params.save_path.as_deref() {
            let path = expand_home(strip_quotes(save_path));
            match tokio::fs::write(&path, &png).await {
                Ok(()) => message.push_str(&format!(", saved to {}", path.display())),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to save screenshot");
                    message.push_str(&format!(", could not save to {}: {e}", path.display()));
                }
            }
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
        Ok(CallToolResult::success(vec![
            Content::image(encoded, "image/png"),
            Content::text(message),
        ]))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for SimulatorMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "iOS Simulator MCP Server - drive Xcode simulators through named sessions. \
                 Use list_available_devices to see simulators, create_session to bind one by \
                 name or UDID, boot_session to start it, then install_app, launch_app, tap and \
                 screenshot. terminate_session shuts the simulator down and forgets the session. \
                 boot_device and shutdown_device act on a UDID directly."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let mut sessions = RawResource::new(SESSIONS_URI, "Active sessions");
        sessions.description = Some("Sessions currently held by this server".to_string());
        sessions.mime_type = Some("application/json".to_string());

        let mut devices = RawResource::new(DEVICES_URI, "Simulator catalog");
        devices.description = Some("Every simulator known to simctl, with state".to_string());
        devices.mime_type = Some("application/json".to_string());

        Ok(ListResourcesResult::with_all_items(vec![
            sessions.no_annotation(),
            devices.no_annotation(),
        ]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = match request.uri.as_str() {
            SESSIONS_URI => self.sessions_json().await,
            DEVICES_URI => self.devices_json().await?,
            other => {
                return Err(McpError::invalid_params(
                    format!("Unknown resource: {other}"),
                    None,
                ))
            }
        };
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}
