//! # simpilot-mcp
//!
//! Model Context Protocol server for iOS Simulator automation over stdio.
//!
//! Agents create named sessions bound to simulators (resolved by name or
//! UDID), then boot, install, launch, tap and screenshot through them.
//! Sessions live in memory only; simulators are left as they are on exit.

use std::sync::Arc;

use clap::Parser;
use rmcp::{transport::stdio, ServiceExt};
use tracing::{error, info};

use simpilot_core::backend::SimctlBackend;
use simpilot_core::registry::SessionRegistry;
use simpilot_mcp::settings::Args;
use simpilot_mcp::{logging, SimulatorMcpServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = args.settings(args.load_config());
    let _guard = logging::init(&settings.log_dir);

    info!(
        device = %settings.defaults.device_name,
        os = ?settings.defaults.platform_version,
        timeout = ?settings.defaults.timeout,
        "Starting simpilot-mcp v{}",
        env!("CARGO_PKG_VERSION")
    );

    let registry = SessionRegistry::new(Arc::new(SimctlBackend::new()), settings.defaults)
        .with_boot_policy(settings.boot_policy);
    let server = SimulatorMcpServer::new(Arc::new(registry));

    let service = server.serve(stdio()).await.map_err(|e| {
        error!("Error starting server: {}", e);
        e
    })?;

    info!("simpilot-mcp running on stdio");

    tokio::select! {
        result = service.waiting() => {
            result?;
            info!("Client disconnected");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT");
        }
    }

    info!("simpilot-mcp shutting down");
    Ok(())
}
