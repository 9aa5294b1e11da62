//! simpilot MCP server library.
//!
//! The protocol layer lives in [`server`]; [`tools`] holds the tool
//! parameter and response types and [`format`] the text renderings. The
//! binary in `main.rs` wires configuration, logging and the stdio transport.

pub mod format;
pub mod logging;
pub mod server;
pub mod settings;
pub mod tools;

pub use server::SimulatorMcpServer;
