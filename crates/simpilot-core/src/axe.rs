//! Coordinate taps through the `axe` accessibility tool.
//!
//! simctl has no touch injection, so taps go through
//! [axe](https://github.com/cameroncooke/axe) (`brew install cameroncooke/axe/axe`).

use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum AxeError {
    #[error("Command execution failed: {0}")]
    CommandFailed(String),
    #[error("axe tool not found - install with: brew install cameroncooke/axe/axe")]
    NotInstalled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Axe;

impl Axe {
    /// Check if axe is installed
    pub async fn is_installed() -> bool {
        Command::new("which")
            .arg("axe")
            .stdin(Stdio::null())
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Tap at x,y coordinates (screen points)
    pub async fn tap(udid: &str, x: f64, y: f64) -> Result<(), AxeError> {
        if !Self::is_installed().await {
            return Err(AxeError::NotInstalled);
        }

        let output = Command::new("axe")
            .args(tap_args(udid, x, y))
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(AxeError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}

fn tap_args(udid: &str, x: f64, y: f64) -> Vec<String> {
    vec![
        "tap".to_string(),
        "-x".to_string(),
        format_coordinate(x),
        "-y".to_string(),
        format_coordinate(y),
        "--udid".to_string(),
        udid.to_string(),
    ]
}

/// Whole-number coordinates are passed without a fractional part.
fn format_coordinate(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
