//! Per-device automation handle.
//!
//! This module defines the [`DeviceHandle`] trait, the contract the session
//! registry needs from whatever drives a single simulator: querying its
//! state, starting and stopping it, managing apps, tapping and capturing the
//! screen. [`SimctlDevice`] is the production implementation backed by
//! `xcrun simctl` and `axe`.
//!
//! Handles are cheap to create and hold no connection; acquiring one for a
//! UDID that no longer exists succeeds, and the failure surfaces on first use.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::axe::{Axe, AxeError};
use crate::simctl::{DeviceState, ProcessOutput, Simctl, SimctlError};

/// Errors returned by device handle actions.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The simctl invocation behind the action failed.
    #[error(transparent)]
    Simctl(#[from] SimctlError),

    /// The axe invocation behind a tap failed.
    #[error(transparent)]
    Axe(#[from] AxeError),

    /// The device is no longer known to the platform.
    #[error("Device not found: {0}")]
    NotFound(String),

    /// The action was rejected for another reason.
    #[error("Action failed: {0}")]
    ActionFailed(String),
}

/// Trait for controlling one simulator, identified by UDID.
///
/// All methods are single-shot: no implementation retries internally.
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    /// The UDID this handle is bound to.
    fn udid(&self) -> &str;

    /// Query the current lifecycle state from the platform.
    async fn state(&self) -> Result<DeviceState, DeviceError>;

    /// Start (boot) the simulator.
    async fn start(&self) -> Result<(), DeviceError>;

    /// Shut the simulator down.
    async fn shutdown(&self) -> Result<(), DeviceError>;

    /// Install an `.app` bundle.
    async fn install_app(&self, app_path: &Path) -> Result<(), DeviceError>;

    /// Launch an installed app, passing `args` to it.
    async fn launch_app(&self, bundle_id: &str, args: &[String]) -> Result<(), DeviceError>;

    /// Terminate a running app.
    async fn terminate_app(&self, bundle_id: &str) -> Result<(), DeviceError>;

    /// Tap at screen coordinates, in points.
    async fn tap(&self, x: f64, y: f64) -> Result<(), DeviceError>;

    /// Capture the screen as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, DeviceError>;

    /// Run an arbitrary executable inside the simulator.
    async fn spawn(&self, program: &str, args: &[String]) -> Result<ProcessOutput, DeviceError>;
}

/// [`DeviceHandle`] backed by `xcrun simctl` and `axe`.
#[derive(Debug, Clone)]
pub struct SimctlDevice {
    udid: String,
}

impl SimctlDevice {
    pub fn new(udid: impl Into<String>) -> Self {
        Self { udid: udid.into() }
    }
}

#[async_trait]
impl DeviceHandle for SimctlDevice {
    fn udid(&self) -> &str {
        &self.udid
    }

    async fn state(&self) -> Result<DeviceState, DeviceError> {
        let devices = Simctl::list_devices().await?;
        devices
            .into_iter()
            .find(|d| d.udid.eq_ignore_ascii_case(&self.udid))
            .map(|d| d.state)
            .ok_or_else(|| DeviceError::NotFound(self.udid.clone()))
    }

    async fn start(&self) -> Result<(), DeviceError> {
        Ok(Simctl::boot(&self.udid).await?)
    }

    async fn shutdown(&self) -> Result<(), DeviceError> {
        Ok(Simctl::shutdown(&self.udid).await?)
    }

    async fn install_app(&self, app_path: &Path) -> Result<(), DeviceError> {
        if !app_path.exists() {
            return Err(DeviceError::ActionFailed(format!(
                "App bundle not found: {}",
                app_path.display()
            )));
        }
        Ok(Simctl::install_app(&self.udid, app_path).await?)
    }

    async fn launch_app(&self, bundle_id: &str, args: &[String]) -> Result<(), DeviceError> {
        Ok(Simctl::launch_app(&self.udid, bundle_id, args).await?)
    }

    async fn terminate_app(&self, bundle_id: &str) -> Result<(), DeviceError> {
        Ok(Simctl::terminate_app(&self.udid, bundle_id).await?)
    }

    async fn tap(&self, x: f64, y: f64) -> Result<(), DeviceError> {
        Ok(Axe::tap(&self.udid, x, y).await?)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DeviceError> {
        Ok(Simctl::screenshot(&self.udid).await?)
    }

    async fn spawn(&self, program: &str, args: &[String]) -> Result<ProcessOutput, DeviceError> {
        Ok(Simctl::spawn(&self.udid, program, args).await?)
    }
}
