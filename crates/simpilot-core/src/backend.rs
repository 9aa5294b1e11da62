//! Platform access used by the resolver and the session registry.
//!
//! [`SimulatorBackend`] bundles the three things the core needs from the
//! host: a device enumeration, a forced shutdown by UDID, and a way to
//! acquire a [`DeviceHandle`] for a UDID. The registry receives the backend
//! as a trait object so tests can swap in an in-memory backend.

use std::sync::Arc;

use async_trait::async_trait;

use crate::device::{DeviceHandle, SimctlDevice};
use crate::simctl::{booted_udids_in, Device, Simctl, SimctlError};

#[async_trait]
pub trait SimulatorBackend: Send + Sync {
    /// Enumerate every simulator with its current state. Never cached.
    async fn list_devices(&self) -> Result<Vec<Device>, SimctlError>;

    /// Shut a device down through the platform CLI, bypassing any handle.
    async fn force_shutdown(&self, udid: &str) -> Result<(), SimctlError>;

    /// Acquire a handle for the device with the given UDID.
    fn device(&self, udid: &str) -> Arc<dyn DeviceHandle>;

    /// UDIDs currently in the `Booted` state.
    async fn booted_udids(&self) -> Result<Vec<String>, SimctlError> {
        let devices = self.list_devices().await?;
        Ok(booted_udids_in(&devices))
    }
}

/// [`SimulatorBackend`] that talks to `xcrun simctl` directly.
#[derive(Debug, Clone, Default)]
pub struct SimctlBackend;

impl SimctlBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SimulatorBackend for SimctlBackend {
    async fn list_devices(&self) -> Result<Vec<Device>, SimctlError> {
        Simctl::list_devices().await
    }

    async fn force_shutdown(&self, udid: &str) -> Result<(), SimctlError> {
        Simctl::shutdown(udid).await
    }

    fn device(&self, udid: &str) -> Arc<dyn DeviceHandle> {
        Arc::new(SimctlDevice::new(udid))
    }
}
