//! Errors surfaced by device resolution and session creation.
//!
//! Only these operations propagate errors to callers. Every other registry
//! operation reports failure as `false` or `None` and logs the cause.

use std::time::Duration;

use thiserror::Error;

use crate::simctl::{Device, SimctlError};

/// Errors returned by [`DeviceResolver::resolve`](crate::resolver::DeviceResolver::resolve).
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No available device matched the request.
    ///
    /// Carries the enumeration the search ran against so the caller can
    /// present a catalog without querying the platform again.
    #[error("{}", not_found_message(.requested, .platform_version.as_deref()))]
    NotFound {
        requested: String,
        platform_version: Option<String>,
        devices: Vec<Device>,
    },

    /// The device listing could not be retrieved or parsed.
    #[error("Failed to enumerate simulators: {0}")]
    Enumeration(#[source] SimctlError),
}

fn not_found_message(requested: &str, platform_version: Option<&str>) -> String {
    match platform_version {
        Some(version) => format!("No available simulator matches '{requested}' (OS {version})"),
        None => format!("No available simulator matches '{requested}'"),
    }
}

impl ResolveError {
    /// The enumeration a `NotFound` was computed from; empty otherwise.
    pub fn devices(&self) -> &[Device] {
        match self {
            Self::NotFound { devices, .. } => devices,
            Self::Enumeration(_) => &[],
        }
    }
}

/// Errors returned by [`SessionRegistry::create`](crate::registry::SessionRegistry::create).
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Resolution did not finish within the configured timeout.
    #[error("Device resolution timed out after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_with_version() {
        let err = ResolveError::NotFound {
            requested: "iPhone 99".to_string(),
            platform_version: Some("18.0".to_string()),
            devices: vec![],
        };
        assert_eq!(
            err.to_string(),
            "No available simulator matches 'iPhone 99' (OS 18.0)"
        );
    }

    #[test]
    fn not_found_display_without_version() {
        let err = ResolveError::NotFound {
            requested: "Pixel".to_string(),
            platform_version: None,
            devices: vec![Device::new("U1", "iPhone 15", "rt")],
        };
        assert_eq!(err.to_string(), "No available simulator matches 'Pixel'");
        assert_eq!(err.devices().len(), 1);
    }

    #[test]
    fn registry_error_is_transparent_over_resolve() {
        let err = RegistryError::from(ResolveError::Enumeration(SimctlError::CommandFailed(
            "xcrun: error".to_string(),
        )));
        assert_eq!(
            err.to_string(),
            "Failed to enumerate simulators: Command execution failed: xcrun: error"
        );
    }

    #[test]
    fn timeout_display() {
        let err = RegistryError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }
}
