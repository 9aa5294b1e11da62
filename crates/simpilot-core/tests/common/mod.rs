//! Shared test helpers for simpilot-core integration tests.
//!
//! Builds registries over the scripted [`MockBackend`] with a fleet of
//! devices whose names overlap the way real simulator catalogs do.

#![allow(dead_code)]

use std::sync::Arc;

use simpilot_core::config::SessionDefaults;
use simpilot_core::mock::MockBackend;
use simpilot_core::registry::{SessionOptions, SessionRegistry};
use simpilot_core::simctl::Device;

pub const IOS_16_4: &str = "com.apple.CoreSimulator.SimRuntime.iOS-16-4";
pub const IOS_17_0: &str = "com.apple.CoreSimulator.SimRuntime.iOS-17-0";

pub const IPHONE_14_UDID: &str = "11111111-1111-1111-1111-111111111111";
pub const IPHONE_14_PRO_UDID: &str = "22222222-2222-2222-2222-222222222222";
pub const IPHONE_14_PLUS_UDID: &str = "33333333-3333-3333-3333-333333333333";
pub const IPHONE_15_UDID: &str = "44444444-4444-4444-4444-444444444444";
pub const IPAD_UDID: &str = "55555555-5555-5555-5555-555555555555";
pub const RETIRED_UDID: &str = "66666666-6666-6666-6666-666666666666";

// ---------------------------------------------------------------------------
// Fleets
// ---------------------------------------------------------------------------

/// A catalog with prefix-overlapping names across two runtimes, plus one
/// device whose runtime is no longer installed.
pub fn fleet() -> Vec<Device> {
    vec![
        Device::new(IPHONE_14_PRO_UDID, "iPhone 14 Pro", IOS_16_4),
        Device::new(IPHONE_14_PLUS_UDID, "iPhone 14 Plus", IOS_16_4),
        Device::new(IPHONE_14_UDID, "iPhone 14", IOS_16_4),
        Device::new(IPHONE_15_UDID, "iPhone 15", IOS_17_0),
        Device::new(IPAD_UDID, "iPad Pro (11-inch) (4th generation)", IOS_17_0),
        Device::new(RETIRED_UDID, "iPhone 13", IOS_16_4).unavailable(),
    ]
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// A fresh registry over [`fleet`], returned with its backend for scripting.
pub fn registry() -> (Arc<MockBackend>, SessionRegistry) {
    let backend = MockBackend::new(fleet());
    let registry = SessionRegistry::new(backend.clone(), SessionDefaults::default());
    (backend, registry)
}

pub fn options(name: &str, version: Option<&str>) -> SessionOptions {
    SessionOptions {
        device_name: Some(name.to_string()),
        platform_version: version.map(str::to_string),
        timeout: None,
    }
}
