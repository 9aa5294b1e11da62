//! Core library for simpilot: iOS Simulator resolution and session management.
//!
//! The crate is organized in layers:
//!
//! - [`simctl`] and [`axe`] wrap the `xcrun simctl` and `axe` command-line tools
//! - [`device`] defines the per-device [`DeviceHandle`](device::DeviceHandle) contract
//! - [`backend`] bundles enumeration, forced shutdown and handle acquisition
//! - [`resolver`] maps a requested device name (or UDID) to one simulator
//! - [`session`] and [`registry`] track sessions and route device actions
//! - [`config`] loads process-wide defaults from `~/.simpilot/config.json`
//! - `mock` is an in-memory backend for tests, behind the `mock` feature
//!
//! Only macOS hosts with Xcode can drive real simulators; everything above
//! [`backend`] runs anywhere against the mock backend.

pub mod axe;
pub mod backend;
pub mod config;
pub mod device;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod simctl;
