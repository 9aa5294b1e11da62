//! In-memory simulator backend for tests.
//!
//! [`MockBackend`] keeps a device list behind a mutex and hands out
//! [`DeviceHandle`]s that mutate it, so registry behavior can be exercised
//! without Xcode. Individual actions can be made to fail, or to report
//! success without changing any state, and every call is recorded.
//!
//! ```
//! use simpilot_core::mock::{MockAction, MockBackend};
//! use simpilot_core::simctl::Device;
//!
//! let backend = MockBackend::new(vec![Device::new("U1", "iPhone 15", "iOS-17-0")]);
//! backend.fail(MockAction::Shutdown);
//! assert_eq!(backend.count(MockAction::Shutdown), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::SimulatorBackend;
use crate::device::{DeviceError, DeviceHandle};
use crate::simctl::{Device, DeviceState, ProcessOutput, SimctlError};

/// PNG file signature, prefixed to every fake screenshot.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Operations the mock records and can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockAction {
    ListDevices,
    ForceShutdown,
    State,
    Start,
    Shutdown,
    InstallApp,
    LaunchApp,
    TerminateApp,
    Tap,
    Screenshot,
    Spawn,
}

/// One recorded call. `udid` is empty for [`MockAction::ListDevices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub action: MockAction,
    pub udid: String,
}

#[derive(Default)]
struct MockState {
    devices: Vec<Device>,
    failing: HashSet<MockAction>,
    ineffective: HashSet<MockAction>,
    boot_latency: usize,
    pending_boots: HashMap<String, usize>,
    list_delay: Option<Duration>,
    calls: Vec<MockCall>,
}

impl MockState {
    fn record(&mut self, action: MockAction, udid: &str) {
        self.calls.push(MockCall {
            action,
            udid: udid.to_string(),
        });
    }

    fn device_mut(&mut self, udid: &str) -> Option<&mut Device> {
        self.devices
            .iter_mut()
            .find(|d| d.udid.eq_ignore_ascii_case(udid))
    }

    fn set_state(&mut self, udid: &str, state: DeviceState) -> bool {
        match self.device_mut(udid) {
            Some(device) => {
                device.state = state;
                true
            }
            None => false,
        }
    }

    /// Each enumeration advances every pending boot by one step.
    fn advance_boots(&mut self) {
        let mut finished = Vec::new();
        for (udid, remaining) in self.pending_boots.iter_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                finished.push(udid.clone());
            }
        }
        for udid in finished {
            self.pending_boots.remove(&udid);
            self.set_state(&udid, DeviceState::Booted);
        }
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(action: MockAction) -> String {
    format!("injected failure: {action:?}")
}

/// Scriptable [`SimulatorBackend`].
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new(devices: Vec<Device>) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(MockState {
                devices,
                ..Default::default()
            })),
        })
    }

    /// Makes every later `action` return an error.
    pub fn fail(&self, action: MockAction) {
        lock(&self.state).failing.insert(action);
    }

    /// Undoes [`fail`](Self::fail).
    pub fn succeed(&self, action: MockAction) {
        lock(&self.state).failing.remove(&action);
    }

    /// Makes `action` report success without changing device state.
    pub fn make_ineffective(&self, action: MockAction) {
        lock(&self.state).ineffective.insert(action);
    }

    /// Devices started after this call stay `Booting` for `enumerations`
    /// device listings before turning `Booted`.
    pub fn with_boot_latency(&self, enumerations: usize) {
        lock(&self.state).boot_latency = enumerations;
    }

    /// Delays every device listing, for exercising timeouts.
    pub fn with_list_delay(&self, delay: Duration) {
        lock(&self.state).list_delay = Some(delay);
    }

    pub fn set_state(&self, udid: &str, state: DeviceState) {
        lock(&self.state).set_state(udid, state);
    }

    pub fn state_of(&self, udid: &str) -> Option<DeviceState> {
        lock(&self.state).device_mut(udid).map(|d| d.state)
    }

    pub fn remove_device(&self, udid: &str) {
        lock(&self.state)
            .devices
            .retain(|d| !d.udid.eq_ignore_ascii_case(udid));
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.state).calls.clone()
    }

    /// How many times `action` was invoked, failed calls included.
    pub fn count(&self, action: MockAction) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| c.action == action)
            .count()
    }
}

#[async_trait]
impl SimulatorBackend for MockBackend {
    async fn list_devices(&self) -> Result<Vec<Device>, SimctlError> {
        let delay = lock(&self.state).list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        state.record(MockAction::ListDevices, "");
        if state.failing.contains(&MockAction::ListDevices) {
            return Err(SimctlError::CommandFailed(injected(MockAction::ListDevices)));
        }
        state.advance_boots();
        Ok(state.devices.clone())
    }

    async fn force_shutdown(&self, udid: &str) -> Result<(), SimctlError> {
        let mut state = lock(&self.state);
        state.record(MockAction::ForceShutdown, udid);
        if state.failing.contains(&MockAction::ForceShutdown) {
            return Err(SimctlError::CommandFailed(injected(MockAction::ForceShutdown)));
        }
        if state.ineffective.contains(&MockAction::ForceShutdown) {
            return Ok(());
        }
        state.pending_boots.remove(udid);
        if state.set_state(udid, DeviceState::Shutdown) {
            Ok(())
        } else {
            Err(SimctlError::CommandFailed(format!("Invalid device: {udid}")))
        }
    }

    fn device(&self, udid: &str) -> Arc<dyn DeviceHandle> {
        Arc::new(MockDevice {
            udid: udid.to_string(),
            state: self.state.clone(),
        })
    }
}

/// Handle returned by [`MockBackend::device`].
pub struct MockDevice {
    udid: String,
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Records the call and applies the injected-failure and known-device checks.
    fn begin(&self, action: MockAction) -> Result<MutexGuard<'_, MockState>, DeviceError> {
        let mut state = lock(&self.state);
        state.record(action, &self.udid);
        if state.failing.contains(&action) {
            return Err(DeviceError::ActionFailed(injected(action)));
        }
        if state.device_mut(&self.udid).is_none() {
            return Err(DeviceError::NotFound(self.udid.clone()));
        }
        Ok(state)
    }
}

#[async_trait]
impl DeviceHandle for MockDevice {
    fn udid(&self) -> &str {
        &self.udid
    }

    async fn state(&self) -> Result<DeviceState, DeviceError> {
        let mut state = self.begin(MockAction::State)?;
        state
            .device_mut(&self.udid)
            .map(|d| d.state)
            .ok_or_else(|| DeviceError::NotFound(self.udid.clone()))
    }

    async fn start(&self) -> Result<(), DeviceError> {
        let mut state = self.begin(MockAction::Start)?;
        if state.ineffective.contains(&MockAction::Start) {
            return Ok(());
        }
        let latency = state.boot_latency;
        if latency == 0 {
            state.set_state(&self.udid, DeviceState::Booted);
        } else {
            state.set_state(&self.udid, DeviceState::Booting);
            state.pending_boots.insert(self.udid.clone(), latency);
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), DeviceError> {
        let mut state = self.begin(MockAction::Shutdown)?;
        if state.ineffective.contains(&MockAction::Shutdown) {
            return Ok(());
        }
        state.pending_boots.remove(&self.udid);
        state.set_state(&self.udid, DeviceState::Shutdown);
        Ok(())
    }

    async fn install_app(&self, _app_path: &Path) -> Result<(), DeviceError> {
        self.begin(MockAction::InstallApp).map(|_| ())
    }

    async fn launch_app(&self, _bundle_id: &str, _args: &[String]) -> Result<(), DeviceError> {
        self.begin(MockAction::LaunchApp).map(|_| ())
    }

    async fn terminate_app(&self, _bundle_id: &str) -> Result<(), DeviceError> {
        self.begin(MockAction::TerminateApp).map(|_| ())
    }

    async fn tap(&self, _x: f64, _y: f64) -> Result<(), DeviceError> {
        self.begin(MockAction::Tap).map(|_| ())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DeviceError> {
        self.begin(MockAction::Screenshot)?;
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(self.udid.as_bytes());
        Ok(png)
    }

    async fn spawn(&self, program: &str, args: &[String]) -> Result<ProcessOutput, DeviceError> {
        self.begin(MockAction::Spawn)?;
        let mut stdout = program.to_string();
        for arg in args {
            stdout.push(' ');
            stdout.push_str(arg);
        }
        Ok(ProcessOutput {
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
        })
    }
}
