//! The session registry: session CRUD plus device operations routed through
//! sessions or addressed directly by UDID.
//!
//! # Error policy
//!
//! [`SessionRegistry::create`] propagates resolution errors. Every other
//! operation catches failures, logs them, and reports `false` or `None`, so
//! nothing raises across the registry boundary.
//!
//! # Verification
//!
//! Shutdowns are confirmed against the platform's booted set: the handle's
//! shutdown runs first, then a forced `simctl shutdown` if the handle failed
//! or the device is still booted afterwards. Session boots are not verified.
//! [`SessionRegistry::boot_by_udid`] polls for the booted state with
//! exponential backoff bounded by the [`BootPolicy`].
//!
//! # Concurrency
//!
//! The registry holds no per-session lock. Concurrent operations on the same
//! session interleave at every await point; two concurrent
//! [`terminate`](SessionRegistry::terminate) calls may both shut the device
//! down and both remove the record, the second removal being a no-op.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::SimulatorBackend;
use crate::config::{BootPolicy, SessionDefaults};
use crate::device::{DeviceError, DeviceHandle};
use crate::error::RegistryError;
use crate::resolver::DeviceResolver;
use crate::session::{InMemorySessionStore, Session, SessionStore};
use crate::simctl::{Device, DeviceState, ProcessOutput, SimctlError};

/// Per-call overrides for session creation. Unset fields take the
/// registry's [`SessionDefaults`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub device_name: Option<String>,
    pub platform_version: Option<String>,
    pub timeout: Option<std::time::Duration>,
}

/// A session removed by [`SessionRegistry::end_session`].
#[derive(Debug, Clone)]
pub struct EndedSession {
    pub session: Session,
    /// Whether the device ended up stopped (or was not running).
    pub stopped: bool,
}

/// In-memory registry of sessions bound to simulators.
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn SimulatorBackend>,
    resolver: DeviceResolver,
    defaults: SessionDefaults,
    boot_policy: BootPolicy,
}

impl SessionRegistry {
    /// Creates a registry over a fresh [`InMemorySessionStore`].
    pub fn new(backend: Arc<dyn SimulatorBackend>, defaults: SessionDefaults) -> Self {
        Self::with_store(Arc::new(InMemorySessionStore::new()), backend, defaults)
    }

    pub fn with_store(
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn SimulatorBackend>,
        defaults: SessionDefaults,
    ) -> Self {
        Self {
            store,
            resolver: DeviceResolver::new(backend.clone()),
            backend,
            defaults,
            boot_policy: BootPolicy::default(),
        }
    }

    pub fn with_boot_policy(mut self, boot_policy: BootPolicy) -> Self {
        self.boot_policy = boot_policy;
        self
    }

    pub fn defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    pub fn resolver(&self) -> &DeviceResolver {
        &self.resolver
    }

    // ── Sessions ────────────────────────────────────────────────────────

    /// Resolves a device and creates a session bound to it.
    ///
    /// Blank fields in `options` count as unset.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Resolve`] carrying the resolver's error unchanged
    /// - [`RegistryError::Timeout`] if resolution outlives the timeout
    pub async fn create(&self, options: SessionOptions) -> Result<Session, RegistryError> {
        let device_name = options
            .device_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.defaults.device_name.clone());
        let platform_version = options
            .platform_version
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.defaults.platform_version.clone());
        let timeout = options.timeout.unwrap_or(self.defaults.timeout);

        let device = tokio::time::timeout(
            timeout,
            self.resolver.resolve(&device_name, platform_version.as_deref()),
        )
        .await
        .map_err(|_| RegistryError::Timeout(timeout))??;

        let handle = self.backend.device(&device.udid);
        let session = Session::new(handle, device_name, platform_version);
        self.store.insert(session.clone()).await;

        info!(
            session = %session.id,
            udid = %session.udid,
            device = %device.name,
            runtime = %device.runtime,
            "session created"
        );
        Ok(session)
    }

    /// Looks a session up, refreshing its last-used timestamp.
    ///
    /// Absence is a normal outcome, not an error.
    pub async fn get(&self, id: &Uuid) -> Option<Session> {
        self.store.touch(id, Utc::now()).await
    }

    /// All sessions, oldest first.
    pub async fn list(&self) -> Vec<Session> {
        let mut sessions = self.store.list().await;
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    /// Sessions bound to `udid`. Scans every record.
    pub async fn sessions_for_udid(&self, udid: &str) -> Vec<Session> {
        self.list()
            .await
            .into_iter()
            .filter(|s| s.udid.eq_ignore_ascii_case(udid))
            .collect()
    }

    /// Starts the session's device. Does not wait for or verify the booted state.
    pub async fn boot(&self, id: &Uuid) -> bool {
        self.run_action(id, "boot", |device| async move { device.start().await })
            .await
            .is_some()
    }

    /// Shuts the session's device down and confirms it left the booted set.
    pub async fn shutdown(&self, id: &Uuid) -> bool {
        let Some(session) = self.get(id).await else {
            warn!(session = %id, "shutdown: session not found");
            return false;
        };
        self.shutdown_device(session.device().as_ref()).await
    }

    /// Shuts the device down if it is running, then removes the session.
    ///
    /// The record is removed even when the shutdown fails, so a removed
    /// session does not imply a stopped device. Returns whether the device
    /// ended up stopped (or was not running); `false` for unknown sessions.
    pub async fn terminate(&self, id: &Uuid) -> bool {
        self.end_session(id)
            .await
            .is_some_and(|ended| ended.stopped)
    }

    /// Like [`terminate`](Self::terminate), but reports which session was
    /// ended. `None` means no record existed when the call started.
    pub async fn end_session(&self, id: &Uuid) -> Option<EndedSession> {
        let Some(session) = self.store.peek(id).await else {
            debug!(session = %id, "terminate: session not found");
            return None;
        };

        let device = session.device();
        let running = match device.state().await {
            Ok(state) => state.is_running(),
            Err(e) => {
                debug!(udid = %session.udid, error = %e, "state query failed, checking booted list");
                match self.backend.booted_udids().await {
                    Ok(booted) => booted.iter().any(|u| u.eq_ignore_ascii_case(&session.udid)),
                    Err(e) => {
                        warn!(udid = %session.udid, error = %e, "booted list unavailable, assuming running");
                        true
                    }
                }
            }
        };

        let stopped = if running {
            self.shutdown_device(device.as_ref()).await
        } else {
            true
        };

        self.store.remove(id).await;
        info!(session = %id, udid = %session.udid, stopped, "session terminated");
        Some(EndedSession { session, stopped })
    }

    pub async fn install_app(&self, id: &Uuid, app_path: &Path) -> bool {
        self.run_action(id, "install_app", |device| async move {
            device.install_app(app_path).await
        })
        .await
        .is_some()
    }

    pub async fn launch_app(&self, id: &Uuid, bundle_id: &str, args: &[String]) -> bool {
        self.run_action(id, "launch_app", |device| async move {
            device.launch_app(bundle_id, args).await
        })
        .await
        .is_some()
    }

    pub async fn terminate_app(&self, id: &Uuid, bundle_id: &str) -> bool {
        self.run_action(id, "terminate_app", |device| async move {
            device.terminate_app(bundle_id).await
        })
        .await
        .is_some()
    }

    pub async fn tap(&self, id: &Uuid, x: f64, y: f64) -> bool {
        self.run_action(id, "tap", |device| async move { device.tap(x, y).await })
            .await
            .is_some()
    }

    /// Captures the session's screen as PNG bytes.
    pub async fn screenshot(&self, id: &Uuid) -> Option<Vec<u8>> {
        self.run_action(id, "screenshot", |device| async move { device.screenshot().await })
            .await
    }

    /// Runs an executable inside the session's simulator.
    pub async fn spawn(&self, id: &Uuid, program: &str, args: &[String]) -> Option<ProcessOutput> {
        self.run_action(id, "spawn", |device| async move { device.spawn(program, args).await })
            .await
    }

    // ── Direct device access ────────────────────────────────────────────

    /// Every simulator known to the platform.
    pub async fn list_devices(&self) -> Result<Vec<Device>, SimctlError> {
        self.backend.list_devices().await
    }

    /// Simulators currently booted.
    pub async fn booted_devices(&self) -> Result<Vec<Device>, SimctlError> {
        let devices = self.backend.list_devices().await?;
        Ok(devices
            .into_iter()
            .filter(|d| d.state == DeviceState::Booted)
            .collect())
    }

    /// Boots a device by UDID without touching any session.
    ///
    /// An already-booted device counts as success and is not started again.
    /// Otherwise the device is started and the booted set is polled until it
    /// appears or the [`BootPolicy`] timeout elapses.
    pub async fn boot_by_udid(&self, udid: &str) -> bool {
        match self.backend.booted_udids().await {
            Ok(booted) if booted.iter().any(|u| u.eq_ignore_ascii_case(udid)) => {
                debug!(udid = %udid, "already booted");
                return true;
            }
            Ok(_) => {}
            Err(e) => warn!(udid = %udid, error = %e, "booted list unavailable, booting anyway"),
        }

        let device = self.backend.device(udid);
        if let Err(e) = device.start().await {
            warn!(udid = %udid, error = %e, "boot failed");
            return false;
        }

        let booted = self.wait_until_booted(udid).await;
        info!(udid = %udid, booted, "boot by udid finished");
        booted
    }

    /// Shuts a device down by UDID without touching any session.
    pub async fn shutdown_by_udid(&self, udid: &str) -> bool {
        let device = self.backend.device(udid);
        self.shutdown_device(device.as_ref()).await
    }

    /// Whether `udid` is absent from the booted set.
    ///
    /// A failed enumeration cannot confirm anything and yields `false`.
    pub async fn verify_shutdown(&self, udid: &str) -> bool {
        match self.backend.booted_udids().await {
            Ok(booted) => !booted.iter().any(|u| u.eq_ignore_ascii_case(udid)),
            Err(e) => {
                warn!(udid = %udid, error = %e, "cannot verify shutdown");
                false
            }
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    async fn shutdown_device(&self, device: &dyn DeviceHandle) -> bool {
        let udid = device.udid().to_string();

        match device.shutdown().await {
            Ok(()) => {
                if self.verify_shutdown(&udid).await {
                    info!(udid = %udid, "device shut down");
                    return true;
                }
                warn!(udid = %udid, "device still booted after shutdown, forcing");
            }
            Err(e) => warn!(udid = %udid, error = %e, "shutdown failed, forcing via simctl"),
        }

        if let Err(e) = self.backend.force_shutdown(&udid).await {
            warn!(udid = %udid, error = %e, "forced shutdown failed");
        }

        let verified = self.verify_shutdown(&udid).await;
        if verified {
            info!(udid = %udid, "device shut down via simctl");
        } else {
            warn!(udid = %udid, "device still booted after forced shutdown");
        }
        verified
    }

    async fn wait_until_booted(&self, udid: &str) -> bool {
        let policy = self.boot_policy;
        // A timeout too large to represent means no deadline.
        let deadline = Instant::now().checked_add(policy.timeout);
        let mut interval = policy.initial_interval;

        loop {
            match self.backend.booted_udids().await {
                Ok(booted) if booted.iter().any(|u| u.eq_ignore_ascii_case(udid)) => return true,
                Ok(_) => {}
                Err(e) => debug!(udid = %udid, error = %e, "booted list unavailable while polling"),
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(udid = %udid, timeout = ?policy.timeout, "device did not reach booted state");
                        return false;
                    }
                    interval.min(deadline - now)
                }
                None => interval,
            };

            tokio::time::sleep(pause).await;
            interval = interval.saturating_mul(2).min(policy.max_interval);
        }
    }

    async fn run_action<T, F, Fut>(&self, id: &Uuid, action: &'static str, f: F) -> Option<T>
    where
        F: FnOnce(Arc<dyn DeviceHandle>) -> Fut,
        Fut: Future<Output = Result<T, DeviceError>>,
    {
        let Some(session) = self.get(id).await else {
            warn!(session = %id, action, "session not found");
            return None;
        };

        match f(session.device().clone()).await {
            Ok(value) => {
                debug!(session = %id, udid = %session.udid, action, "action succeeded");
                Some(value)
            }
            Err(e) => {
                warn!(session = %id, udid = %session.udid, action, error = %e, "action failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("store", &"<Arc<dyn SessionStore>>")
            .field("backend", &"<Arc<dyn SimulatorBackend>>")
            .field("defaults", &self.defaults)
            .field("boot_policy", &self.boot_policy)
            .finish()
    }
}
