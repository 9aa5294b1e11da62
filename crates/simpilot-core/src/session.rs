//! Session records and the storage abstraction behind the registry.
//!
//! A [`Session`] is a named handle bound to one simulator UDID. Sessions are
//! bookkeeping only: they do not lock the device, and the same simulator can
//! still be driven directly by UDID while a session points at it.
//!
//! Records live in a [`SessionStore`]. The registry takes the store as a
//! trait object; [`InMemorySessionStore`] is the only implementation, and
//! nothing survives a process restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::device::DeviceHandle;

/// A session bound to one simulator.
#[derive(Clone)]
pub struct Session {
    /// The unique identifier for this session.
    pub id: Uuid,

    /// UDID of the simulator this session drives.
    pub udid: String,

    /// Device name as requested by the caller (not the resolved name).
    pub device_name: String,

    /// OS version as requested by the caller, if any.
    pub platform_version: Option<String>,

    /// When this session was created.
    pub created_at: DateTime<Utc>,

    /// Refreshed on every successful lookup.
    pub last_used_at: DateTime<Utc>,

    device: Arc<dyn DeviceHandle>,
}

impl Session {
    /// Creates a session with a fresh id for an acquired device handle.
    pub fn new(
        device: Arc<dyn DeviceHandle>,
        device_name: impl Into<String>,
        platform_version: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            udid: device.udid().to_string(),
            device_name: device_name.into(),
            platform_version,
            created_at: now,
            last_used_at: now,
            device,
        }
    }

    /// The handle this session delegates device actions to.
    pub fn device(&self) -> &Arc<dyn DeviceHandle> {
        &self.device
    }

    /// Serializable snapshot of the record, without the handle.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            udid: self.udid.clone(),
            device_name: self.device_name.clone(),
            platform_version: self.platform_version.clone(),
            created_at: self.created_at,
            last_used_at: self.last_used_at,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("udid", &self.udid)
            .field("device_name", &self.device_name)
            .field("platform_version", &self.platform_version)
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .field("device", &"<Arc<dyn DeviceHandle>>")
            .finish()
    }
}

/// Plain-data view of a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub udid: String,
    pub device_name: String,
    pub platform_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Key-value storage for session records.
///
/// Implementations guard memory safety only. Callers get no atomicity
/// across calls: a record read by one task may be removed by another before
/// the first acts on it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a record, replacing any record with the same id.
    async fn insert(&self, session: Session);

    /// Sets `last_used_at` and returns the updated record.
    async fn touch(&self, id: &Uuid, at: DateTime<Utc>) -> Option<Session>;

    /// Returns a record without touching it.
    async fn peek(&self, id: &Uuid) -> Option<Session>;

    /// Removes a record. Removing an absent id is a no-op.
    async fn remove(&self, id: &Uuid) -> Option<Session>;

    /// All records, in no particular order.
    async fn list(&self) -> Vec<Session>;
}

/// [`SessionStore`] over a `HashMap`, process-lifetime only.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) {
        self.sessions.write().await.insert(session.id, session);
    }

    async fn touch(&self, id: &Uuid, at: DateTime<Utc>) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id)?;
        session.last_used_at = at;
        Some(session.clone())
    }

    async fn peek(&self, id: &Uuid) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn remove(&self, id: &Uuid) -> Option<Session> {
        self.sessions.write().await.remove(id)
    }

    async fn list(&self) -> Vec<Session> {
        self.sessions.read().await.values().cloned().collect()
    }
}
