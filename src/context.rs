//! Shared daemon state.
//!
//! One [`AdminContext`] is created at startup and handed to every session as an
//! `Arc`. The server directory and global bans are read on every connect and
//! teleport but only written by an administrator, so they sit behind `RwLock`s.

use crate::config::{DaemonConfig, DaemonSettings};
use crate::error::{AdminError, Result};
use crate::policy::bans::BanList;
use crate::policy::teleport::ServerDirectory;
use crate::service::events::{EventKind, EventLog, TracingEventLog};
use crate::service::identity::{IdentityStore, MemoryIdentityStore};
use crate::utils::metrics::Metrics;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct AdminContext {
    settings: DaemonSettings,
    directory: RwLock<ServerDirectory>,
    global_bans: RwLock<BanList>,
    identities: Arc<dyn IdentityStore>,
    events: Arc<dyn EventLog>,
    metrics: Metrics,
}

impl AdminContext {
    pub fn new(
        config: &DaemonConfig,
        identities: Arc<dyn IdentityStore>,
        events: Arc<dyn EventLog>,
    ) -> Self {
        Self {
            settings: config.daemon.clone(),
            directory: RwLock::new(ServerDirectory::new(config.servers.clone())),
            global_bans: RwLock::new(BanList::from_rules(&config.bans)),
            identities,
            events,
            metrics: Metrics::new(),
        }
    }

    /// Context backed by in-memory identities and `tracing` audit output.
    pub fn standalone(config: &DaemonConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(TracingEventLog),
        )
    }

    pub fn settings(&self) -> &DaemonSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn identities(&self) -> &dyn IdentityStore {
        self.identities.as_ref()
    }

    pub fn record_event(&self, session_id: i64, kind: EventKind, detail: &str) {
        self.events.record_event(session_id, kind, detail);
    }

    pub fn directory(&self) -> Result<RwLockReadGuard<'_, ServerDirectory>> {
        self.directory.read().map_err(|_| AdminError::LockPoisoned)
    }

    pub fn directory_mut(&self) -> Result<RwLockWriteGuard<'_, ServerDirectory>> {
        self.directory.write().map_err(|_| AdminError::LockPoisoned)
    }

    pub fn global_bans(&self) -> Result<RwLockReadGuard<'_, BanList>> {
        self.global_bans.read().map_err(|_| AdminError::LockPoisoned)
    }

    pub fn global_bans_mut(&self) -> Result<RwLockWriteGuard<'_, BanList>> {
        self.global_bans.write().map_err(|_| AdminError::LockPoisoned)
    }

    /// Number of sessions currently open across all workers.
    pub fn live_sessions(&self) -> u64 {
        self.metrics.live_sessions()
    }
}
