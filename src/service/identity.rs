//! Persisted player identity.
//!
//! The daemon never owns player identities; it asks an [`IdentityStore`] to resolve a
//! fingerprint and to create a record when the fingerprint is new.

use crate::error::{AdminError, Result};
use crate::session::registry::Player;
use std::collections::HashMap;
use std::sync::Mutex;

/// Lookup and creation of persisted player identities.
///
/// Called once per connect from a session worker; implementations must be safe to call
/// from many workers at once.
pub trait IdentityStore: Send + Sync {
    /// Database id for `fingerprint`, if one exists.
    fn resolve_identity(&self, fingerprint: &str) -> Result<Option<i64>>;

    /// Persist a new identity for `player` and return its id.
    fn create_identity(&self, player: &Player) -> Result<i64>;
}

#[derive(Debug, Default)]
struct MemoryIdentities {
    by_fingerprint: HashMap<String, i64>,
    names: HashMap<i64, String>,
    next_id: i64,
}

/// Process-local identity store, used in tests and when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    inner: Mutex<MemoryIdentities>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.by_fingerprint.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name recorded when identity `id` was created.
    pub fn name_of(&self, id: i64) -> Option<String> {
        self.inner.lock().ok()?.names.get(&id).cloned()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn resolve_identity(&self, fingerprint: &str) -> Result<Option<i64>> {
        let inner = self.inner.lock().map_err(|_| AdminError::LockPoisoned)?;
        Ok(inner.by_fingerprint.get(fingerprint).copied())
    }

    fn create_identity(&self, player: &Player) -> Result<i64> {
        let mut inner = self.inner.lock().map_err(|_| AdminError::LockPoisoned)?;
        if let Some(id) = inner.by_fingerprint.get(&player.fingerprint) {
            return Ok(*id);
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.by_fingerprint.insert(player.fingerprint.clone(), id);
        inner.names.insert(id, player.name.clone());
        Ok(id)
    }
}
