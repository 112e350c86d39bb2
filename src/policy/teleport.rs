//! Teleport destinations and the teleport player command.

use crate::config::ServerEntry;
use crate::core::commands::PrintLevel;
use crate::error::{AdminError, Result};
use crate::service::events::EventKind;
use crate::session::Session;
use crate::utils::time::unix_timestamp;
use std::sync::Arc;
use tracing::{info, warn};

/// Known game servers, by name and by session key.
///
/// Shared read-mostly through [`crate::context::AdminContext`]; the protocol engine
/// only reads it.
#[derive(Debug, Clone, Default)]
pub struct ServerDirectory {
    servers: Vec<ServerEntry>,
}

impl ServerDirectory {
    pub fn new(servers: Vec<ServerEntry>) -> Self {
        Self { servers }
    }

    /// The enabled server presenting `key` in its hello.
    pub fn find_by_key(&self, key: i32) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.key == key && s.enabled)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// `address:port` of the enabled server named exactly `name`.
    pub fn resolve(&self, name: &str) -> Result<String> {
        self.servers
            .iter()
            .find(|s| s.enabled && s.name == name)
            .map(ServerEntry::endpoint)
            .ok_or_else(|| AdminError::UnknownDestination(name.to_string()))
    }

    /// Names of every enabled destination, in configuration order.
    pub fn destinations(&self) -> Vec<&str> {
        self.servers
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Add a server or replace the one with the same name.
    pub fn upsert(&mut self, entry: ServerEntry) {
        match self.servers.iter_mut().find(|s| s.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.servers.push(entry),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<ServerEntry> {
        let pos = self.servers.iter().position(|s| s.name == name)?;
        Some(self.servers.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// A player asked to be sent to `destination`.
///
/// An empty destination lists the available ones. Unknown names get an in-band notice.
/// Every request is recorded to the event log, including one from an empty slot.
/// The destination is matched exactly as sent.
pub(crate) fn teleport(session: &mut Session, slot: usize, destination: &str) -> Result<()> {
    let Some(player) = session.players.find_player(slot) else {
        warn!(server = %session.name(), slot, destination, "teleport from empty slot, ignoring");
        session.record_event(
            EventKind::Command,
            &format!("TELEPORT [{slot}] -> {destination}"),
        );
        return Ok(());
    };
    let name = player.name.clone();
    info!(server = %session.name(), player = %name, destination, "teleport");

    let ctx = Arc::clone(&session.ctx);
    let now = unix_timestamp();

    if destination.is_empty() {
        let list = ctx.directory()?.destinations().join(" ");
        if let Some(p) = session.players.find_player_mut(slot) {
            p.last_teleport_list = now;
        }
        session.say_player(
            slot,
            PrintLevel::High,
            &format!("Available destinations: {list}\n"),
        );
    } else {
        let resolved = ctx.directory()?.resolve(destination);
        match resolved {
            Ok(endpoint) => {
                if let Some(p) = session.players.find_player_mut(slot) {
                    p.teleports += 1;
                    p.last_teleport = now;
                }
                session.stuff_player(slot, &format!("connect {endpoint}\n"));
            }
            Err(e) => {
                warn!(server = %session.name(), error = %e, "teleport failed");
                session.say_player(slot, PrintLevel::High, "Unknown destination\n");
            }
        }
    }

    session.record_event(
        EventKind::Command,
        &format!("TELEPORT [{slot}] {name} -> {destination}"),
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn directory() -> ServerDirectory {
        let mut disabled = ServerEntry::new(3, 30, "old", "10.0.0.3", 27910);
        disabled.enabled = false;
        ServerDirectory::new(vec![
            ServerEntry::new(1, 10, "dm", "10.0.0.1", 27910),
            ServerEntry::new(2, 20, "ctf", "10.0.0.2", 27911),
            disabled,
        ])
    }

    #[test]
    fn test_exact_resolution_only() {
        let dir = directory();
        assert_eq!(dir.resolve("ctf").unwrap(), "10.0.0.2:27911");
        for miss in ["CTF", "ct", "ctf ", "", "old"] {
            assert!(matches!(
                dir.resolve(miss),
                Err(AdminError::UnknownDestination(_))
            ));
        }
    }

    #[test]
    fn test_lookup_by_key_skips_disabled() {
        let dir = directory();
        assert_eq!(dir.find_by_key(10).unwrap().name, "dm");
        assert!(dir.find_by_key(30).is_none());
        assert!(dir.find_by_key(99).is_none());
        assert!(dir.find_by_name("old").is_some());
    }

    #[test]
    fn test_destinations_and_upsert() {
        let mut dir = directory();
        assert_eq!(dir.destinations(), vec!["dm", "ctf"]);
        dir.upsert(ServerEntry::new(2, 20, "ctf", "10.0.0.9", 27911));
        assert_eq!(dir.resolve("ctf").unwrap(), "10.0.0.9:27911");
        assert_eq!(dir.len(), 3);
        assert!(dir.remove("dm").is_some());
        assert!(dir.resolve("dm").is_err());
    }
}
