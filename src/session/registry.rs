//! Player Registry
//!
//! Fixed-capacity, slot-indexed player records for one session. Slots are assigned by
//! the game server and reused after a disconnect, so a slot number is only meaningful
//! while the record in it is live.
//!
//! Everything else in the daemon refers to players by slot number, never by reference,
//! so nothing outlives a disconnect.

use crate::error::{AdminError, Result};
use crate::service::identity::IdentityStore;
use crate::session::userinfo::Userinfo;
use crate::utils::time::unix_timestamp;
use tracing::{debug, warn};

/// One connected player on one game server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Player {
    pub slot: usize,
    /// Persisted identity; `None` until the identity store answers
    pub identity: Option<i64>,
    pub name: String,
    pub userinfo_raw: String,
    pub userinfo: Userinfo,
    pub fingerprint: String,
    pub frags: i32,
    pub deaths: i32,
    pub suicides: i32,
    pub teleports: i32,
    /// Last executed teleport (unix seconds)
    pub last_teleport: i64,
    /// Last time the destination list was shown (unix seconds)
    pub last_teleport_list: i64,
    pub invites: i32,
    pub last_invite: i64,
    pub invites_available: i32,
    pub ip: String,
    pub port: u16,
    pub fov: i32,
    /// Zero means the record is not a real occupant
    pub connect_time: i64,
}

impl Player {
    /// Build a record from raw userinfo. The identity is left unresolved.
    pub fn from_userinfo(slot: usize, raw: &str) -> Self {
        let userinfo = Userinfo::parse(raw);
        let mut player = Player {
            slot,
            userinfo_raw: raw.to_string(),
            connect_time: unix_timestamp(),
            ..Default::default()
        };
        player.apply_userinfo(userinfo);
        player.fingerprint = player.userinfo.fingerprint();
        player
    }

    fn apply_userinfo(&mut self, userinfo: Userinfo) {
        self.name = userinfo.value("name").to_string();
        self.ip = userinfo.value("ip").to_string();
        self.port = u16::try_from(userinfo.int("port")).unwrap_or(0);
        self.fov = userinfo.int("fov");
        self.userinfo = userinfo;
    }

    /// Whether this record represents someone actually connected.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.connect_time > 0
    }
}

/// Slot-indexed players of one session.
#[derive(Debug, Clone)]
pub struct PlayerRegistry {
    slots: Vec<Option<Player>>,
}

impl PlayerRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether `slot` indexes into the registry at all, occupied or not.
    #[inline]
    pub fn valid_slot(&self, slot: usize) -> bool {
        slot < self.slots.len()
    }

    /// The live player in `slot`, if any.
    pub fn find_player(&self, slot: usize) -> Option<&Player> {
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .filter(|p| p.is_live())
    }

    pub fn find_player_mut(&mut self, slot: usize) -> Option<&mut Player> {
        self.slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .filter(|p| p.is_live())
    }

    /// Register a newly connected player.
    ///
    /// Rejects out-of-range and already-occupied slots without touching the registry.
    /// The identity is resolved through `identities`, creating one on a miss; store
    /// failures leave the identity unresolved.
    pub fn add_player(
        &mut self,
        slot: usize,
        raw_userinfo: &str,
        identities: &dyn IdentityStore,
    ) -> Result<&Player> {
        if !self.valid_slot(slot) {
            warn!(slot, capacity = self.capacity(), "player slot out of range, ignoring");
            return Err(AdminError::SlotRange(slot));
        }
        if let Some(existing) = self.find_player(slot) {
            warn!(slot, existing = %existing.name, "slot already occupied, ignoring connect");
            return Err(AdminError::SlotOccupied(slot));
        }

        let mut player = Player::from_userinfo(slot, raw_userinfo);
        player.identity = resolve_identity(&player, identities);
        debug!(slot, fingerprint = %player.fingerprint, identity = ?player.identity, "player registered");

        let player = self.slots[slot].insert(player);
        Ok(&*player)
    }

    /// Refresh userinfo of an occupied slot. Fingerprint and identity are kept.
    pub fn update_userinfo(&mut self, slot: usize, raw_userinfo: &str) -> Result<&Player> {
        if !self.valid_slot(slot) {
            return Err(AdminError::SlotRange(slot));
        }
        let player = self
            .find_player_mut(slot)
            .ok_or(AdminError::UnexpectedMessage)?;
        player.userinfo_raw = raw_userinfo.to_string();
        player.apply_userinfo(Userinfo::parse(raw_userinfo));
        Ok(&*player)
    }

    /// Clear `slot`. Idempotent; out-of-range slots are ignored.
    pub fn remove_player(&mut self, slot: usize) -> Option<Player> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    /// Live players in slot order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.slots.iter().flatten().filter(|p| p.is_live())
    }

    pub fn len(&self) -> usize {
        self.players().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn resolve_identity(player: &Player, identities: &dyn IdentityStore) -> Option<i64> {
    let lookup = match identities.resolve_identity(&player.fingerprint) {
        Ok(Some(id)) => return Some(id),
        Ok(None) => identities.create_identity(player),
        Err(e) => Err(e),
    };

    match lookup {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(slot = player.slot, fingerprint = %player.fingerprint, error = %e, "identity unresolved");
            None
        }
    }
}
