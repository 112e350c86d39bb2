//! # Policy Layer
//!
//! Business rules invoked by the dispatcher once a message has been decoded.
//!
//! ## Components
//! - **Bans**: global then session-local address bans, enforced on connect
//! - **Teleport**: destination directory and the teleport player command
//! - **Actions**: say, stuff, mute and kick; the invite command
//!
//! Every rule refers to players by slot and writes its effects to the session's
//! outbound buffer.

pub mod actions;
pub mod bans;
pub mod teleport;

pub use bans::{check_bans, AddressPattern, BanEntry, BanList, BanMatch, BanScope};
pub use teleport::ServerDirectory;

use crate::core::commands::PrintLevel;
use crate::error::Result;
use crate::session::Session;
use std::sync::Arc;
use tracing::info;

/// Check the player in `slot` against global and local bans; notify and kick on a match.
pub fn enforce_bans(session: &mut Session, slot: usize) -> Result<Option<BanMatch>> {
    let Some(address) = session.players.find_player(slot).map(|p| p.ip.clone()) else {
        return Ok(None);
    };

    let ctx = Arc::clone(&session.ctx);
    let hit = {
        let global = ctx.global_bans()?;
        check_bans(&global, &session.bans, &address)
    };

    if let Some(ban) = &hit {
        info!(server = %session.name(), slot, address = %address, scope = ?ban.scope, reason = %ban.reason, "banned player");
        session.say_player(slot, PrintLevel::Chat, &ban.notice());
        session.kick_player(slot);
    }
    Ok(hit)
}
