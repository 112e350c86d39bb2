//! Inbound command loop.
//!
//! Reads `[command byte][payload]` records from the session's inbound buffer until it is
//! exhausted. Each handler reads its whole payload before acting on it, so a handler
//! that fails after decoding leaves the cursor on the next record.
//!
//! Record lengths are implied by the command byte. An unknown byte therefore makes the
//! rest of the message unreadable; it is logged and the remainder is discarded.

use crate::core::commands::{PlayerCommand, PrintLevel, ServerCommand};
use crate::error::{AdminError, Result};
use crate::policy::{self, actions, teleport};
use crate::protocol::handshake::rotation_due;
use crate::protocol::hello::Hello;
use crate::service::events::EventKind;
use crate::session::Session;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dispatch every record in `session.inbound`. Returns how many were handled.
///
/// Only session-fatal errors are returned; everything else is logged and the loop
/// carries on with the next record.
pub fn dispatch(session: &mut Session) -> Result<usize> {
    let mut handled = 0;

    while session.connected && session.inbound.remaining() {
        let byte = session.inbound.read_byte()?;
        let Ok(command) = ServerCommand::try_from(byte) else {
            warn!(
                server = %session.name,
                command = byte,
                position = session.inbound.position(),
                "unknown command, discarding rest of message"
            );
            session.inbound.skip_rest();
            break;
        };

        match handle(session, command) {
            Ok(()) => handled += 1,
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(AdminError::Framing(reason)) => {
                session.ctx.metrics().framing_error();
                warn!(server = %session.name, ?command, reason, "truncated record, discarding rest of message");
                session.inbound.skip_rest();
            }
            Err(e) => {
                debug!(server = %session.name, ?command, error = %e, "record ignored");
                handled += 1;
            }
        }
    }

    Ok(handled)
}

fn handle(session: &mut Session, command: ServerCommand) -> Result<()> {
    match command {
        ServerCommand::Hello => {
            let hello = Hello::decode(&mut session.inbound)?;
            warn!(server = %session.name, key = hello.key, "hello on established session, ignoring");
            Ok(())
        }
        ServerCommand::Quit => {
            info!(server = %session.name, "server shutting down");
            session.close();
            Ok(())
        }
        ServerCommand::Connect => on_connect(session),
        ServerCommand::Disconnect => on_disconnect(session),
        ServerCommand::PlayerList => on_player_list(session),
        ServerCommand::PlayerUpdate => on_player_update(session),
        ServerCommand::Print => on_print(session),
        ServerCommand::Command => on_player_command(session),
        ServerCommand::Players => {
            let count = session.inbound.read_byte()?;
            if usize::from(count) != session.players.len() {
                debug!(server = %session.name, reported = count, tracked = session.players.len(), "player count differs");
            }
            Ok(())
        }
        ServerCommand::Frag => on_frag(session),
        ServerCommand::Map => {
            let map = session.inbound.read_string()?;
            info!(server = %session.name, map = %map, "map changed");
            session.current_map = map;
            Ok(())
        }
        ServerCommand::Ping => on_ping(session),
        ServerCommand::KeyAck => {
            let epoch = session.inbound.read_byte()?;
            session.acknowledge_key(epoch)
        }
    }
}

fn read_player_record(session: &mut Session) -> Result<(usize, String)> {
    let slot = usize::from(session.inbound.read_byte()?);
    let userinfo = session.inbound.read_string()?;
    Ok((slot, userinfo))
}

/// Register a player and run the ban checks against them.
fn admit_player(session: &mut Session, slot: usize, userinfo: &str) -> Result<String> {
    let ctx = Arc::clone(&session.ctx);
    let player = session.players.add_player(slot, userinfo, ctx.identities())?;
    let summary = format!("[{slot}] {} ({}) {}", player.name, player.ip, player.fingerprint);

    policy::enforce_bans(session, slot)?;
    Ok(summary)
}

fn on_connect(session: &mut Session) -> Result<()> {
    let (slot, userinfo) = read_player_record(session)?;
    let summary = admit_player(session, slot, &userinfo)?;
    info!(server = %session.name, player = %summary, "player connected");
    session.record_event(EventKind::Join, &summary);
    Ok(())
}

fn on_disconnect(session: &mut Session) -> Result<()> {
    let slot = usize::from(session.inbound.read_byte()?);
    if !session.players.valid_slot(slot) {
        warn!(
            server = %session.name,
            slot,
            capacity = session.players.capacity(),
            frame = %hex::encode(session.inbound.as_slice()),
            "disconnect for out-of-range slot"
        );
        return Err(AdminError::SlotRange(slot));
    }

    match session.players.remove_player(slot) {
        Some(player) if player.is_live() => {
            let detail = format!("[{slot}] {}", player.name);
            info!(server = %session.name, player = %detail, "player disconnected");
            session.record_event(EventKind::Part, &detail);
        }
        _ => debug!(server = %session.name, slot, "disconnect for empty slot"),
    }
    Ok(())
}

/// Bulk registration, sent after the daemon (re)connects to a running server.
fn on_player_list(session: &mut Session) -> Result<()> {
    let count = session.inbound.read_byte()?;
    let mut added = 0;
    for _ in 0..count {
        let (slot, userinfo) = read_player_record(session)?;
        match admit_player(session, slot, &userinfo) {
            Ok(_) => added += 1,
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => debug!(server = %session.name, slot, error = %e, "player list entry skipped"),
        }
    }
    info!(server = %session.name, count, added, "player list synchronized");
    Ok(())
}

fn on_player_update(session: &mut Session) -> Result<()> {
    let (slot, userinfo) = read_player_record(session)?;
    let player = session.players.update_userinfo(slot, &userinfo)?;
    debug!(server = %session.name, slot, name = %player.name, "userinfo changed");
    Ok(())
}

fn on_print(session: &mut Session) -> Result<()> {
    let level = session.inbound.read_byte()?;
    let text = session.inbound.read_string()?;
    let line = text.trim_end();

    match PrintLevel::from_byte(level) {
        Some(PrintLevel::Chat) => session.record_event(EventKind::Chat, line),
        // frag messages; kill credit itself arrives as a Frag record
        Some(PrintLevel::Medium) => debug!(server = %session.name, obituary = %line, "print"),
        _ => debug!(server = %session.name, level, text = %line, "print"),
    }
    Ok(())
}

/// `[sub-command][slot][argument]`; the slot belongs to the sub-command's payload.
fn on_player_command(session: &mut Session) -> Result<()> {
    let sub = session.inbound.read_byte()?;

    match PlayerCommand::try_from(sub) {
        Ok(PlayerCommand::Teleport) => {
            let slot = usize::from(session.inbound.read_byte()?);
            let destination = session.inbound.read_string()?;
            teleport::teleport(session, slot, &destination)
        }
        Ok(PlayerCommand::Invite) => {
            let slot = usize::from(session.inbound.read_byte()?);
            let text = session.inbound.read_string()?;
            actions::invite(session, slot, &text);
            Ok(())
        }
        Err(unknown) => {
            warn!(server = %session.name, command = unknown, "unknown player command, discarding rest of message");
            session.inbound.skip_rest();
            Ok(())
        }
    }
}

/// Kill accounting. A missing attacker or a self-kill is a suicide.
fn on_frag(session: &mut Session) -> Result<()> {
    let victim = usize::from(session.inbound.read_byte()?);
    let attacker = usize::from(session.inbound.read_byte()?);

    let suicide = victim == attacker || session.players.find_player(attacker).is_none();
    if session.players.find_player(victim).is_none() {
        debug!(server = %session.name, victim, attacker, "frag for empty slot");
        return Ok(());
    }

    if suicide {
        if let Some(p) = session.players.find_player_mut(victim) {
            p.suicides += 1;
            p.frags -= 1;
            p.deaths += 1;
        }
    } else {
        if let Some(p) = session.players.find_player_mut(attacker) {
            p.frags += 1;
        }
        if let Some(p) = session.players.find_player_mut(victim) {
            p.deaths += 1;
        }
    }
    Ok(())
}

fn on_ping(session: &mut Session) -> Result<()> {
    session.ping_count += 1;
    debug!(server = %session.name, pings = session.ping_count, "ping");
    if rotation_due(session.ping_count) {
        session.rotate_keys()?;
    }
    actions::write_pong(&mut session.outbound);
    Ok(())
}
