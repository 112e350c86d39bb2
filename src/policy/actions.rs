//! Outbound administrative commands.
//!
//! Everything the daemon tells a game server to do goes through the session's
//! outbound buffer as `[command byte][payload]`. Mute, kick and stuff are remote
//! admin lines sent with [`AdminCommand::Command`].

use crate::core::buffer::MessageBuffer;
use crate::core::commands::{AdminCommand, PrintLevel};
use crate::service::events::EventKind;
use crate::session::Session;
use tracing::{info, warn};

pub fn write_pong(out: &mut MessageBuffer) {
    out.write_byte(AdminCommand::Pong as u8);
}

pub fn write_say_all(out: &mut MessageBuffer, level: PrintLevel, text: &str) {
    out.write_byte(AdminCommand::SayAll as u8);
    out.write_byte(level as u8);
    out.write_string(text);
}

pub fn write_say_client(out: &mut MessageBuffer, slot: u8, level: PrintLevel, text: &str) {
    out.write_byte(AdminCommand::SayClient as u8);
    out.write_byte(slot);
    out.write_byte(level as u8);
    out.write_string(text);
}

/// Issue one remote admin line.
pub fn write_remote_command(out: &mut MessageBuffer, line: &str) {
    out.write_byte(AdminCommand::Command as u8);
    out.write_string(line);
}

pub fn stuff_line(slot: u8, command: &str) -> String {
    format!("sv !stuff CL {slot} {command}\n")
}

/// A negative duration mutes permanently.
pub fn mute_line(slot: u8, seconds: i32) -> String {
    if seconds < 0 {
        format!("sv !mute CL {slot} PERM\n")
    } else {
        format!("sv !mute CL {slot} {seconds}")
    }
}

pub fn kick_line(slot: u8) -> String {
    format!("kick {slot}")
}

impl Session {
    fn wire_slot(&self, slot: usize) -> Option<u8> {
        let wire = u8::try_from(slot).ok().filter(|_| self.players.valid_slot(slot));
        if wire.is_none() {
            warn!(server = %self.name(), slot, "admin action on invalid slot, ignoring");
        }
        wire
    }

    /// Message every player on the server.
    pub fn say_all(&mut self, level: PrintLevel, text: &str) {
        write_say_all(&mut self.outbound, level, text);
    }

    /// Message one player.
    pub fn say_player(&mut self, slot: usize, level: PrintLevel, text: &str) {
        if let Some(slot) = self.wire_slot(slot) {
            write_say_client(&mut self.outbound, slot, level, text);
        }
    }

    /// Have the game server run `line` as a console command.
    pub fn remote_command(&mut self, line: &str) {
        write_remote_command(&mut self.outbound, line);
    }

    /// Force a player to execute `command`.
    pub fn stuff_player(&mut self, slot: usize, command: &str) {
        if let Some(slot) = self.wire_slot(slot) {
            let line = stuff_line(slot, command);
            self.remote_command(&line);
        }
    }

    /// Prevent a player from talking for `seconds`, or permanently if negative.
    pub fn mute_player(&mut self, slot: usize, seconds: i32) {
        let Some(wire) = self.wire_slot(slot) else {
            return;
        };
        let line = mute_line(wire, seconds);
        self.remote_command(&line);

        info!(server = %self.name(), slot, seconds, "mute");
        self.record_event(
            EventKind::Command,
            &format!("MUTE [{slot}] was muted ({seconds}s)"),
        );
    }

    /// Disconnect a player from the game server.
    pub fn kick_player(&mut self, slot: usize) {
        let Some(wire) = self.wire_slot(slot) else {
            return;
        };
        let line = kick_line(wire);
        self.remote_command(&line);

        info!(server = %self.name(), slot, "kick");
        self.record_event(EventKind::Command, &format!("KICK [{slot}] was kicked"));
    }
}

/// A player used the invite command.
///
/// Inviting is not implemented yet; the only effect is a short mute of the inviter.
pub(crate) fn invite(session: &mut Session, slot: usize, text: &str) {
    let Some(player) = session.players.find_player(slot) else {
        warn!(server = %session.name(), slot, "invite from empty slot, ignoring");
        return;
    };
    info!(server = %session.name(), player = %player.name, text, "invite");

    let seconds = session.ctx.settings().invite_mute_seconds;
    session.mute_player(slot, seconds);
}
