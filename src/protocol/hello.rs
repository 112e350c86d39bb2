//! The greeting that opens every session.
//!
//! A game server's first frame is always a plaintext envelope holding exactly one
//! `Hello` record. Nothing is sealed until the daemon has answered it.

use crate::core::buffer::MessageBuffer;
use crate::core::commands::{AdminCommand, ServerCommand};
use crate::error::{constants, AdminError, Result};
use crate::utils::crypto::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hello {
    /// Selects the configured server
    pub key: i32,
    pub version: i32,
    /// Game port, for display only
    pub port: u16,
    pub encrypted: bool,
    pub max_players: u8,
}

impl Hello {
    /// Decode the payload following the `Hello` command byte.
    pub fn decode(msg: &mut MessageBuffer) -> Result<Self> {
        Ok(Self {
            key: msg.read_long()?,
            version: msg.read_long()?,
            port: msg.read_short()?,
            encrypted: msg.read_byte()? != 0,
            max_players: msg.read_byte()?,
        })
    }

    /// Append the full record, command byte included.
    pub fn encode(&self, out: &mut MessageBuffer) {
        out.write_byte(ServerCommand::Hello as u8);
        out.write_long(self.key);
        out.write_long(self.version);
        out.write_short(self.port);
        out.write_byte(u8::from(self.encrypted));
        out.write_byte(self.max_players);
    }
}

/// Parse the opening frame of a connection.
pub fn read_hello(frame: &[u8]) -> Result<Hello> {
    let Envelope::Plain(records) = Envelope::parse(frame)? else {
        return Err(AdminError::Handshake(constants::ERR_EXPECTED_HELLO.into()));
    };
    let mut msg = MessageBuffer::from_bytes(records);
    match msg.read_byte()? {
        b if b == ServerCommand::Hello as u8 => Hello::decode(&mut msg),
        _ => Err(AdminError::Handshake(constants::ERR_EXPECTED_HELLO.into())),
    }
}

/// The daemon's answer to an accepted hello: the session's database key.
pub fn write_hello_ack(out: &mut MessageBuffer, session_id: i32) {
    out.write_byte(AdminCommand::HelloAck as u8);
    out.write_long(session_id);
}

/// Refuse a connection in-band before closing it.
pub fn write_error(out: &mut MessageBuffer, reason: &str) {
    out.write_byte(AdminCommand::Error as u8);
    out.write_string(reason);
}
