//! A scripted game server for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use q2admind::config::{BanRule, DaemonConfig, ServerEntry};
use q2admind::context::AdminContext;
use q2admind::core::{AdminCommand, MessageBuffer, PrintLevel, ServerCommand};
use q2admind::protocol::Hello;
use q2admind::service::{MemoryEventLog, MemoryIdentityStore};
use q2admind::utils::crypto::{unwrap_key_material, Envelope, KeyMaterial, Role};
use rand_core::OsRng;
use std::sync::Arc;
use x25519_dalek::{PublicKey, StaticSecret};

pub const CLAIRE: &str = "\\name\\claire\\skin\\female/athena\\fov\\90\\ip\\10.1.2.3:27901";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    HelloAck(i32),
    Error(String),
    Pong,
    Command(String),
    SayClient(u8, PrintLevel, String),
    SayAll(PrintLevel, String),
    Key(u8, Vec<u8>),
}

pub fn parse_replies(records: &[u8]) -> Vec<Reply> {
    let mut msg = MessageBuffer::from_bytes(records);
    let mut replies = Vec::new();
    while msg.remaining() {
        let command = AdminCommand::try_from(msg.read_byte().unwrap()).unwrap();
        replies.push(match command {
            AdminCommand::HelloAck => Reply::HelloAck(msg.read_long().unwrap()),
            AdminCommand::Error => Reply::Error(msg.read_string().unwrap()),
            AdminCommand::Pong => Reply::Pong,
            AdminCommand::Command => Reply::Command(msg.read_string().unwrap()),
            AdminCommand::SayClient => {
                let slot = msg.read_byte().unwrap();
                let level = PrintLevel::from_byte(msg.read_byte().unwrap()).unwrap();
                Reply::SayClient(slot, level, msg.read_string().unwrap())
            }
            AdminCommand::SayAll => {
                let level = PrintLevel::from_byte(msg.read_byte().unwrap()).unwrap();
                Reply::SayAll(level, msg.read_string().unwrap())
            }
            AdminCommand::Key => {
                let epoch = msg.read_byte().unwrap();
                Reply::Key(epoch, msg.read_data().unwrap())
            }
        });
    }
    replies
}

pub fn key_offer(replies: &[Reply]) -> Option<u8> {
    replies.iter().find_map(|r| match r {
        Reply::Key(epoch, _) => Some(*epoch),
        _ => None,
    })
}

/// The admin mod's side of a session: builds records and seals/opens frames.
pub struct GameServer {
    pub secret: StaticSecret,
    pub keys: Vec<KeyMaterial>,
    pub sending: Option<u8>,
}

impl Default for GameServer {
    fn default() -> Self {
        Self::new()
    }
}

impl GameServer {
    pub fn new() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(OsRng),
            keys: Vec::new(),
            sending: None,
        }
    }

    pub fn public_hex(&self) -> String {
        hex::encode(PublicKey::from(&self.secret).to_bytes())
    }

    pub fn hello(key: i32, encrypted: bool) -> Vec<u8> {
        let mut msg = MessageBuffer::new();
        Hello {
            key,
            version: 1,
            port: 27910,
            encrypted,
            max_players: 16,
        }
        .encode(&mut msg);
        Envelope::plain(msg.as_slice())
    }

    pub fn frame(&mut self, build: impl FnOnce(&mut MessageBuffer)) -> Vec<u8> {
        let mut msg = MessageBuffer::new();
        build(&mut msg);
        self.seal(msg.as_slice())
    }

    pub fn seal(&mut self, records: &[u8]) -> Vec<u8> {
        match self.sending {
            None => Envelope::plain(records),
            Some(epoch) => self
                .keys
                .iter_mut()
                .find(|k| k.epoch() == epoch)
                .unwrap()
                .seal(Role::GameServer, records)
                .unwrap(),
        }
    }

    /// Decode a daemon frame, taking any key offers it carries.
    pub fn open(&mut self, frame: &[u8]) -> Vec<Reply> {
        let replies = match Envelope::parse(frame).unwrap() {
            Envelope::Plain(records) => parse_replies(records),
            Envelope::Sealed {
                epoch,
                counter,
                ciphertext,
            } => {
                let key = self.keys.iter_mut().find(|k| k.epoch() == epoch).unwrap();
                parse_replies(&key.open(counter, ciphertext).unwrap())
            }
        };
        for reply in &replies {
            if let Reply::Key(epoch, wrapped) = reply {
                let material = unwrap_key_material(&self.secret, *epoch, wrapped).unwrap();
                self.keys.push(material);
            }
        }
        replies
    }

    /// Switch to `epoch` and confirm it under the new key.
    pub fn ack(&mut self, epoch: u8) -> Vec<u8> {
        self.sending = Some(epoch);
        self.seal(&[ServerCommand::KeyAck as u8, epoch])
    }

    pub fn ping(&mut self) -> Vec<u8> {
        self.frame(|m| m.write_byte(ServerCommand::Ping as u8))
    }
}

pub fn connect(msg: &mut MessageBuffer, slot: u8, userinfo: &str) {
    msg.write_byte(ServerCommand::Connect as u8);
    msg.write_byte(slot);
    msg.write_string(userinfo);
}

pub fn disconnect(msg: &mut MessageBuffer, slot: u8) {
    msg.write_byte(ServerCommand::Disconnect as u8);
    msg.write_byte(slot);
}

pub struct Fixture {
    pub ctx: Arc<AdminContext>,
    pub events: Arc<MemoryEventLog>,
    pub identities: Arc<MemoryIdentityStore>,
}

/// Two servers, `dm` (key 1234) and `ctf` (key 5678), and one global ban on `10.66.*`.
pub fn fixture(dm_public_key: Option<String>) -> Fixture {
    fixture_with(dm_public_key, |_| {})
}

pub fn fixture_with(dm_public_key: Option<String>, tweak: impl FnOnce(&mut DaemonConfig)) -> Fixture {
    let mut config = DaemonConfig::default_with_overrides(|c| {
        let mut dm = ServerEntry::new(7, 1234, "dm", "10.0.0.1", 27910);
        dm.public_key = dm_public_key;
        c.servers.push(dm);
        c.servers
            .push(ServerEntry::new(8, 5678, "ctf", "10.0.0.2", 27911));
        c.bans.push(BanRule {
            pattern: "10.66.*".into(),
            reason: "aimbot".into(),
        });
    });
    tweak(&mut config);

    let events = Arc::new(MemoryEventLog::new());
    let identities = Arc::new(MemoryIdentityStore::new());
    let ctx = Arc::new(AdminContext::new(
        &config,
        identities.clone(),
        events.clone(),
    ));
    Fixture {
        ctx,
        events,
        identities,
    }
}
