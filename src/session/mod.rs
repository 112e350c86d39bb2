//! # Sessions
//!
//! One [`Session`] per connected game server. It owns everything about that connection:
//! both message buffers, the key ring, the ping counter and the player registry. Only
//! the worker driving the connection touches it, so none of this is synchronized.
//!
//! The state shared across sessions (server directory, global bans, collaborators)
//! lives in [`AdminContext`] and is reached through `ctx`.

pub mod registry;
pub mod userinfo;

pub use registry::{Player, PlayerRegistry};
pub use userinfo::{derive_fingerprint, Userinfo};

use crate::config::MAX_PLAYERS_LIMIT;
use crate::context::AdminContext;
use crate::core::buffer::MessageBuffer;
use crate::core::commands::AdminCommand;
use crate::error::{AdminError, Result};
use crate::policy::bans::BanList;
use crate::protocol::dispatcher;
use crate::protocol::handshake::{CryptoState, KeyOffer, SessionCrypto};
use crate::protocol::hello::{write_hello_ack, Hello};
use crate::service::events::EventKind;
use crate::utils::crypto::parse_public_key;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct Session {
    /// Database key of the configured server
    pub(crate) id: i64,
    pub(crate) key: i32,
    pub(crate) version: i32,
    pub(crate) name: String,
    pub(crate) address: String,
    pub(crate) port: u16,
    pub(crate) connected: bool,
    pub(crate) current_map: String,
    pub(crate) enabled: bool,
    pub(crate) inbound: MessageBuffer,
    pub(crate) outbound: MessageBuffer,
    pub(crate) crypto: SessionCrypto,
    /// Epoch of the frame being dispatched, `None` if it arrived in plaintext
    pub(crate) frame_epoch: Option<u8>,
    pub(crate) ping_count: u64,
    pub(crate) players: PlayerRegistry,
    pub(crate) bans: BanList,
    pub(crate) ctx: Arc<AdminContext>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("connected", &self.connected)
            .field("crypto", &self.crypto.state())
            .field("players", &self.players.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Accept a greeting from a configured server.
    ///
    /// Queues the `HelloAck` and, when the server asked for encryption, the first key
    /// offer. Unknown or disabled keys are refused with [`AdminError::UnknownServer`].
    pub fn open(ctx: Arc<AdminContext>, hello: &Hello) -> Result<Self> {
        let entry = ctx
            .directory()?
            .find_by_key(hello.key)
            .cloned()
            .ok_or_else(|| {
                warn!(key = hello.key, "hello from unknown or disabled server");
                AdminError::UnknownServer(hello.key)
            })?;

        // the admin mod stores the session id as a 32-bit int
        let wire_id = i32::try_from(entry.id).map_err(|_| {
            warn!(server = %entry.name, id = entry.id, "server id does not fit the hello acknowledgement");
            AdminError::Config(format!("server id {} exceeds 32 bits", entry.id))
        })?;

        let server_public = entry
            .public_key
            .as_deref()
            .map(parse_public_key)
            .transpose()?;

        let capacity = entry
            .max_players
            .or_else(|| (hello.max_players > 0).then_some(usize::from(hello.max_players)))
            .unwrap_or(ctx.settings().default_max_players)
            .min(MAX_PLAYERS_LIMIT);

        let mut session = Session {
            id: entry.id,
            key: hello.key,
            version: hello.version,
            name: entry.name.clone(),
            address: entry.address.clone(),
            port: hello.port,
            connected: true,
            current_map: String::new(),
            enabled: entry.enabled,
            inbound: MessageBuffer::new(),
            outbound: MessageBuffer::new(),
            crypto: SessionCrypto::new(server_public),
            frame_epoch: None,
            ping_count: 0,
            players: PlayerRegistry::new(capacity),
            bans: BanList::from_rules(&entry.bans),
            ctx,
        };

        write_hello_ack(&mut session.outbound, wire_id);
        if hello.encrypted {
            session.start_handshake()?;
        }

        session.ctx.metrics().session_opened();
        info!(
            server = %session.name,
            version = session.version,
            encrypted = hello.encrypted,
            capacity,
            "session opened"
        );
        Ok(session)
    }

    /// Process one inbound frame.
    ///
    /// Framing problems drop the frame and keep the session. An authentication failure
    /// discards every key, queues a fresh offer and is returned to the caller.
    pub fn receive(&mut self, frame: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(AdminError::SessionClosed);
        }
        self.ctx.metrics().frame_received(frame.len() as u64);
        self.check_deadline(Instant::now())?;

        let opened = match self.crypto.open(frame) {
            Ok(opened) => opened,
            Err(AdminError::Authentication) => return self.resynchronize(),
            Err(AdminError::Framing(reason)) => {
                self.ctx.metrics().framing_error();
                warn!(server = %self.name, reason, "malformed envelope, dropping frame");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.frame_epoch = opened.epoch;
        self.inbound.reset(&opened.records);
        let handled = dispatcher::dispatch(self)?;
        debug!(server = %self.name, handled, "frame dispatched");
        Ok(())
    }

    fn resynchronize(&mut self) -> Result<()> {
        self.ctx.metrics().auth_failure();
        error!(server = %self.name, "frame failed authentication");

        let offer = self.crypto.restart(Instant::now())?;
        self.ctx.metrics().handshake_started();
        self.write_key_offer(&offer)?;
        Err(AdminError::Authentication)
    }

    /// Take everything queued for the game server as one wire-ready frame.
    pub fn flush(&mut self) -> Result<Option<Bytes>> {
        if self.outbound.is_empty() {
            return Ok(None);
        }
        let records = self.outbound.take();
        let frame = self.crypto.seal(&records)?;
        self.ctx.metrics().frame_sent(frame.len() as u64);
        Ok(Some(Bytes::from(frame)))
    }

    /// The transport is gone. Clears all per-connection state; later calls to
    /// [`Session::receive`] fail with [`AdminError::SessionClosed`].
    pub fn close(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        self.players.clear();
        self.inbound.reset(&[]);
        self.outbound.reset(&[]);
        self.crypto.reset();
        self.ctx.metrics().session_closed();
        info!(server = %self.name, pings = self.ping_count, "session closed");
    }

    /// Fails once a key offer has gone unanswered for too long.
    pub fn check_deadline(&self, now: Instant) -> Result<()> {
        let timeout = self.ctx.settings().handshake_timeout;
        self.crypto.check_deadline(now, timeout).inspect_err(|_| {
            self.ctx.metrics().handshake_failed();
            error!(server = %self.name, ?timeout, "key offer never acknowledged");
        })
    }

    /// Time left to acknowledge the outstanding key offer, if there is one.
    pub fn key_deadline(&self, now: Instant) -> Option<Duration> {
        self.crypto
            .deadline_remaining(now, self.ctx.settings().handshake_timeout)
    }

    pub(crate) fn start_handshake(&mut self) -> Result<()> {
        let offer = self.crypto.begin_handshake(Instant::now())?;
        self.ctx.metrics().handshake_started();
        self.write_key_offer(&offer)
    }

    /// Offer fresh key material if the session is encrypted and idle.
    pub(crate) fn rotate_keys(&mut self) -> Result<()> {
        if let Some(offer) = self.crypto.rotate(Instant::now())? {
            self.ctx.metrics().rotation();
            info!(server = %self.name, epoch = offer.epoch, pings = self.ping_count, "rotating session key");
            self.write_key_offer(&offer)?;
        }
        Ok(())
    }

    /// The game server confirmed `epoch`. Only honoured when the confirmation itself
    /// was sealed under that epoch.
    pub(crate) fn acknowledge_key(&mut self, epoch: u8) -> Result<()> {
        if self.crypto.pending_epoch() != Some(epoch) || self.frame_epoch != Some(epoch) {
            warn!(
                server = %self.name,
                epoch,
                pending = ?self.crypto.pending_epoch(),
                sealed_under = ?self.frame_epoch,
                "ignoring key acknowledgement"
            );
            return Ok(());
        }
        let initial = self.crypto.state() == CryptoState::Handshaking;
        self.crypto.acknowledge()?;
        if initial {
            self.ctx.metrics().handshake_completed();
            info!(server = %self.name, epoch, "session encrypted");
        } else {
            debug!(server = %self.name, epoch, "session key rotated");
        }
        Ok(())
    }

    fn write_key_offer(&mut self, offer: &KeyOffer) -> Result<()> {
        self.outbound.write_byte(AdminCommand::Key as u8);
        self.outbound.write_byte(offer.epoch);
        self.outbound.write_data(&offer.wrapped)
    }

    pub(crate) fn record_event(&self, kind: EventKind, detail: &str) {
        self.ctx.record_event(self.id, kind, detail);
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current_map(&self) -> &str {
        &self.current_map
    }

    pub fn crypto_state(&self) -> CryptoState {
        self.crypto.state()
    }

    pub fn ping_count(&self) -> u64 {
        self.ping_count
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn local_bans(&self) -> &BanList {
        &self.bans
    }

    pub fn local_bans_mut(&mut self) -> &mut BanList {
        &mut self.bans
    }

    pub fn context(&self) -> &Arc<AdminContext> {
        &self.ctx
    }
}
