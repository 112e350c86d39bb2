//! Session key exchange and rotation.
//!
//! ```text
//! Unencrypted ──begin_handshake()──→ Handshaking ──acknowledge()──→ Encrypted
//!                                         ↑                            │
//!                                         └─────── restart() ──────────┘ (auth failure)
//! ```
//!
//! The daemon generates key material, wraps it with the game server's static public
//! key and sends it as a [`KeyOffer`]. The server answers with a `KeyAck` sealed under
//! the new key, at which point the new material becomes active.
//!
//! Rotation reuses the same exchange while already encrypted. Three epochs can be live
//! at once: `active` (outbound), `pending` (offered, not yet acknowledged) and
//! `retired` (the previous active key, so frames the peer sealed just before the swap
//! still open). Each frame names its epoch, so a frame is always opened under exactly
//! one key.

use crate::error::{constants, AdminError, Result};
use crate::utils::crypto::{wrap_key_material, Envelope, KeyMaterial, Role};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// A rotation runs when the low six bits of the ping count are zero.
pub const ROTATION_MASK: u64 = 63;

/// Whether the `ping_count`th ping triggers a key rotation.
#[inline]
pub fn rotation_due(ping_count: u64) -> bool {
    ping_count != 0 && ping_count & ROTATION_MASK == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoState {
    Unencrypted,
    Handshaking,
    Encrypted,
}

/// Wrapped key material ready to send to the game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOffer {
    pub epoch: u8,
    pub wrapped: Vec<u8>,
}

/// Records recovered from an inbound frame, with the epoch that sealed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedFrame {
    /// `None` for plaintext frames
    pub epoch: Option<u8>,
    pub records: Vec<u8>,
}

#[derive(Debug)]
pub struct SessionCrypto {
    state: CryptoState,
    server_public: Option<[u8; 32]>,
    active: Option<KeyMaterial>,
    pending: Option<KeyMaterial>,
    retired: Option<KeyMaterial>,
    pending_since: Option<Instant>,
    next_epoch: u8,
}

impl SessionCrypto {
    /// `server_public` is fixed for the life of the session.
    pub fn new(server_public: Option<[u8; 32]>) -> Self {
        Self {
            state: CryptoState::Unencrypted,
            server_public,
            active: None,
            pending: None,
            retired: None,
            pending_since: None,
            next_epoch: 1,
        }
    }

    pub fn state(&self) -> CryptoState {
        self.state
    }

    pub fn is_encrypted(&self) -> bool {
        self.state == CryptoState::Encrypted
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn active_epoch(&self) -> Option<u8> {
        self.active.as_ref().map(KeyMaterial::epoch)
    }

    pub fn pending_epoch(&self) -> Option<u8> {
        self.pending.as_ref().map(KeyMaterial::epoch)
    }

    fn take_epoch(&mut self) -> u8 {
        let epoch = self.next_epoch;
        self.next_epoch = match self.next_epoch.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        epoch
    }

    /// Generate and wrap new key material.
    ///
    /// From `Unencrypted` this starts the initial handshake; from `Encrypted` it starts a
    /// rotation and the session stays encrypted under the current key.
    #[instrument(skip(self), level = "debug")]
    pub fn begin_handshake(&mut self, now: Instant) -> Result<KeyOffer> {
        let server_public = self
            .server_public
            .ok_or_else(|| AdminError::Handshake(constants::ERR_NO_PUBLIC_KEY.into()))?;

        let epoch = self.take_epoch();
        let material = KeyMaterial::generate(epoch)?;
        let wrapped = wrap_key_material(&server_public, &material)?;

        self.pending = Some(material);
        self.pending_since = Some(now);
        if self.active.is_none() {
            self.state = CryptoState::Handshaking;
        }

        debug!(epoch, "key material offered");
        Ok(KeyOffer { epoch, wrapped })
    }

    /// Start a scheduled rotation. Skipped while an earlier offer is still unanswered
    /// or the session is not encrypted.
    pub fn rotate(&mut self, now: Instant) -> Result<Option<KeyOffer>> {
        if self.state != CryptoState::Encrypted {
            return Ok(None);
        }
        if self.pending.is_some() {
            debug!("previous rotation still pending, skipping");
            return Ok(None);
        }
        self.begin_handshake(now).map(Some)
    }

    /// The peer acknowledged the pending key: it becomes active, the old active key is
    /// retired.
    pub fn acknowledge(&mut self) -> Result<u8> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| AdminError::Handshake(constants::ERR_NO_PENDING_KEY.into()))?;
        let epoch = pending.epoch();

        self.retired = self.active.replace(pending);
        self.pending_since = None;
        self.state = CryptoState::Encrypted;
        debug!(epoch, "key material active");
        Ok(epoch)
    }

    /// Drop all key material and start over with a fresh offer.
    #[instrument(skip(self), level = "debug")]
    pub fn restart(&mut self, now: Instant) -> Result<KeyOffer> {
        warn!("session crypto desynchronized, restarting handshake");
        self.reset();
        self.begin_handshake(now)
    }

    /// Forget all key material. The public key is kept.
    pub fn reset(&mut self) {
        self.active = None;
        self.pending = None;
        self.retired = None;
        self.pending_since = None;
        self.state = CryptoState::Unencrypted;
    }

    /// Fails once an offer has gone unanswered for longer than `timeout`.
    pub fn check_deadline(&self, now: Instant, timeout: Duration) -> Result<()> {
        match self.pending_since {
            Some(since) if now.saturating_duration_since(since) > timeout => {
                Err(AdminError::HandshakeTimeout)
            }
            _ => Ok(()),
        }
    }

    /// Time left before the pending offer expires, if one is outstanding.
    pub fn deadline_remaining(&self, now: Instant, timeout: Duration) -> Option<Duration> {
        self.pending_since
            .map(|since| timeout.saturating_sub(now.saturating_duration_since(since)))
    }

    fn material_for(&mut self, epoch: u8) -> Option<&mut KeyMaterial> {
        [&mut self.active, &mut self.pending, &mut self.retired]
            .into_iter()
            .flatten()
            .find(|m| m.epoch() == epoch)
    }

    /// Recover the records carried by an inbound frame.
    ///
    /// Plaintext is accepted only until a key is active; sealed frames must name a live
    /// epoch and authenticate under it. A sealed frame before any key was offered is
    /// malformed, not forged.
    pub fn open(&mut self, frame: &[u8]) -> Result<OpenedFrame> {
        match Envelope::parse(frame)? {
            Envelope::Plain(records) => {
                if self.active.is_some() {
                    warn!("plaintext frame on encrypted session");
                    return Err(AdminError::Authentication);
                }
                Ok(OpenedFrame {
                    epoch: None,
                    records: records.to_vec(),
                })
            }
            Envelope::Sealed { .. } if self.active.is_none() && self.pending.is_none() => {
                Err(AdminError::Framing(constants::ERR_SEALED_UNENCRYPTED))
            }
            Envelope::Sealed {
                epoch,
                counter,
                ciphertext,
            } => {
                let records = self
                    .material_for(epoch)
                    .ok_or(AdminError::Authentication)?
                    .open(counter, ciphertext)?;
                Ok(OpenedFrame {
                    epoch: Some(epoch),
                    records,
                })
            }
        }
    }

    /// Wrap outbound records into a frame, sealed under the active key if there is one.
    pub fn seal(&mut self, records: &[u8]) -> Result<Vec<u8>> {
        match self.active.as_mut() {
            Some(material) => material.seal(Role::Daemon, records),
            None => Ok(Envelope::plain(records)),
        }
    }
}
