//! # Session Cryptography Primitives
//!
//! - **Symmetric**: ChaCha20-Poly1305 over whole messages, one key + base nonce per epoch
//! - **Key wrapping**: ephemeral X25519 agreement with the game server's static public key,
//!   SHA-256 KDF, ChaCha20-Poly1305 seal of `key || nonce`
//! - **Envelope**: the flag byte that tells a receiver whether a frame is sealed
//!
//! Per-message nonces are the epoch's base nonce XOR a 64-bit counter carried in the clear.
//! The top counter bit is the sender's [`Role`], so the two directions never share a nonce
//! under the same key. Each key only accepts counters above the last one it opened.

use crate::error::{constants, AdminError, Result};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// `ephemeral_public || seal(key || nonce)`
pub const WRAPPED_LEN: usize = 32 + KEY_LEN + NONCE_LEN + TAG_LEN;

/// Envelope flag for plaintext frames
pub const FLAG_PLAIN: u8 = 0x00;
/// Envelope flag for sealed frames
pub const FLAG_SEALED: u8 = 0x01;
/// `flag || epoch || counter`
pub const SEALED_HEADER_LEN: usize = 1 + 1 + 8;

const WRAP_CONTEXT: &[u8] = b"q2admind key wrap v1";
const DIRECTION_BIT: u64 = 1 << 63;

/// Which end of the connection sealed a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Daemon,
    GameServer,
}

impl Role {
    fn counter_bit(self) -> u64 {
        match self {
            Role::Daemon => DIRECTION_BIT,
            Role::GameServer => 0,
        }
    }
}

/// Symmetric key, base nonce and counters for one key epoch.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    epoch: u8,
    key: [u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
    send_seq: u64,
    /// Highest counter opened so far
    recv_last: Option<u64>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("epoch", &self.epoch)
            .field("send_seq", &self.send_seq)
            .field("recv_last", &self.recv_last)
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Fresh random key and nonce for `epoch`.
    pub fn generate(epoch: u8) -> Result<Self> {
        let mut key = [0u8; KEY_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::fill(&mut key)
            .and_then(|_| getrandom::fill(&mut nonce))
            .map_err(|_| AdminError::Handshake(constants::ERR_RNG_FAILURE.into()))?;
        Ok(Self::from_parts(epoch, key, nonce))
    }

    pub fn from_parts(epoch: u8, key: [u8; KEY_LEN], nonce: [u8; NONCE_LEN]) -> Self {
        Self {
            epoch,
            key,
            nonce,
            send_seq: 0,
            recv_last: None,
        }
    }

    pub fn epoch(&self) -> u8 {
        self.epoch
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key))
    }

    fn message_nonce(&self, counter: u64) -> [u8; NONCE_LEN] {
        let mut nonce = self.nonce;
        for (n, c) in nonce[NONCE_LEN - 8..].iter_mut().zip(counter.to_be_bytes()) {
            *n ^= c;
        }
        nonce
    }

    /// Seal `plaintext` into a complete sealed envelope.
    pub fn seal(&mut self, role: Role, plaintext: &[u8]) -> Result<Vec<u8>> {
        let counter = self.send_seq | role.counter_bit();
        self.send_seq = self.send_seq.wrapping_add(1) & !DIRECTION_BIT;

        let aad = [FLAG_SEALED, self.epoch];
        let nonce = self.message_nonce(counter);
        let ciphertext = self
            .cipher()
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| AdminError::Authentication)?;

        let mut out = Vec::with_capacity(SEALED_HEADER_LEN + ciphertext.len());
        out.push(FLAG_SEALED);
        out.push(self.epoch);
        out.extend_from_slice(&counter.to_be_bytes());
        out.extend(ciphertext);
        Ok(out)
    }

    /// Open a sealed body that was produced under this epoch.
    ///
    /// A counter at or below the last accepted one is a replay and fails like a bad tag.
    pub fn open(&mut self, counter: u64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if self.recv_last.is_some_and(|last| counter <= last) {
            return Err(AdminError::Authentication);
        }
        let aad = [FLAG_SEALED, self.epoch];
        let nonce = self.message_nonce(counter);
        let plaintext = self
            .cipher()
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| AdminError::Authentication)?;
        self.recv_last = Some(counter);
        Ok(plaintext)
    }
}

fn wrap_key(shared: &[u8], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> [u8; KEY_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(WRAP_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral);
    hasher.update(recipient);
    hasher.finalize().into()
}

/// Wrap `material` so only the holder of `server_public`'s secret can read it.
pub fn wrap_key_material(server_public: &[u8; 32], material: &KeyMaterial) -> Result<Vec<u8>> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&PublicKey::from(*server_public));

    let mut kek = wrap_key(shared.as_bytes(), &ephemeral_public, server_public);
    let mut plain = [0u8; KEY_LEN + NONCE_LEN];
    plain[..KEY_LEN].copy_from_slice(&material.key);
    plain[KEY_LEN..].copy_from_slice(&material.nonce);

    // the KEK is single-use, so a fixed nonce is sound here
    let sealed = ChaCha20Poly1305::new(Key::from_slice(&kek)).encrypt(
        Nonce::from_slice(&[0u8; NONCE_LEN]),
        Payload {
            msg: &plain,
            aad: &[material.epoch],
        },
    );
    kek.zeroize();
    plain.zeroize();

    let sealed = sealed.map_err(|_| AdminError::Handshake(constants::ERR_UNWRAP_FAILED.into()))?;
    let mut blob = Vec::with_capacity(WRAPPED_LEN);
    blob.extend_from_slice(&ephemeral_public);
    blob.extend(sealed);
    Ok(blob)
}

/// Recover key material from a wrapped blob. This is the game server's half of the exchange.
pub fn unwrap_key_material(secret: &StaticSecret, epoch: u8, blob: &[u8]) -> Result<KeyMaterial> {
    if blob.len() != WRAPPED_LEN {
        return Err(AdminError::Handshake(constants::ERR_BAD_WRAPPED_KEY.into()));
    }
    let mut ephemeral_public = [0u8; 32];
    ephemeral_public.copy_from_slice(&blob[..32]);
    let own_public = PublicKey::from(secret).to_bytes();
    let shared = secret.diffie_hellman(&PublicKey::from(ephemeral_public));

    let mut kek = wrap_key(shared.as_bytes(), &ephemeral_public, &own_public);
    let plain = ChaCha20Poly1305::new(Key::from_slice(&kek)).decrypt(
        Nonce::from_slice(&[0u8; NONCE_LEN]),
        Payload {
            msg: &blob[32..],
            aad: &[epoch],
        },
    );
    kek.zeroize();

    let mut plain = plain.map_err(|_| AdminError::Authentication)?;
    let mut key = [0u8; KEY_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    key.copy_from_slice(&plain[..KEY_LEN]);
    nonce.copy_from_slice(&plain[KEY_LEN..]);
    plain.zeroize();
    Ok(KeyMaterial::from_parts(epoch, key, nonce))
}

/// Parse a hex-encoded 32-byte X25519 public key.
pub fn parse_public_key(text: &str) -> Result<[u8; 32]> {
    let mut key = [0u8; 32];
    hex::decode_to_slice(text.trim(), &mut key)
        .map_err(|_| AdminError::Config(constants::ERR_BAD_PUBLIC_KEY.into()))?;
    Ok(key)
}

/// A received frame, before decryption.
#[derive(Debug, PartialEq, Eq)]
pub enum Envelope<'a> {
    Plain(&'a [u8]),
    Sealed {
        epoch: u8,
        counter: u64,
        ciphertext: &'a [u8],
    },
}

impl<'a> Envelope<'a> {
    pub fn parse(frame: &'a [u8]) -> Result<Self> {
        match frame.first() {
            None => Err(AdminError::Framing(constants::ERR_EMPTY_ENVELOPE)),
            Some(&FLAG_PLAIN) => Ok(Envelope::Plain(&frame[1..])),
            Some(&FLAG_SEALED) => {
                if frame.len() < SEALED_HEADER_LEN + TAG_LEN {
                    return Err(AdminError::Framing(constants::ERR_SHORT_ENVELOPE));
                }
                let mut counter = [0u8; 8];
                counter.copy_from_slice(&frame[2..SEALED_HEADER_LEN]);
                Ok(Envelope::Sealed {
                    epoch: frame[1],
                    counter: u64::from_be_bytes(counter),
                    ciphertext: &frame[SEALED_HEADER_LEN..],
                })
            }
            Some(_) => Err(AdminError::Framing(constants::ERR_UNKNOWN_ENVELOPE)),
        }
    }

    /// Build a plaintext envelope around `records`.
    pub fn plain(records: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + records.len());
        out.push(FLAG_PLAIN);
        out.extend_from_slice(records);
        out
    }
}
