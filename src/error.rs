//! # Error Types
//!
//! Error handling for the administration daemon core.
//!
//! Errors fall into two groups, and callers are expected to treat them differently:
//!
//! ## Recovered locally
//! - **Framing**: truncated or malformed message, the rest of the message is dropped
//! - **Slot range / slot occupied**: registry operation ignored, warning logged
//! - **Unknown destination**: the requesting player gets an in-band notice
//! - **Store**: identity lookup failed, the player stays unresolved
//!
//! ## Session-fatal
//! - **Authentication**: decrypt/verify failure, the session must re-handshake
//! - **Handshake timeout**: the peer never acknowledged key material
//! - **Idle timeout**: nothing heard from the game server for too long
//! - **Session closed / I/O**: the transport is gone
//!
//! ## Example Usage
//! ```rust
//! use q2admind::error::{AdminError, Result};
//! use tracing::warn;
//!
//! fn slot_checked(slot: usize, capacity: usize) -> Result<usize> {
//!     if slot >= capacity {
//!         return Err(AdminError::SlotRange(slot));
//!     }
//!     Ok(slot)
//! }
//!
//! if let Err(e) = slot_checked(40, 32) {
//!     if !e.is_session_fatal() {
//!         warn!(error = %e, "ignoring operation");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framing errors
    pub const ERR_READ_PAST_END: &str = "read past end of message";
    pub const ERR_UNTERMINATED_STRING: &str = "string is missing its terminator";
    pub const ERR_EMPTY_ENVELOPE: &str = "empty envelope";
    pub const ERR_SHORT_ENVELOPE: &str = "sealed envelope shorter than its header";
    pub const ERR_UNKNOWN_ENVELOPE: &str = "unknown envelope flag";
    pub const ERR_BLOB_TOO_LARGE: &str = "binary blob exceeds u16 length prefix";
    pub const ERR_SEALED_UNENCRYPTED: &str = "sealed envelope on a session without keys";

    /// Handshake errors
    pub const ERR_EXPECTED_HELLO: &str = "first message must be a hello";
    pub const ERR_BAD_PUBLIC_KEY: &str = "server public key is not 32 bytes of hex";
    pub const ERR_BAD_WRAPPED_KEY: &str = "wrapped key blob has the wrong length";
    pub const ERR_UNWRAP_FAILED: &str = "unable to unwrap key material";
    pub const ERR_NO_PENDING_KEY: &str = "key acknowledgement without pending key material";
    pub const ERR_NO_PUBLIC_KEY: &str = "encryption requested but server has no public key";
    pub const ERR_RNG_FAILURE: &str = "system random number generator failed";

    /// Synchronization errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";
}

/// Primary error type for every operation in the daemon core.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Framing error: {0}")]
    Framing(&'static str),

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Authentication failed")]
    Authentication,

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Session idle for too long")]
    Timeout,

    #[error("Player slot {0} out of range")]
    SlotRange(usize),

    #[error("Player slot {0} already occupied")]
    SlotOccupied(usize),

    #[error("Unknown destination: {0}")]
    UnknownDestination(String),

    #[error("Unknown or disabled server key: {0}")]
    UnknownServer(i32),

    #[error("Unexpected message")]
    UnexpectedMessage,

    #[error("Session closed")]
    SessionClosed,

    #[error("Identity store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,
}

impl AdminError {
    /// Whether the error ends the session that raised it.
    ///
    /// Parsing and registry errors are recovered by the dispatcher; cryptographic,
    /// handshake and transport errors are not.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            AdminError::Authentication
                | AdminError::HandshakeTimeout
                | AdminError::Timeout
                | AdminError::Handshake(_)
                | AdminError::SessionClosed
                | AdminError::UnknownServer(_)
                | AdminError::Io(_)
        )
    }
}

/// Type alias for Results using AdminError
pub type Result<T> = std::result::Result<T, AdminError>;
