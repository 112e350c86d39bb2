//! # Session Protocol
//!
//! ## Components
//! - **Hello**: the plaintext greeting that opens a session
//! - **Handshake**: key offers, acknowledgement and scheduled rotation
//! - **Dispatcher**: the inbound command loop
//!
//! ## Session Flow
//! ```text
//! server                                daemon
//!   │── Hello(key, version, encrypted) ──→│
//!   │←──────── HelloAck [+ Key offer] ────│
//!   │── KeyAck (sealed, new epoch) ──────→│   Encrypted
//!   │── Ping ────────────────────────────→│
//!   │←──────────────────────────── Pong ──│   every 64th ping also carries a Key offer
//! ```

pub mod dispatcher;
pub mod handshake;
pub mod hello;


pub use dispatcher::dispatch;
pub use handshake::{rotation_due, CryptoState, KeyOffer, OpenedFrame, SessionCrypto, ROTATION_MASK};
pub use hello::{read_hello, Hello};
