//! # Utility Modules
//!
//! Supporting code for cryptography, logging, metrics and timing.
//!
//! ## Components
//! - **Crypto**: ChaCha20-Poly1305 sealing, X25519 key wrapping, frame envelopes
//! - **Logging**: `tracing-subscriber` setup from configuration
//! - **Metrics**: atomic counters shared by all session workers
//! - **Time**: unix timestamps for player records
//! - **Timeout**: handshake and idle deadlines
//!
//! ## Security
//! - Key material comes from the OS RNG (getrandom / rand_core)
//! - Key material is zeroized on drop

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod time;
pub mod timeout;
