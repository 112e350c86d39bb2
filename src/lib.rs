//! # q2admind
//!
//! Core of a central administration daemon for Quake 2 game servers. Each game server
//! running the admin mod keeps one long-lived control session with the daemon; the
//! daemon tracks its players and sends admin commands back.
//!
//! ## Layers
//! - [`core`]: message buffer, wire vocabulary, transport framing
//! - [`protocol`]: greeting, session key exchange and rotation, inbound dispatch
//! - [`session`]: per-server state and the slot-indexed player registry
//! - [`policy`]: bans, teleport, mute and kick
//! - [`context`]: state shared by every session
//! - [`service`]: async session worker and external collaborators
//!
//! ## Example
//! ```rust
//! use q2admind::config::{DaemonConfig, ServerEntry};
//! use q2admind::context::AdminContext;
//! use q2admind::core::{MessageBuffer, ServerCommand};
//! use q2admind::protocol::Hello;
//! use q2admind::session::Session;
//! use q2admind::utils::crypto::Envelope;
//! use std::sync::Arc;
//!
//! let config = DaemonConfig::default_with_overrides(|c| {
//!     c.servers.push(ServerEntry::new(1, 1234, "dm", "10.0.0.1", 27910));
//! });
//! let ctx = Arc::new(AdminContext::standalone(&config));
//! let hello = Hello { key: 1234, version: 1, port: 27910, encrypted: false, max_players: 16 };
//! let mut session = Session::open(ctx, &hello)?;
//!
//! let mut msg = MessageBuffer::new();
//! msg.write_byte(ServerCommand::Map as u8);
//! msg.write_string("q2dm1");
//! session.receive(&Envelope::plain(msg.as_slice()))?;
//! assert_eq!(session.current_map(), "q2dm1");
//! # Ok::<(), q2admind::error::AdminError>(())
//! ```

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod policy;
pub mod protocol;
pub mod service;
pub mod session;
pub mod utils;

pub use config::DaemonConfig;
pub use context::AdminContext;
pub use error::{AdminError, Result};
pub use session::Session;
