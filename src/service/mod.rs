//! # Service Layer
//!
//! The async driver for sessions and the collaborators the core calls out to.
//!
//! ## Components
//! - **SessionWorker**: one per game-server connection; framing, deadlines, dispatch
//! - **IdentityStore**: resolves and creates persisted player identities
//! - **EventLog**: fire-and-forget audit trail
//!
//! Accepting connections is left to the embedding application:
//!
//! ```rust,no_run
//! use q2admind::config::DaemonConfig;
//! use q2admind::context::AdminContext;
//! use q2admind::service::serve_connection;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> q2admind::error::Result<()> {
//! let config = DaemonConfig::from_file("q2admind.toml")?;
//! let ctx = Arc::new(AdminContext::standalone(&config));
//! let listener = TcpListener::bind("0.0.0.0:9988").await?;
//! loop {
//!     let (stream, addr) = listener.accept().await?;
//!     let ctx = Arc::clone(&ctx);
//!     tokio::spawn(async move { serve_connection(stream, ctx, &addr.to_string()).await });
//! }
//! # }
//! ```

pub mod events;
pub mod identity;
pub mod worker;

pub use events::{EventKind, EventLog, MemoryEventLog, RecordedEvent, TracingEventLog};
pub use identity::{IdentityStore, MemoryIdentityStore};
pub use worker::{serve_connection, SessionWorker};
