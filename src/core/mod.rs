//! # Core Wire Components
//!
//! Byte-level message handling shared by the inbound and outbound paths.
//!
//! ## Components
//! - **MessageBuffer**: cursor-addressed reads and append-only writes
//! - **Commands**: command bytes, sub-commands and print levels
//! - **Codec**: length-prefixed framing for the async session worker
//!
//! ## Wire Format
//! ```text
//! [Length(4)] [Envelope(N)]
//! Envelope = 0x00 [Records...] | 0x01 [Epoch(1)] [Counter(8)] [Sealed records...]
//! Record   = [Command(1)] [Payload...]
//! ```

pub mod buffer;
pub mod codec;
pub mod commands;

pub use buffer::MessageBuffer;
pub use codec::FrameCodec;
pub use commands::{AdminCommand, PlayerCommand, PrintLevel, ServerCommand};
