use crate::context::AdminContext;
use crate::core::buffer::MessageBuffer;
use crate::core::codec::FrameCodec;
use crate::error::{AdminError, Result};
use crate::protocol::hello::{read_hello, write_error};
use crate::session::Session;
use crate::utils::crypto::Envelope;
use crate::utils::timeout::with_timeout;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

/// Drives one game-server connection from greeting to close.
///
/// The worker is the only owner of its [`Session`]; workers for different servers
/// share nothing but the [`AdminContext`].
pub struct SessionWorker<S> {
    framed: Framed<S, FrameCodec>,
    ctx: Arc<AdminContext>,
    peer: String,
}

impl<S> SessionWorker<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, ctx: Arc<AdminContext>) -> Self {
        let codec = FrameCodec::new(ctx.settings().max_frame_size);
        Self {
            framed: Framed::new(stream, codec),
            ctx,
            peer: String::from("unknown"),
        }
    }

    /// Label used in log output, usually the remote socket address.
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    /// Run until the server quits, the transport closes or a session-fatal error.
    ///
    /// A clean close by either side returns `Ok(())`.
    #[instrument(skip(self), fields(peer = %self.peer))]
    pub async fn run(mut self) -> Result<()> {
        let limit = self.ctx.settings().handshake_timeout;
        let frame = with_timeout(self.next_frame(), limit, AdminError::HandshakeTimeout)
            .await?
            .ok_or(AdminError::SessionClosed)?;

        let hello = read_hello(&frame)?;
        let mut session = match Session::open(Arc::clone(&self.ctx), &hello) {
            Ok(session) => session,
            Err(e) => {
                warn!(key = hello.key, error = %e, "refusing session");
                self.refuse(&e).await;
                return Err(e);
            }
        };

        let result = self.serve(&mut session).await;
        session.close();
        match &result {
            Ok(()) => info!(server = %session.name(), "worker finished"),
            Err(e) => error!(server = %session.name(), error = %e, "worker failed"),
        }
        result
    }

    async fn serve(&mut self, session: &mut Session) -> Result<()> {
        self.flush(session).await?;

        while session.is_connected() {
            let idle = self.ctx.settings().idle_timeout;
            let (limit, on_timeout) = match session.key_deadline(Instant::now()) {
                Some(remaining) if remaining <= idle => (remaining, AdminError::HandshakeTimeout),
                _ => (idle, AdminError::Timeout),
            };

            let Some(frame) = with_timeout(self.next_frame(), limit, on_timeout).await? else {
                debug!(server = %session.name(), "transport closed by peer");
                return Ok(());
            };

            match session.receive(&frame) {
                Ok(()) => {}
                // a fresh key offer is queued; the handshake deadline now applies
                Err(AdminError::Authentication) => {}
                Err(e) if e.is_session_fatal() => return Err(e),
                Err(e) => warn!(server = %session.name(), error = %e, "frame rejected"),
            }
            self.flush(session).await?;
        }
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<BytesMut>> {
        self.framed.next().await.transpose()
    }

    async fn flush(&mut self, session: &mut Session) -> Result<()> {
        if let Some(frame) = session.flush()? {
            self.framed.send(frame).await?;
        }
        Ok(())
    }

    /// Best effort: tell the server why it is being dropped.
    async fn refuse(&mut self, reason: &AdminError) {
        let mut out = MessageBuffer::new();
        write_error(&mut out, &reason.to_string());
        let frame = Bytes::from(Envelope::plain(out.as_slice()));
        if let Err(e) = self.framed.send(frame).await {
            debug!(error = %e, "could not deliver refusal");
        }
    }
}

/// Run a worker over `stream` to completion.
pub async fn serve_connection<S>(stream: S, ctx: Arc<AdminContext>, peer: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    SessionWorker::new(stream, ctx).with_peer(peer).run().await
}
