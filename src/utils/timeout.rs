//! Deadlines used by the session worker.

use crate::error::{AdminError, Result};
use std::future::Future;
use std::time::Duration;

/// How long a peer has to answer a key exchange
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a session may stay silent; game servers ping far more often than this
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(180);

/// Await `fut`, mapping an elapsed deadline to `on_timeout`.
pub async fn with_timeout<F, T>(fut: F, limit: Duration, on_timeout: AdminError) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout),
    }
}
