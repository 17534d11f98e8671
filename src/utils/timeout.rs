//! Deadlines used by the connection lifecycle.
//!
//! Two kinds of bound exist: a rolling per-read deadline, whose expiry is not an
//! error, and absolute ceilings whose expiry fails the enclosing operation.

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;

/// Rolling deadline re-armed before every socket read
pub const READ_DEADLINE: Duration = Duration::from_secs(5);

/// Absolute ceiling for the verification handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Run `future` with a rolling deadline.
///
/// Returns `None` when the deadline passes first. Callers treat that as
/// "nothing arrived yet" and simply retry.
pub async fn within<F>(future: F, deadline: Duration) -> Option<F::Output>
where
    F: Future,
{
    tokio::time::timeout(deadline, future).await.ok()
}

/// Run a fallible `future` under an absolute ceiling, failing with `on_elapsed`
/// if the ceiling is reached.
pub async fn with_timeout_error<F, T>(
    future: F,
    ceiling: Duration,
    on_elapsed: ProtocolError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(ceiling, future).await {
        Ok(result) => result,
        Err(_) => Err(on_elapsed),
    }
}
