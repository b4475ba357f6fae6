//! Heartbeat ping/pong liveness monitoring.
//!
//! The Router has no timeout concept of its own; a silent connection is
//! discovered here and torn down, which produces the one `disconnect`
//! lifecycle event the Router acts on.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The client stopped responding within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Run heartbeat monitoring for a connection.
///
/// At each `interval` tick the alive flag is checked. If the client has not
/// responded since the last tick the missed-pong counter increments. Once
/// `max_missed` consecutive misses are reached the connection is considered
/// dead and `HeartbeatResult::TimedOut` is returned.
///
/// `max_missed` is `ceil(timeout / interval)` (clamped to at least 1), so
/// the configured timeout is a lower bound on how long a silent client
/// survives.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval);
    // Skip the immediate first tick
    let _ = check_interval.tick().await;

    let mut missed_pongs: u32 = 0;
    let interval_millis = interval.as_millis().max(1);
    #[allow(clippy::cast_possible_truncation)]
    let max_missed = timeout.as_millis().div_ceil(interval_millis).max(1) as u32;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if connection.check_alive() {
                    missed_pongs = 0;
                } else {
                    missed_pongs += 1;
                    if missed_pongs >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
                // Stays not-alive until the next pong
                connection.is_alive.store(false, Ordering::Relaxed);
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}
