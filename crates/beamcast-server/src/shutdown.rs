//! Graceful shutdown: stop accepting, close every signaling session, and
//! wait for the connection map to drain.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::websocket::registry::ConnectionMap;

/// How long to wait for sessions to deregister before giving up.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval while waiting for the connection map to empty.
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Coordinates graceful shutdown of the listener and the signaling sessions.
///
/// Every session holds a child of this token. Cancelling it makes each
/// session send a Close frame, run its disconnect transition (so the
/// broadcaster/viewer topology empties with the usual notifications), and
/// remove itself from the [`ConnectionMap`].
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel every session and wait for the connection map to drain.
    ///
    /// Returns once every client has deregistered, or after `timeout` with
    /// stragglers still in the map.
    pub async fn drain(&self, connections: &ConnectionMap, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);

        self.shutdown();
        info!(
            connections = connections.len().await,
            timeout_secs = timeout.as_secs(),
            "closing signaling sessions"
        );

        let drained = tokio::time::timeout(timeout, async {
            while !connections.is_empty().await {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = connections.len().await,
                "session drain timed out after {timeout:?}"
            );
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::ClientConnection;
    use beamcast_signal::ConnectionId;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn make_connection(id: &str) -> Arc<ClientConnection> {
        let (tx, _rx) = mpsc::channel(32);
        Arc::new(ClientConnection::new(ConnectionId::from(id), tx))
    }

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
    }

    #[test]
    fn shutdown_sets_flag() {
        let coord = ShutdownCoordinator::new();
        coord.shutdown();
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn token_propagation() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        assert!(!token.is_cancelled());
        coord.shutdown();
        assert!(token.is_cancelled());
    }

    #[test]
    fn multiple_shutdown_calls_idempotent() {
        let coord = ShutdownCoordinator::new();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_waits_for_sessions_to_deregister() {
        let coord = ShutdownCoordinator::new();
        let connections = Arc::new(ConnectionMap::new());
        connections.add(make_connection("c1")).await;
        connections.add(make_connection("c2")).await;

        // Simulated session tasks: deregister when the token fires.
        for id in ["c1", "c2"] {
            let token = coord.token();
            let map = connections.clone();
            let conn_id = ConnectionId::from(id);
            let _ = tokio::spawn(async move {
                token.cancelled().await;
                map.remove(&conn_id).await;
            });
        }

        coord.drain(&connections, None).await;
        assert!(connections.is_empty().await);
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_times_out_on_stuck_session() {
        let coord = ShutdownCoordinator::new();
        let connections = ConnectionMap::new();
        // This connection never deregisters.
        connections.add(make_connection("stuck")).await;

        coord
            .drain(&connections, Some(Duration::from_millis(100)))
            .await;
        assert!(coord.is_shutting_down());
        assert_eq!(connections.len().await, 1);
    }

    #[tokio::test]
    async fn drain_with_no_sessions_returns_immediately() {
        let coord = ShutdownCoordinator::new();
        let connections = ConnectionMap::new();
        coord.drain(&connections, None).await;
        assert!(coord.is_shutting_down());
    }
}
