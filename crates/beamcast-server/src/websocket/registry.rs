//! Connection map and delivery of router directives.

use std::collections::HashMap;
use std::sync::Arc;

use beamcast_signal::{ConnectionId, Outbound, ServerMessage};
use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::{RELAY_DROPS_TOTAL, SEND_DROPS_TOTAL};

/// All currently connected clients, indexed by connection identity.
///
/// Implements the transport's addressed-delivery primitives: unicast by
/// identity, broadcast to all, broadcast to all except the sender. An
/// unknown unicast target is a logged no-op — relay messages to departed
/// peers are dropped, never errors.
pub struct ConnectionMap {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by identity.
    pub async fn remove(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Number of active connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no clients are connected.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Execute a batch of router directives.
    pub async fn deliver(&self, directives: Vec<Outbound>) {
        for directive in directives {
            match directive {
                Outbound::Unicast { to, message } => self.unicast(&to, &message).await,
                Outbound::BroadcastExcept { except, message } => {
                    self.broadcast_except(&except, &message).await;
                }
                Outbound::Broadcast { message } => self.broadcast_all(&message).await,
            }
        }
    }

    /// Deliver one frame to one connection; drop silently if it is gone.
    pub async fn unicast(&self, to: &ConnectionId, message: &ServerMessage) {
        let conns = self.connections.read().await;
        let Some(conn) = conns.get(to) else {
            debug!(target = %to, kind = message.kind(), "unicast target gone, dropping");
            counter!(RELAY_DROPS_TOTAL).increment(1);
            return;
        };
        if !conn.send_message(message) {
            warn!(conn_id = %to, kind = message.kind(), "failed to enqueue frame");
            counter!(SEND_DROPS_TOTAL).increment(1);
        }
    }

    /// Deliver one frame to every connection except `except`.
    pub async fn broadcast_except(&self, except: &ConnectionId, message: &ServerMessage) {
        let Ok(json) = serde_json::to_string(message) else {
            warn!(kind = message.kind(), "failed to serialize frame");
            return;
        };
        let conns = self.connections.read().await;
        debug!(
            kind = message.kind(),
            recipients = conns.len().saturating_sub(1),
            "broadcast (except sender)"
        );
        for conn in conns.values() {
            if &conn.id != except && !conn.send(json.clone()) {
                warn!(conn_id = %conn.id, "failed to enqueue broadcast frame");
                counter!(SEND_DROPS_TOTAL).increment(1);
            }
        }
    }

    /// Deliver one frame to every connection.
    pub async fn broadcast_all(&self, message: &ServerMessage) {
        let Ok(json) = serde_json::to_string(message) else {
            warn!(kind = message.kind(), "failed to serialize frame");
            return;
        };
        let conns = self.connections.read().await;
        debug!(kind = message.kind(), recipients = conns.len(), "broadcast");
        for conn in conns.values() {
            if !conn.send(json.clone()) {
                warn!(conn_id = %conn.id, "failed to enqueue broadcast frame");
                counter!(SEND_DROPS_TOTAL).increment(1);
            }
        }
    }
}

impl Default for ConnectionMap {
    fn default() -> Self {
        Self::new()
    }
}
