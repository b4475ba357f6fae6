//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.
//!
//! Every inbound frame is decoded and pushed through the Router inside its
//! mutex (the serialized region); the resulting directives are delivered
//! after the lock is released. Whatever ends the session — close frame,
//! transport error, malformed frame, heartbeat timeout, server shutdown —
//! the disconnect transition runs exactly once.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use beamcast_signal::{ClientMessage, ConnectionId, Router, SessionEvent};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::registry::ConnectionMap;
use crate::metrics::{
    HEARTBEAT_TIMEOUTS_TOTAL, SIGNAL_EVENTS_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};

/// Outbound send channel depth per connection.
const SEND_BUFFER: usize = 256;

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection and reports the current topology to it
/// 2. Dispatches incoming frames through the Router
/// 3. Forwards outbound frames and periodic Ping frames
/// 4. Tears down on close, error, heartbeat timeout, or shutdown
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    router: Arc<Mutex<Router>>,
    connections: Arc<ConnectionMap>,
    ping_interval: Duration,
    ping_timeout: Duration,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<String>(SEND_BUFFER);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Register before the greeting so the connection-state unicast can find
    // its own recipient.
    connections.add(connection.clone()).await;
    let directives = { router.lock().handle(&conn_id, SessionEvent::Connected) };
    connections.deliver(directives).await;

    let cancel = shutdown.child_token();

    // Outbound forwarder with periodic Ping frames.
    let outbound_cancel = cancel.clone();
    let outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Liveness monitor: a silent client becomes a disconnect.
    let hb_connection = connection.clone();
    let hb_cancel = cancel.clone();
    let heartbeat = tokio::spawn(async move {
        let result =
            run_heartbeat(hb_connection, ping_interval, ping_timeout, hb_cancel.clone()).await;
        if result == HeartbeatResult::TimedOut {
            warn!("client unresponsive past ping timeout, disconnecting");
            counter!(HEARTBEAT_TIMEOUTS_TOTAL).increment(1);
            hb_cancel.cancel();
        }
    });

    // Inbound loop. Any exit path falls through to the single teardown.
    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                let Some(Ok(msg)) = frame else {
                    // Stream end or transport error: implicit disconnect.
                    debug!("websocket stream ended");
                    break;
                };
                match msg {
                    Message::Text(text) => {
                        connection.mark_alive();
                        let client_msg = match ClientMessage::parse(text.as_str()) {
                            Ok(m) => m,
                            Err(e) => {
                                // Malformed payloads are a transport fault,
                                // surfaced as a disconnect for this session.
                                warn!(error = %e, "malformed frame, closing session");
                                break;
                            }
                        };
                        counter!(SIGNAL_EVENTS_TOTAL, "event" => client_msg.kind()).increment(1);
                        let directives = {
                            router.lock().handle(&conn_id, SessionEvent::Message(client_msg))
                        };
                        connections.deliver(directives).await;
                    }
                    Message::Binary(_) => {
                        warn!("unexpected binary frame, closing session");
                        break;
                    }
                    Message::Close(_) => {
                        debug!("client sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {
                        connection.mark_alive();
                    }
                }
            }
            () = cancel.cancelled() => {
                debug!("session cancelled");
                break;
            }
        }
    }

    // Teardown. Remove from the map first so broadcasts reach only the
    // remaining connections, then run the lifecycle transition.
    info!(dropped = connection.drop_count(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());

    connections.remove(&conn_id).await;
    let directives = { router.lock().handle(&conn_id, SessionEvent::Disconnected) };
    connections.deliver(directives).await;

    cancel.cancel();
    let _ = heartbeat.await;
    outbound.abort();
}
