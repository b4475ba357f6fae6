//! JSON wire format exchanged with signaling clients.
//!
//! Every frame is a JSON object tagged by `"type"`. SDP and ICE payloads
//! are carried as opaque [`serde_json::Value`]s — the relay never inspects
//! them. Relay frames reuse one `id` field: inbound it names the target,
//! outbound the server substitutes the sender so the recipient knows who
//! to reply to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SignalError;
use crate::ids::ConnectionId;

/// Inbound frame (client → server).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Announce this connection as the broadcaster.
    #[serde(rename = "broadcaster")]
    Broadcaster,
    /// Request to watch the current broadcast.
    #[serde(rename = "watcher")]
    Watcher,
    /// Relay an SDP offer to `id`.
    #[serde(rename = "offer")]
    Offer {
        /// Target connection.
        id: ConnectionId,
        /// Opaque SDP blob, forwarded unmodified.
        payload: Value,
    },
    /// Relay an SDP answer to `id`.
    #[serde(rename = "answer")]
    Answer {
        /// Target connection.
        id: ConnectionId,
        /// Opaque SDP blob, forwarded unmodified.
        payload: Value,
    },
    /// Relay an ICE candidate to `id`.
    #[serde(rename = "candidate")]
    Candidate {
        /// Target connection.
        id: ConnectionId,
        /// Opaque ICE candidate blob, forwarded unmodified.
        payload: Value,
    },
    /// Explicit departure announcement from the broadcaster.
    ///
    /// Honored only when the sender currently is the broadcaster; feeds the
    /// same lifecycle transition as a transport-level disconnect.
    #[serde(rename = "broadcaster-disconnected")]
    BroadcasterDeparting,
}

impl ClientMessage {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, SignalError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire name of this frame (the `"type"` tag).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Broadcaster => "broadcaster",
            Self::Watcher => "watcher",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::BroadcasterDeparting => "broadcaster-disconnected",
        }
    }
}

/// Outbound frame (server → client).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Sent once to every newly opened session.
    #[serde(rename = "connection-state", rename_all = "camelCase")]
    ConnectionState {
        /// Whether a broadcaster is currently registered.
        has_broadcaster: bool,
        /// Number of registered viewers.
        viewer_count: usize,
    },
    /// A broadcaster announced itself; sent to all other sessions.
    #[serde(rename = "broadcaster")]
    Broadcaster,
    /// Terminal negative ack for a `watcher` request with no broadcaster.
    #[serde(rename = "no-broadcaster-available")]
    NoBroadcasterAvailable,
    /// A viewer registered; sent to the broadcaster.
    #[serde(rename = "watcher")]
    Watcher {
        /// The new viewer.
        id: ConnectionId,
    },
    /// Relayed SDP offer; `id` is the sender.
    #[serde(rename = "offer")]
    Offer {
        /// Originating connection.
        id: ConnectionId,
        /// Opaque SDP blob, unmodified.
        payload: Value,
    },
    /// Relayed SDP answer; `id` is the sender.
    #[serde(rename = "answer")]
    Answer {
        /// Originating connection.
        id: ConnectionId,
        /// Opaque SDP blob, unmodified.
        payload: Value,
    },
    /// Relayed ICE candidate; `id` is the sender.
    #[serde(rename = "candidate")]
    Candidate {
        /// Originating connection.
        id: ConnectionId,
        /// Opaque ICE candidate blob, unmodified.
        payload: Value,
    },
    /// A viewer left; sent to the broadcaster.
    #[serde(rename = "disconnectPeer")]
    DisconnectPeer {
        /// The departed viewer.
        id: ConnectionId,
    },
    /// The broadcaster left; sent to all remaining sessions.
    #[serde(rename = "broadcaster-disconnected")]
    BroadcasterDisconnected,
}

impl ServerMessage {
    /// Wire name of this frame (the `"type"` tag).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionState { .. } => "connection-state",
            Self::Broadcaster => "broadcaster",
            Self::NoBroadcasterAvailable => "no-broadcaster-available",
            Self::Watcher { .. } => "watcher",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::DisconnectPeer { .. } => "disconnectPeer",
            Self::BroadcasterDisconnected => "broadcaster-disconnected",
        }
    }
}
