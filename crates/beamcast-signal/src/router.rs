//! Event routing against the shared [`SessionState`].
//!
//! [`Router::handle`] is the single serialized entry point: the caller
//! locks the Router, feeds it one [`SessionEvent`], and executes the
//! returned [`Outbound`] directives after releasing the lock. The Router
//! never blocks, never retries, and treats every relay payload as an
//! opaque blob.

use serde_json::Value;
use tracing::{debug, info};

use crate::ids::ConnectionId;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{Departure, SessionState};

/// One inbound event, as delivered by the transport.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The transport session opened.
    Connected,
    /// A decoded client frame.
    Message(ClientMessage),
    /// The transport session closed, for any reason. Fired exactly once.
    Disconnected,
}

/// A delivery directive for the transport layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    /// Deliver to one connection. Dropped silently if `to` is gone.
    Unicast {
        /// Recipient.
        to: ConnectionId,
        /// Frame to deliver.
        message: ServerMessage,
    },
    /// Deliver to every connection except `except`.
    BroadcastExcept {
        /// Excluded connection (usually the sender).
        except: ConnectionId,
        /// Frame to deliver.
        message: ServerMessage,
    },
    /// Deliver to every connection.
    Broadcast {
        /// Frame to deliver.
        message: ServerMessage,
    },
}

/// The connection registry and router.
///
/// Owns the process-wide [`SessionState`] and answers every inbound event
/// with the correct state mutation and the correct set of outbound
/// messages.
#[derive(Debug, Default)]
pub struct Router {
    state: SessionState,
}

impl Router {
    /// Router over empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the topology, for health reporting.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Process one event from `sender` and return the deliveries it causes.
    pub fn handle(&mut self, sender: &ConnectionId, event: SessionEvent) -> Vec<Outbound> {
        match event {
            SessionEvent::Connected => self.on_connected(sender),
            SessionEvent::Message(msg) => self.on_message(sender, msg),
            SessionEvent::Disconnected => self.on_departed(sender),
        }
    }

    fn on_connected(&self, sender: &ConnectionId) -> Vec<Outbound> {
        debug!(conn_id = %sender, "session opened");
        vec![Outbound::Unicast {
            to: sender.clone(),
            message: ServerMessage::ConnectionState {
                has_broadcaster: self.state.has_broadcaster(),
                viewer_count: self.state.viewer_count(),
            },
        }]
    }

    fn on_message(&mut self, sender: &ConnectionId, msg: ClientMessage) -> Vec<Outbound> {
        match msg {
            ClientMessage::Broadcaster => {
                self.state.set_broadcaster(sender.clone());
                info!(conn_id = %sender, "broadcaster registered");
                vec![Outbound::BroadcastExcept {
                    except: sender.clone(),
                    message: ServerMessage::Broadcaster,
                }]
            }
            ClientMessage::Watcher => match self.state.add_viewer(sender.clone()) {
                Some(broadcaster) => {
                    info!(
                        conn_id = %sender,
                        viewers = self.state.viewer_count(),
                        "viewer registered"
                    );
                    vec![Outbound::Unicast {
                        to: broadcaster,
                        message: ServerMessage::Watcher { id: sender.clone() },
                    }]
                }
                None => {
                    debug!(conn_id = %sender, "watch request with no broadcaster");
                    vec![Outbound::Unicast {
                        to: sender.clone(),
                        message: ServerMessage::NoBroadcasterAvailable,
                    }]
                }
            },
            ClientMessage::Offer { id, payload } => {
                Self::relay(sender, id, payload, ServerMessage::offer_from)
            }
            ClientMessage::Answer { id, payload } => {
                Self::relay(sender, id, payload, ServerMessage::answer_from)
            }
            ClientMessage::Candidate { id, payload } => {
                Self::relay(sender, id, payload, ServerMessage::candidate_from)
            }
            ClientMessage::BroadcasterDeparting => {
                // Only the current broadcaster may announce its departure;
                // anyone else is ignored.
                if self.state.broadcaster() == Some(sender) {
                    self.on_departed(sender)
                } else {
                    debug!(conn_id = %sender, "departure announcement from non-broadcaster ignored");
                    Vec::new()
                }
            }
        }
    }

    /// Pure relay: no state mutation, no role validation. The recipient is
    /// whoever the message names; the sender id replaces the target id so
    /// the recipient knows who to reply to.
    fn relay(
        sender: &ConnectionId,
        target: ConnectionId,
        payload: Value,
        build: fn(ConnectionId, Value) -> ServerMessage,
    ) -> Vec<Outbound> {
        debug!(from = %sender, to = %target, "relaying negotiation message");
        vec![Outbound::Unicast {
            to: target,
            message: build(sender.clone(), payload),
        }]
    }

    fn on_departed(&mut self, sender: &ConnectionId) -> Vec<Outbound> {
        match self.state.peer_departed(sender) {
            Departure::Broadcaster => {
                info!(conn_id = %sender, "broadcaster departed, viewers cleared");
                vec![Outbound::Broadcast {
                    message: ServerMessage::BroadcasterDisconnected,
                }]
            }
            Departure::Viewer(Some(broadcaster)) => {
                info!(
                    conn_id = %sender,
                    viewers = self.state.viewer_count(),
                    "viewer departed"
                );
                vec![Outbound::Unicast {
                    to: broadcaster,
                    message: ServerMessage::DisconnectPeer { id: sender.clone() },
                }]
            }
            Departure::Viewer(None) | Departure::None => {
                debug!(conn_id = %sender, "session closed with no role");
                Vec::new()
            }
        }
    }
}

impl ServerMessage {
    fn offer_from(id: ConnectionId, payload: Value) -> Self {
        Self::Offer { id, payload }
    }

    fn answer_from(id: ConnectionId, payload: Value) -> Self {
        Self::Answer { id, payload }
    }

    fn candidate_from(id: ConnectionId, payload: Value) -> Self {
        Self::Candidate { id, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    fn announce(router: &mut Router, who: &str, msg: ClientMessage) -> Vec<Outbound> {
        router.handle(&id(who), SessionEvent::Message(msg))
    }

    #[test]
    fn connect_reports_empty_state() {
        let mut router = Router::new();
        let out = router.handle(&id("a"), SessionEvent::Connected);
        assert_eq!(
            out,
            vec![Outbound::Unicast {
                to: id("a"),
                message: ServerMessage::ConnectionState {
                    has_broadcaster: false,
                    viewer_count: 0,
                },
            }]
        );
    }

    #[test]
    fn connect_reports_live_topology() {
        let mut router = Router::new();
        let _ = announce(&mut router, "a", ClientMessage::Broadcaster);
        let _ = announce(&mut router, "v1", ClientMessage::Watcher);
        let _ = announce(&mut router, "v2", ClientMessage::Watcher);

        let out = router.handle(&id("c"), SessionEvent::Connected);
        assert_eq!(
            out,
            vec![Outbound::Unicast {
                to: id("c"),
                message: ServerMessage::ConnectionState {
                    has_broadcaster: true,
                    viewer_count: 2,
                },
            }]
        );
    }

    #[test]
    fn broadcaster_announcement_broadcasts_to_others() {
        let mut router = Router::new();
        let out = announce(&mut router, "a", ClientMessage::Broadcaster);
        assert_eq!(
            out,
            vec![Outbound::BroadcastExcept {
                except: id("a"),
                message: ServerMessage::Broadcaster,
            }]
        );
        assert_eq!(router.state().broadcaster(), Some(&id("a")));
    }

    #[test]
    fn watcher_without_broadcaster_gets_negative_ack() {
        let mut router = Router::new();
        let out = announce(&mut router, "c", ClientMessage::Watcher);
        assert_eq!(
            out,
            vec![Outbound::Unicast {
                to: id("c"),
                message: ServerMessage::NoBroadcasterAvailable,
            }]
        );
        assert_eq!(router.state().viewer_count(), 0);
        assert!(!router.state().has_broadcaster());
    }

    #[test]
    fn watcher_with_broadcaster_notifies_broadcaster() {
        let mut router = Router::new();
        let _ = announce(&mut router, "a", ClientMessage::Broadcaster);
        let out = announce(&mut router, "b", ClientMessage::Watcher);
        assert_eq!(
            out,
            vec![Outbound::Unicast {
                to: id("a"),
                message: ServerMessage::Watcher { id: id("b") },
            }]
        );
        assert!(router.state().is_viewer(&id("b")));
    }

    #[test]
    fn offer_is_relayed_with_sender_substituted() {
        let mut router = Router::new();
        let payload = json!({"sdp": "v=0", "type": "offer"});
        let out = announce(
            &mut router,
            "a",
            ClientMessage::Offer {
                id: id("b"),
                payload: payload.clone(),
            },
        );
        assert_eq!(
            out,
            vec![Outbound::Unicast {
                to: id("b"),
                message: ServerMessage::Offer {
                    id: id("a"),
                    payload,
                },
            }]
        );
    }

    #[test]
    fn answer_and_candidate_relay_preserve_payload() {
        let mut router = Router::new();
        let sdp = json!({"sdp": "v=0\r\nm=video"});
        let ice = json!({"candidate": "candidate:1 1 UDP 2122252543"});

        let out = announce(
            &mut router,
            "b",
            ClientMessage::Answer {
                id: id("a"),
                payload: sdp.clone(),
            },
        );
        assert_eq!(
            out,
            vec![Outbound::Unicast {
                to: id("a"),
                message: ServerMessage::Answer {
                    id: id("b"),
                    payload: sdp,
                },
            }]
        );

        let out = announce(
            &mut router,
            "b",
            ClientMessage::Candidate {
                id: id("a"),
                payload: ice.clone(),
            },
        );
        assert_eq!(
            out,
            vec![Outbound::Unicast {
                to: id("a"),
                message: ServerMessage::Candidate {
                    id: id("b"),
                    payload: ice,
                },
            }]
        );
    }

    #[test]
    fn relay_does_not_mutate_state() {
        let mut router = Router::new();
        let _ = announce(&mut router, "a", ClientMessage::Broadcaster);
        let before = router.state().clone();
        let _ = announce(
            &mut router,
            "a",
            ClientMessage::Offer {
                id: id("ghost"),
                payload: json!({}),
            },
        );
        assert_eq!(router.state(), &before);
    }

    #[test]
    fn broadcaster_disconnect_clears_and_broadcasts() {
        let mut router = Router::new();
        let _ = announce(&mut router, "a", ClientMessage::Broadcaster);
        let _ = announce(&mut router, "v", ClientMessage::Watcher);

        let out = router.handle(&id("a"), SessionEvent::Disconnected);
        assert_eq!(
            out,
            vec![Outbound::Broadcast {
                message: ServerMessage::BroadcasterDisconnected,
            }]
        );
        assert!(!router.state().has_broadcaster());
        assert_eq!(router.state().viewer_count(), 0);
    }

    #[test]
    fn viewer_disconnect_notifies_broadcaster_only() {
        let mut router = Router::new();
        let _ = announce(&mut router, "a", ClientMessage::Broadcaster);
        let _ = announce(&mut router, "v", ClientMessage::Watcher);

        let out = router.handle(&id("v"), SessionEvent::Disconnected);
        assert_eq!(
            out,
            vec![Outbound::Unicast {
                to: id("a"),
                message: ServerMessage::DisconnectPeer { id: id("v") },
            }]
        );
        assert!(router.state().has_broadcaster());
    }

    #[test]
    fn unknown_disconnect_is_silent() {
        let mut router = Router::new();
        let _ = announce(&mut router, "a", ClientMessage::Broadcaster);
        let out = router.handle(&id("stranger"), SessionEvent::Disconnected);
        assert!(out.is_empty());
    }

    #[test]
    fn explicit_departure_equals_disconnect() {
        let mut router = Router::new();
        let _ = announce(&mut router, "a", ClientMessage::Broadcaster);
        let _ = announce(&mut router, "v", ClientMessage::Watcher);

        let out = announce(&mut router, "a", ClientMessage::BroadcasterDeparting);
        assert_eq!(
            out,
            vec![Outbound::Broadcast {
                message: ServerMessage::BroadcasterDisconnected,
            }]
        );
        assert!(!router.state().has_broadcaster());
        assert_eq!(router.state().viewer_count(), 0);

        // The later transport-level disconnect for the same socket finds
        // nothing to clean up.
        let out = router.handle(&id("a"), SessionEvent::Disconnected);
        assert!(out.is_empty());
    }

    #[test]
    fn departure_announcement_from_viewer_is_ignored() {
        let mut router = Router::new();
        let _ = announce(&mut router, "a", ClientMessage::Broadcaster);
        let _ = announce(&mut router, "v", ClientMessage::Watcher);

        let out = announce(&mut router, "v", ClientMessage::BroadcasterDeparting);
        assert!(out.is_empty());
        assert_eq!(router.state().broadcaster(), Some(&id("a")));
        assert!(router.state().is_viewer(&id("v")));
    }

    #[test]
    fn reannouncement_takes_over_broadcast_role() {
        let mut router = Router::new();
        let _ = announce(&mut router, "a", ClientMessage::Broadcaster);
        let out = announce(&mut router, "b", ClientMessage::Broadcaster);
        assert_eq!(
            out,
            vec![Outbound::BroadcastExcept {
                except: id("b"),
                message: ServerMessage::Broadcaster,
            }]
        );
        assert_eq!(router.state().broadcaster(), Some(&id("b")));

        // The replaced broadcaster's disconnect is now a no-op.
        let out = router.handle(&id("a"), SessionEvent::Disconnected);
        assert!(out.is_empty());
    }

    // Scenario from the protocol walkthrough: broadcast, watch, source
    // disconnect.
    #[test]
    fn full_lifecycle_scenario() {
        let mut router = Router::new();

        // A announces broadcaster.
        let _ = announce(&mut router, "A", ClientMessage::Broadcaster);
        assert_eq!(router.state().broadcaster(), Some(&id("A")));
        assert_eq!(router.state().viewer_count(), 0);

        // B announces watcher; A is told.
        let out = announce(&mut router, "B", ClientMessage::Watcher);
        assert_eq!(
            out,
            vec![Outbound::Unicast {
                to: id("A"),
                message: ServerMessage::Watcher { id: id("B") },
            }]
        );
        assert_eq!(router.state().viewer_count(), 1);

        // A disconnects; everyone remaining learns, state empties.
        let out = router.handle(&id("A"), SessionEvent::Disconnected);
        assert_eq!(
            out,
            vec![Outbound::Broadcast {
                message: ServerMessage::BroadcasterDisconnected,
            }]
        );
        assert!(!router.state().has_broadcaster());
        assert_eq!(router.state().viewer_count(), 0);
    }

    #[test]
    fn watch_before_broadcast_scenario() {
        let mut router = Router::new();
        let out = announce(&mut router, "C", ClientMessage::Watcher);
        assert_eq!(
            out,
            vec![Outbound::Unicast {
                to: id("C"),
                message: ServerMessage::NoBroadcasterAvailable,
            }]
        );
        assert!(!router.state().has_broadcaster());
        assert_eq!(router.state().viewer_count(), 0);
    }
}
