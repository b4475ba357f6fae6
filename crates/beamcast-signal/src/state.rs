//! Broadcaster/viewer topology state.
//!
//! One [`SessionState`] exists per process. It is owned by the
//! [`Router`](crate::router::Router) and mutated only inside the caller's
//! serialized region.
//!
//! Invariants:
//! - at most one broadcaster at any time
//! - a connection is never both the broadcaster and a viewer
//! - `viewers` is empty whenever `broadcaster` is `None`

use std::collections::HashSet;

use crate::ids::ConnectionId;

/// Who is broadcasting and who is watching.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    broadcaster: Option<ConnectionId>,
    viewers: HashSet<ConnectionId>,
}

/// Outcome of a departure transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Departure {
    /// The broadcaster left; all viewer registrations were dropped.
    Broadcaster,
    /// A viewer left. Carries the broadcaster to notify, if one exists.
    Viewer(Option<ConnectionId>),
    /// The identity was neither broadcaster nor viewer.
    None,
}

impl SessionState {
    /// Empty state: no broadcaster, no viewers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current broadcaster, if any.
    #[must_use]
    pub fn broadcaster(&self) -> Option<&ConnectionId> {
        self.broadcaster.as_ref()
    }

    /// Whether a broadcaster is registered.
    #[must_use]
    pub fn has_broadcaster(&self) -> bool {
        self.broadcaster.is_some()
    }

    /// Number of registered viewers.
    #[must_use]
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Whether `id` is a registered viewer.
    #[must_use]
    pub fn is_viewer(&self, id: &ConnectionId) -> bool {
        self.viewers.contains(id)
    }

    /// Register `id` as the broadcaster.
    ///
    /// Idempotent: re-announcing reassigns. If `id` was a viewer it is
    /// removed first so the two roles stay disjoint.
    pub fn set_broadcaster(&mut self, id: ConnectionId) {
        let _ = self.viewers.remove(&id);
        self.broadcaster = Some(id);
    }

    /// Register `id` as a viewer.
    ///
    /// Returns the broadcaster to notify, or `None` without mutating when
    /// no broadcaster exists. A request from the broadcaster itself is also
    /// refused — the roles are disjoint.
    pub fn add_viewer(&mut self, id: ConnectionId) -> Option<ConnectionId> {
        let broadcaster = self.broadcaster.clone()?;
        if broadcaster == id {
            return None;
        }
        let _ = self.viewers.insert(id);
        Some(broadcaster)
    }

    /// Remove `id` from the topology, whichever role it held.
    ///
    /// This is the single departure transition, fed by both transport
    /// disconnects and the broadcaster's explicit departure announcement.
    /// When the broadcaster leaves, every viewer registration is dropped
    /// with it — derived peer sessions are unreachable without a source.
    pub fn peer_departed(&mut self, id: &ConnectionId) -> Departure {
        if self.broadcaster.as_ref() == Some(id) {
            self.broadcaster = None;
            self.viewers.clear();
            Departure::Broadcaster
        } else if self.viewers.remove(id) {
            Departure::Viewer(self.broadcaster.clone())
        } else {
            Departure::None
        }
    }
}
