//! # beamcast-signal
//!
//! Transport-agnostic signaling relay core for a one-broadcaster,
//! many-viewers WebRTC topology.
//!
//! - [`Router`]: handles one inbound event at a time against the shared
//!   [`SessionState`] and returns the outbound directives the transport
//!   must execute
//! - [`SessionState`]: who is broadcasting, who is watching
//! - [`ClientMessage`] / [`ServerMessage`]: JSON wire format
//!
//! The crate performs no I/O and never suspends; serialization of access
//! (one event at a time) is the caller's responsibility.

#![deny(unsafe_code)]

pub mod error;
pub mod ids;
pub mod protocol;
pub mod router;
pub mod state;

pub use error::SignalError;
pub use ids::ConnectionId;
pub use protocol::{ClientMessage, ServerMessage};
pub use router::{Outbound, Router, SessionEvent};
pub use state::{Departure, SessionState};
