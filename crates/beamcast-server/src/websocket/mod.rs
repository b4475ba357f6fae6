//! WebSocket connection management, heartbeat, and directive delivery.

pub mod connection;
pub mod heartbeat;
pub mod registry;
pub mod session;
