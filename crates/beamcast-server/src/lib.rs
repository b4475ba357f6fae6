//! # beamcast-server
//!
//! Axum HTTP + `WebSocket` transport binding for the signaling relay.
//!
//! - `WebSocket` gateway: one session task per client, heartbeat, single
//!   serialized entry into the [`beamcast_signal::Router`]
//! - delivery of router directives (unicast / broadcast-except / broadcast)
//!   over per-connection send channels
//! - HTTP surface: health check, Prometheus metrics, static assets
//! - graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
