//! Error types for the signaling core.

use thiserror::Error;

/// Errors surfaced by the signaling core.
///
/// The Router itself never fails — every event maps to a (possibly empty)
/// set of outbound directives. The only fallible step is decoding a client
/// frame, and the transport layer treats that as an implicit disconnect for
/// the offending session.
#[derive(Debug, Error)]
pub enum SignalError {
    /// An inbound text frame was not a valid client message.
    #[error("malformed client message: {0}")]
    MalformedMessage(#[from] serde_json::Error),
}
