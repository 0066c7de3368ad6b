//! Error types for the session layer.

use mua2fa_record::RecordError;
use mua2fa_transport::TransportError;

/// Errors that can occur while driving a configuration session.
///
/// Rejected records and states are not errors: they are ordinary
/// transitions of the state machine. These cover the cases where the
/// server itself cannot do its part.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Signing a fresh state failed (bad profile name or expiry).
    #[error("failed to sign state: {0}")]
    Sign(#[from] RecordError),

    /// The player's connection refused a payload or control message.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A `mua=` selector argument did not parse.
    #[error("invalid mua selector {input:?} at {position}")]
    InvalidSelector { input: String, position: usize },
}
