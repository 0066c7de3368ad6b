//! Error types for the record layer.

use mua2fa_protocol::ProtocolError;

/// Errors raised while building or parsing keys, records, and state tokens.
///
/// Note what is *not* here: a bad signature. Verification never fails with
/// an error; it yields [`Validity::Never`](crate::Validity::Never) instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Malformed bytes, base-85, or a field out of bounds.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// 32 bytes that are not a valid Ed25519 public key.
    #[error("invalid ed25519 key: {0}")]
    InvalidKey(String),

    /// A record must be constructed with at least one signature.
    #[error("a record needs at least one signature entry")]
    NoSignatures,

    /// An expiry at or before the unix epoch, or outside the calendar range.
    #[error("expiry must be after the unix epoch, got {0} s")]
    InvalidExpiry(i64),

    /// A state token that is not valid base64url.
    #[error("invalid state token: {0}")]
    InvalidToken(String),
}
