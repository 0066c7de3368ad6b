use mua2fa_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A frame carried an id outside the `mua2fa` namespace, or one that
    /// travels in the other direction.
    #[error("unknown payload id: {0}")]
    UnknownPayload(String),

    /// A frame body failed to encode or decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
