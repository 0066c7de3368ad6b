//! Unified error type for MUA2FA.

use mua2fa_client::ClientError;
use mua2fa_oauth::OAuthError;
use mua2fa_protocol::ProtocolError;
use mua2fa_record::RecordError;
use mua2fa_session::SessionError;
use mua2fa_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum Mua2faError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    OAuth(#[from] OAuthError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The server loop has stopped and no longer takes commands.
    #[error("server is not running")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let err: Mua2faError = err.into();
        assert!(matches!(err, Mua2faError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_record_error() {
        let err: Mua2faError = RecordError::NoSignatures.into();
        assert!(matches!(err, Mua2faError::Record(_)));
    }

    #[test]
    fn test_from_oauth_error() {
        let err: Mua2faError = OAuthError::Parameter("state").into();
        assert!(matches!(err, Mua2faError::OAuth(_)));
        assert!(err.to_string().contains("state"));
    }

    #[test]
    fn test_from_client_error() {
        let err: Mua2faError = ClientError::NoPrompt.into();
        assert!(matches!(err, Mua2faError::Client(_)));
    }
}
