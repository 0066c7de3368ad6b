use mua2fa_oauth::OAuthError;
use mua2fa_record::RecordError;

/// Errors on the game-client side.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Reading or writing `mua2fa.dat`.
    #[error("record store i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("record store format: {0}")]
    Format(#[from] serde_json::Error),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// The server's auth or record URI could not be parsed.
    #[error("invalid uri {uri:?}: {reason}")]
    Uri { uri: String, reason: String },

    /// The server's record request cannot be acted on.
    #[error("invalid record request: {0}")]
    InvalidRequest(String),

    /// A prompt action arrived with no prompt open.
    #[error("no record request is pending")]
    NoPrompt,

    /// The connection to the server is gone.
    #[error("server connection closed")]
    Disconnected,
}
