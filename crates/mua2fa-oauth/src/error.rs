use mua2fa_record::RecordError;

/// Errors from the OAuth reverse channel.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Binding or serving the HTTP listener failed.
    #[error("http server i/o: {0}")]
    Io(#[from] std::io::Error),

    /// A request to the identity provider (or to `/record`) failed.
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The identity provider answered with something other than 200.
    #[error("upstream replied with status {0}")]
    UpstreamStatus(u16),

    /// The token response named a scheme other than `bearer`.
    #[error("unsupported token type: {0}")]
    TokenType(String),

    /// A query parameter was missing or repeated.
    #[error("expected exactly one {0:?} parameter")]
    Parameter(&'static str),

    /// The state's signature does not check out under our key, or it expired.
    #[error("state rejected for player {0}")]
    StateRejected(String),

    #[error("invalid uri: {0}")]
    Uri(String),

    #[error("invalid period {0:?}")]
    Period(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
