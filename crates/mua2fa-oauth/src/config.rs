//! Settings for the OAuth reverse channel and the URIs derived from them.

use std::time::Duration;

use reqwest::Url;

use crate::{OAuthError, Period};

/// The union auth host.
pub const MUA_HOST: &str = "skin.mualliance.ltd";

/// `User-Agent` sent on every outgoing request.
pub fn user_agent() -> String {
    format!("MUA2FA/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// `host:port` the HTTP server binds.
    pub internal_address: String,

    /// Where browsers reach this server; also the OAuth `redirect_uri`.
    pub external_uri: String,

    /// Origin of the identity provider's API.
    pub upstream_base: String,

    pub client_id: String,
    pub client_secret: String,

    /// How long a signed record stays valid.
    pub validity_period: Period,

    /// How long one `/record` request waits for a login.
    pub poll_interval: Duration,

    /// How long an authenticated user stays available to `/record`.
    pub network_tolerance: Duration,

    pub user_agent: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            internal_address: "0.0.0.0:58888".to_owned(),
            external_uri: "http://localhost:58888/".to_owned(),
            upstream_base: format!("https://{MUA_HOST}"),
            client_id: String::new(),
            client_secret: String::new(),
            validity_period: Period::years(1),
            poll_interval: Duration::from_secs(5),
            network_tolerance: Duration::from_secs(30),
            user_agent: user_agent(),
        }
    }
}

impl OAuthConfig {
    pub fn auth_uri(&self) -> Result<Url, OAuthError> {
        auth_uri(&parse_url(&self.external_uri)?)
    }

    pub fn record_uri(&self) -> Result<Url, OAuthError> {
        record_uri(&parse_url(&self.external_uri)?)
    }
}

pub(crate) fn parse_url(text: &str) -> Result<Url, OAuthError> {
    Url::parse(text).map_err(|e| OAuthError::Uri(format!("{text}: {e}")))
}

/// `<external>/redirect`, resolved against the external URI's last path
/// segment (so `https://a/mua` and `https://a/mua/` both give
/// `https://a/mua/redirect`).
pub fn auth_uri(external: &Url) -> Result<Url, OAuthError> {
    sibling(external, "redirect")
}

/// `<external>/record`, resolved like [`auth_uri`].
pub fn record_uri(external: &Url) -> Result<Url, OAuthError> {
    sibling(external, "record")
}

fn sibling(external: &Url, leaf: &str) -> Result<Url, OAuthError> {
    let last = external
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or(".");
    external
        .join(&format!("{last}/{leaf}"))
        .map_err(|e| OAuthError::Uri(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_auth_uri_at_root() {
        let uri = auth_uri(&url("http://localhost:58888/")).unwrap();
        assert_eq!(uri.as_str(), "http://localhost:58888/redirect");
    }

    #[test]
    fn test_record_uri_without_trailing_slash() {
        let uri = record_uri(&url("https://example.com/mua")).unwrap();
        assert_eq!(uri.as_str(), "https://example.com/mua/record");
    }

    #[test]
    fn test_record_uri_with_trailing_slash() {
        let uri = record_uri(&url("https://example.com/mua/")).unwrap();
        assert_eq!(uri.as_str(), "https://example.com/mua/record");
    }

    #[test]
    fn test_auth_uri_drops_query() {
        let uri = auth_uri(&url("https://example.com/a/b?x=1")).unwrap();
        assert_eq!(uri.as_str(), "https://example.com/a/b/redirect");
    }

    #[test]
    fn test_default_config_derives_local_uris() {
        let config = OAuthConfig::default();
        assert_eq!(config.auth_uri().unwrap().as_str(), "http://localhost:58888/redirect");
        assert_eq!(config.record_uri().unwrap().as_str(), "http://localhost:58888/record");
    }

    #[test]
    fn test_user_agent_names_crate_version() {
        assert!(user_agent().starts_with("MUA2FA/"));
    }
}
