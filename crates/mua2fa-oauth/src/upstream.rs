//! Client side of the union auth authorization-code flow.

use mua2fa_protocol::User;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::config::parse_url;
use crate::{OAuthConfig, OAuthError};

const AUTHORIZE_PATH: &str = "api/union/oauth2/authorize";
const TOKEN_PATH: &str = "api/union/oauth2/token";
const USER_PATH: &str = "api/union/oauth2/user";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
}

/// Talks to the identity provider on behalf of the callback handler.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: Client,
    base: Url,
    redirect_uri: String,
    client_id: String,
    client_secret: String,
}

impl Upstream {
    pub fn new(config: &OAuthConfig) -> Result<Self, OAuthError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;
        let mut base = parse_url(&config.upstream_base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            base,
            redirect_uri: parse_url(&config.external_uri)?.into(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Where the browser is sent to log in, carrying `state` through.
    pub fn authorize_url(&self, state: &str) -> Result<Url, OAuthError> {
        let mut url = self.endpoint(AUTHORIZE_PATH)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state);
        Ok(url)
    }

    /// Trades an authorization code for the value of an `Authorization`
    /// header.
    pub async fn exchange(&self, code: &str) -> Result<String, OAuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let response = self
            .client
            .post(self.endpoint(TOKEN_PATH)?)
            .form(&form)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(OAuthError::UpstreamStatus(response.status().as_u16()));
        }
        let token: TokenResponse = response.json().await?;
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            return Err(OAuthError::TokenType(token.token_type));
        }
        Ok(format!("{} {}", token.token_type, token.access_token))
    }

    pub async fn fetch_user(&self, authorization: &str) -> Result<User, OAuthError> {
        let response = self
            .client
            .get(self.endpoint(USER_PATH)?)
            .header(header::AUTHORIZATION, authorization)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(OAuthError::UpstreamStatus(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    /// Exchange then fetch: the user behind `code`.
    pub async fn login(&self, code: &str) -> Result<User, OAuthError> {
        let authorization = self.exchange(code).await?;
        self.fetch_user(&authorization).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, OAuthError> {
        self.base
            .join(path)
            .map_err(|e| OAuthError::Uri(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(base: &str) -> Upstream {
        Upstream::new(&OAuthConfig {
            upstream_base: base.to_owned(),
            external_uri: "https://mc.example.com/mua/".to_owned(),
            client_id: "client-1".to_owned(),
            client_secret: "hunter2".to_owned(),
            ..OAuthConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_authorize_url_carries_all_parameters() {
        let url = upstream("https://skin.mualliance.ltd")
            .authorize_url("abc_-123")
            .unwrap();
        assert_eq!(url.path(), "/api/union/oauth2/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("response_type".into(), "code".into()),
                ("client_id".into(), "client-1".into()),
                ("redirect_uri".into(), "https://mc.example.com/mua/".into()),
                ("state".into(), "abc_-123".into()),
            ]
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_prefix() {
        let url = upstream("http://127.0.0.1:9000/idp")
            .endpoint(USER_PATH)
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/idp/api/union/oauth2/user");
    }

    #[test]
    fn test_new_rejects_unparsable_base() {
        let config = OAuthConfig {
            upstream_base: "not a url".to_owned(),
            ..OAuthConfig::default()
        };
        assert!(matches!(Upstream::new(&config), Err(OAuthError::Uri(_))));
    }
}
