//! Client-side polling of `/record`.

use std::time::Duration;

use mua2fa_record::Record;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Url};

use crate::OAuthError;

/// An HTTP client preset for `/record` polls.
pub fn record_client(user_agent: &str) -> Result<Client, OAuthError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    Ok(Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .build()?)
}

/// Fetches `record_uri` once and decodes the body as a record.
///
/// A `404 {"error":"not found"}` body fails to decode like any other
/// non-record answer.
pub async fn fetch_record(client: &Client, record_uri: &Url) -> Result<Record, OAuthError> {
    let body = client.get(record_uri.clone()).send().await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Polls until a record comes back. Attempts start no closer than
/// `interval` apart; every failure is retried.
///
/// Never returns otherwise; drop or abort the future to stop.
pub async fn poll_record(client: &Client, record_uri: &Url, interval: Duration) -> Record {
    let mut attempt = 0u64;
    loop {
        attempt += 1;
        let (result, ()) = tokio::join!(
            fetch_record(client, record_uri),
            tokio::time::sleep(interval)
        );
        match result {
            Ok(record) => return record,
            Err(e) => tracing::debug!(attempt, error = %e, "record poll missed"),
        }
    }
}
