//! What the game client does with a record request.
//!
//! ```text
//! RequestRecord ─┬─ stored record still valid, no force ──▶ ResponseRecord(stored)
//!                ├─ store is HideForever ─────────────────▶ ResponseCancel(state)
//!                └─ otherwise ──▶ Prompt ─┬─ login ──▶ browser + poll ──▶ ResponseRecord
//!                                         ├─ skip / countdown ───────────▶ ResponseCancel
//!                                         └─ skip forever ───────────────▶ ResponseCancel
//! RequestRefresh ──▶ merge into store, close prompt
//! ```
//!
//! The flow lives on the game thread. The only work it hands off is the
//! record poll, which runs as a tokio task and answers through the same
//! outbox.

use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mua2fa_oauth::{Url, poll_record, record_client, user_agent};
use mua2fa_protocol::Profile;
use mua2fa_record::{OAuthState, Record};
use mua2fa_transport::{RequestRecord, ServerboundPayload};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ClientError;
use crate::store::{ClientData, EmptyState, RecordStore};

/// Delay between `/record` polls.
pub const CLIENT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Text shown on the browser page once the login ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hints {
    pub cancel: String,
    pub complete: String,
}

impl Default for Hints {
    fn default() -> Self {
        Self {
            cancel: "Login cancelled\nYou can close this page and return to the game".to_owned(),
            complete: "Login complete\nYou can close this page and return to the game".to_owned(),
        }
    }
}

/// Opens the auth page for the player.
pub trait Browser: Send {
    fn open(&self, uri: &Url) -> io::Result<()>;
}

/// The desktop's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, uri: &Url) -> io::Result<()> {
        open::that(uri.as_str())
    }
}

/// How [`ClientFlow::on_request`] answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// The stored record went straight back.
    Bypassed,
    /// The player opted out for good; the request was cancelled.
    Cancelled,
    /// A [`Prompt`] is now open.
    Prompted,
}

/// The open question to the player: log in, or skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    auth_uri: Url,
    record_uri: Url,
    state: OAuthState,
    deadline: DateTime<Utc>,
    include_hide_forever: bool,
}

impl Prompt {
    pub fn auth_uri(&self) -> &Url {
        &self.auth_uri
    }

    pub fn record_uri(&self) -> &Url {
        &self.record_uri
    }

    pub fn state(&self) -> &OAuthState {
        &self.state
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// "Skip forever" is only offered once the player has seen a prompt.
    pub fn include_hide_forever(&self) -> bool {
        self.include_hide_forever
    }

    /// Remaining time as `mm:ss`, floored at `00:00`.
    pub fn countdown(&self, now: DateTime<Utc>) -> String {
        let secs = (self.deadline - now).num_seconds().max(0);
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

pub struct ClientFlow<B: Browser = SystemBrowser> {
    profile: Profile,
    store: RecordStore,
    hints: Hints,
    browser: B,
    outbox: mpsc::UnboundedSender<ServerboundPayload>,
    http: reqwest::Client,
    poll_interval: Duration,
    prompt: Option<Prompt>,
    poll: Option<JoinHandle<()>>,
}

impl<B: Browser> ClientFlow<B> {
    pub fn new(
        profile: Profile,
        store: RecordStore,
        browser: B,
        outbox: mpsc::UnboundedSender<ServerboundPayload>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            profile,
            store,
            hints: Hints::default(),
            browser,
            outbox,
            http: record_client(&user_agent())?,
            poll_interval: CLIENT_POLL_INTERVAL,
            prompt: None,
            poll: None,
        })
    }

    pub fn with_hints(mut self, hints: Hints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.poll.as_ref().is_some_and(|poll| !poll.is_finished())
    }

    pub fn on_request(
        &mut self,
        request: RequestRecord,
        now: DateTime<Utc>,
    ) -> Result<Reaction, ClientError> {
        let state = request
            .state
            .with_hints(self.hints.cancel.as_str(), self.hints.complete.as_str())?;

        if !request.force_refresh {
            if let Some(stored) = self.store.record() {
                if stored.verify(&self.profile, &request.key).is_valid_at(now) {
                    tracing::info!(player = self.profile.name(), "answering with stored record");
                    self.send(ServerboundPayload::ResponseRecord(stored.clone()))?;
                    return Ok(Reaction::Bypassed);
                }
            }
        }

        if self.store.data().empty_state() == Some(EmptyState::HideForever) {
            tracing::info!(player = self.profile.name(), "second factor hidden, cancelling");
            self.send(ServerboundPayload::ResponseCancel(state))?;
            return Ok(Reaction::Cancelled);
        }

        let Some(deadline) = now.checked_add_signed(request.duration) else {
            tracing::warn!(duration = %request.duration, "record request deadline out of range");
            return Err(ClientError::InvalidRequest(format!(
                "duration {} overflows the deadline",
                request.duration
            )));
        };

        let token = state.to_token()?;
        let prompt = Prompt {
            auth_uri: with_state(&request.auth_uri, &token)?,
            record_uri: with_state(&request.record_uri, &token)?,
            state,
            deadline,
            include_hide_forever: self.store.data().empty_state()
                == Some(EmptyState::ShowIfNecessary),
        };
        self.stop_poll();
        self.prompt = Some(prompt);
        Ok(Reaction::Prompted)
    }

    /// Opens the auth page and starts polling for the signed record.
    pub fn login(&mut self) -> Result<(), ClientError> {
        let prompt = self.prompt.as_ref().ok_or(ClientError::NoPrompt)?;
        if let Err(e) = self.browser.open(&prompt.auth_uri) {
            tracing::warn!(uri = %prompt.auth_uri, error = %e, "could not open browser");
        }

        let http = self.http.clone();
        let uri = prompt.record_uri.clone();
        let outbox = self.outbox.clone();
        let interval = self.poll_interval;
        self.stop_poll();
        self.poll = Some(tokio::spawn(async move {
            let record = poll_record(&http, &uri, interval).await;
            tracing::info!(sub = %record.user().sub, "received signed record");
            // the flow is gone if the outbox is closed
            let _ = outbox.send(ServerboundPayload::ResponseRecord(record));
        }));
        Ok(())
    }

    /// Declines this time. A player who has never chosen moves to
    /// `ShowIfNecessary`; a stored record is left alone.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Result<(), ClientError> {
        let prompt = self.close_prompt()?;
        if self.store.record().is_none() {
            self.persist(ClientData::empty(EmptyState::ShowIfNecessary), now);
        }
        self.send(ServerboundPayload::ResponseCancel(prompt.state))
    }

    /// Declines and never prompts again.
    pub fn skip_forever(&mut self, now: DateTime<Utc>) -> Result<(), ClientError> {
        let prompt = self.close_prompt()?;
        self.persist(ClientData::empty(EmptyState::HideForever), now);
        self.send(ServerboundPayload::ResponseCancel(prompt.state))
    }

    /// Skips once the prompt's countdown has run out. Returns whether it did.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<bool, ClientError> {
        let expired = self.prompt.as_ref().is_some_and(|p| now >= p.deadline);
        if !expired {
            return Ok(false);
        }
        tracing::info!(player = self.profile.name(), "record request timed out");
        self.skip(now)?;
        Ok(true)
    }

    /// The server accepted `record`: merge it into the store and close any
    /// prompt.
    pub fn on_refresh(&mut self, record: Record, now: DateTime<Utc>) {
        let merged = match self.store.record() {
            Some(stored) => stored.refresh(record),
            None => record,
        };
        self.persist(ClientData::Record(merged), now);
        self.prompt = None;
        self.stop_poll();
    }

    fn close_prompt(&mut self) -> Result<Prompt, ClientError> {
        let prompt = self.prompt.take().ok_or(ClientError::NoPrompt)?;
        self.stop_poll();
        Ok(prompt)
    }

    fn persist(&mut self, data: ClientData, now: DateTime<Utc>) {
        if let Err(e) = self.store.save(data, now) {
            tracing::warn!(dir = %self.store.dir().display(), error = %e, "failed to save client record");
        }
    }

    fn send(&self, payload: ServerboundPayload) -> Result<(), ClientError> {
        self.outbox
            .send(payload)
            .map_err(|_| ClientError::Disconnected)
    }

    fn stop_poll(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.abort();
        }
    }
}

impl<B: Browser> Drop for ClientFlow<B> {
    fn drop(&mut self) {
        self.stop_poll();
    }
}

fn with_state(uri: &str, token: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(uri).map_err(|e| ClientError::Uri {
        uri: uri.to_owned(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut().append_pair("state", token);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn test_with_state_appends_to_existing_query() {
        let url = with_state("https://mc.example.com/record?v=1", "abc").unwrap();
        assert_eq!(url.as_str(), "https://mc.example.com/record?v=1&state=abc");
    }

    #[test]
    fn test_with_state_rejects_relative_uri() {
        assert!(matches!(
            with_state("/record", "abc"),
            Err(ClientError::Uri { .. })
        ));
    }

    #[test]
    fn test_countdown_formats_minutes_and_seconds() {
        let now = Utc::now();
        let prompt = Prompt {
            auth_uri: Url::parse("http://localhost/redirect").unwrap(),
            record_uri: Url::parse("http://localhost/record").unwrap(),
            state: OAuthState::sign(
                mua2fa_protocol::Uuid::from_u128(1),
                "Steve",
                now + TimeDelta::minutes(5),
                &mua2fa_record::KeyPair::generate(),
            )
            .unwrap(),
            deadline: now + TimeDelta::seconds(179),
            include_hide_forever: false,
        };
        assert_eq!(prompt.countdown(now), "02:59");
        assert_eq!(prompt.countdown(now + TimeDelta::seconds(170)), "00:09");
        assert_eq!(prompt.countdown(now + TimeDelta::seconds(400)), "00:00");
    }
}
