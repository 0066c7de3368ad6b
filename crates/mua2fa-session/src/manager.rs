//! The session manager: drives every configuring player through the
//! second factor.
//!
//! ```text
//! START ──start()──▶ AWAIT_RECORD ──record valid──────────▶ FINISH (sub)
//!                         │
//!                         ├─ record invalid ─▶ AWAIT_RECORD (force refresh)
//!                         ├─ cancel, auth optional ─▶ FINISH (no identity)
//!                         ├─ cancel, auth required ─▶ DISCONNECT (not whitelisted)
//!                         └─ sweep past deadline ───▶ DISCONNECT (timeout)
//! ```
//!
//! # Concurrency note
//!
//! Like the rest of the server state, `SessionManager` is a plain
//! `HashMap` owned by the main loop. Every operation takes `now`
//! explicitly so the loop decides the clock.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use mua2fa_protocol::Uuid;
use mua2fa_record::{KeyPair, OAuthState, Record};
use mua2fa_transport::{ClientboundPayload, Connection, DisconnectReason, RequestRecord};

use crate::{MuaSelector, Outcome, ServerSession, SessionConfig, SessionError};

pub struct SessionManager<C> {
    /// Players awaiting a record, keyed by profile UUID.
    sessions: HashMap<Uuid, ServerSession<C>>,

    /// The identity each finished player proved (`None` if they skipped).
    identifiers: HashMap<Uuid, Option<String>>,

    keys: KeyPair,
    config: SessionConfig,
}

impl<C: Connection> SessionManager<C> {
    pub fn new(keys: KeyPair, config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            identifiers: HashMap::new(),
            keys,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Runs the configuration task for `connection`: creates (or keeps)
    /// the session and sends the record request.
    ///
    /// A player who already has a session keeps its deadline; only the
    /// connection handle is replaced.
    pub fn start(&mut self, connection: C, now: DateTime<Utc>) -> Result<Outcome, SessionError> {
        let profile = connection.profile().clone();
        let deadline = self
            .sessions
            .get(&profile.id())
            .map(|s| s.deadline)
            .unwrap_or(now + self.config.request_countdown);

        let request = self.request(
            &connection,
            deadline,
            deadline + self.config.poll_interval,
            false,
            now,
        )?;
        tracing::info!(player = %profile, %deadline, "requesting record");
        connection.send(request)?;
        self.sessions.insert(
            profile.id(),
            ServerSession {
                deadline,
                connection,
            },
        );
        Ok(Outcome::Awaiting)
    }

    /// Handles a `response_to_server_record` from `connection`.
    ///
    /// The record must vouch for the connection's own profile under the
    /// server key at `now`. A rejected record re-issues the request with
    /// `force_refresh` set, as long as the session is still alive.
    pub fn handle_record(
        &mut self,
        connection: &C,
        record: Record,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        let profile = connection.profile();
        let Some(session) = self.sessions.get(&profile.id()) else {
            tracing::info!(player = %profile, "record arrived without a session");
            return self.disconnect(connection, DisconnectReason::Timeout);
        };

        let validity = record.verify(profile, &self.keys.public());
        if !validity.is_valid_at(now) {
            let deadline = session.deadline;
            tracing::info!(player = %profile, "record rejected, requesting a fresh one");
            let request = self.request(
                connection,
                deadline,
                deadline + self.config.network_tolerance,
                true,
                now,
            )?;
            connection.send(request)?;
            return Ok(Outcome::Awaiting);
        }

        let sub = record.user().sub.clone();
        self.sessions.remove(&profile.id());
        self.identifiers.insert(profile.id(), Some(sub.clone()));
        tracing::info!(player = %profile, %sub, "record accepted");
        connection.send(ClientboundPayload::RequestRefresh(record))?;
        connection.finish_task()?;
        Ok(Outcome::Finished {
            identifier: Some(sub),
        })
    }

    /// Handles a `response_to_server_cancel` from `connection`.
    ///
    /// The session ends here whatever the outcome.
    pub fn handle_cancel(
        &mut self,
        connection: &C,
        state: OAuthState,
        now: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        let profile = connection.profile();
        if self.sessions.remove(&profile.id()).is_none() {
            tracing::info!(player = %profile, "cancel arrived without a session");
            return self.disconnect(connection, DisconnectReason::Timeout);
        }

        let genuine = state.id() == profile.id()
            && state.verify(&self.keys.public()).is_valid_at(now);
        if !genuine {
            tracing::info!(player = %profile, "cancel carried a stale or foreign state");
            return self.disconnect(connection, DisconnectReason::Timeout);
        }
        if self.config.require_union_auth {
            tracing::info!(player = %profile, "skipped a required second factor");
            return self.disconnect(connection, DisconnectReason::NotWhitelisted);
        }

        self.identifiers.insert(profile.id(), None);
        tracing::info!(player = %profile, "joined without a union identity");
        connection.finish_task()?;
        Ok(Outcome::Finished { identifier: None })
    }

    /// Disconnects every player whose deadline plus the network tolerance
    /// has passed. Returns the UUIDs that were dropped.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Uuid> {
        let tolerance = self.config.network_tolerance;
        let mut expired = Vec::new();

        self.sessions.retain(|id, session| {
            if session.deadline + tolerance >= now {
                return true;
            }
            let profile = session.connection.profile();
            tracing::info!(player = %profile, "timed out");
            if let Err(e) = session.connection.disconnect(DisconnectReason::Timeout) {
                tracing::debug!(player = %profile, error = %e, "connection already gone");
            }
            expired.push(*id);
            false
        });

        expired
    }

    /// Forgets a player who left the server.
    pub fn logout(&mut self, id: &Uuid) {
        self.sessions.remove(id);
        self.identifiers.remove(id);
    }

    /// Forgets everything (server shutdown).
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.identifiers.clear();
    }

    pub fn get(&self, id: &Uuid) -> Option<&ServerSession<C>> {
        self.sessions.get(id)
    }

    /// The union identity a finished player proved, if any.
    pub fn identifier(&self, id: &Uuid) -> Option<&str> {
        self.identifiers.get(id).and_then(|sub| sub.as_deref())
    }

    /// Whether the player finished configuration (with or without identity).
    pub fn is_finished(&self, id: &Uuid) -> bool {
        self.identifiers.contains_key(id)
    }

    /// Evaluates a `mua=` selector against a player.
    pub fn select(&self, selector: &MuaSelector, id: &Uuid) -> bool {
        selector.matches(self.identifier(id))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // -- helpers ----------------------------------------------------------

    fn request(
        &self,
        connection: &C,
        deadline: DateTime<Utc>,
        expire: DateTime<Utc>,
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> Result<ClientboundPayload, SessionError> {
        let profile = connection.profile();
        let state = OAuthState::sign(profile.id(), profile.name(), expire, &self.keys)?;
        Ok(ClientboundPayload::RequestRecord(RequestRecord {
            key: self.keys.public(),
            duration: (deadline - now).max(TimeDelta::zero()),
            force_refresh,
            auth_uri: self.config.auth_uri.clone(),
            record_uri: self.config.record_uri.clone(),
            state,
        }))
    }

    fn disconnect(&self, connection: &C, reason: DisconnectReason) -> Result<Outcome, SessionError> {
        connection.disconnect(reason)?;
        Ok(Outcome::Disconnected(reason))
    }
}

// =========================================================================
// Tests
// =========================================================================
