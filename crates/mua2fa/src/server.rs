//! `DedicatedServer`: the loop that owns every configuring player.
//!
//! The server is an actor. Everything that touches the session map runs on
//! its task; the outside world talks to it through a [`ServerHandle`] and
//! the inbound frame channel shared by all connections.
//!
//! ```text
//! ServerHandle ──ServerEvent──▶ ┌───────────────────┐
//! ChannelPeer ──InboundFrame──▶ │  DedicatedServer  │ ──payloads──▶ connections
//!                   tick ─────▶ │  SessionManager   │
//!                               └───────────────────┘
//!                                   │ start/close
//!                                   ▼
//!                               OAuthServer (when the port is not 0)
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use mua2fa_oauth::OAuthServer;
use mua2fa_protocol::{Profile, Uuid};
use mua2fa_session::{MuaSelector, Outcome, SessionManager};
use mua2fa_tick::{TickConfig, TickScheduler};
use mua2fa_transport::{
    ChannelConnection, ChannelPeer, Connection, ConnectionId, InboundFrame, ServerboundPayload,
    channel_pair,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{Mua2faError, ServerConfig};

/// Bound on queued [`ServerEvent`]s before senders wait.
const EVENT_CHANNEL_SIZE: usize = 256;

/// Source of the current time for deadlines and signatures.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What the server loop can be asked to do.
pub enum ServerEvent<C> {
    /// A connection entered the configuration phase.
    Configure(C),

    /// A payload from a connection that does not feed the inbound channel
    /// directly.
    Payload(InboundFrame),

    /// A player left the server.
    Logout(Uuid),

    Identifier {
        id: Uuid,
        reply: oneshot::Sender<Option<String>>,
    },

    Select {
        selector: MuaSelector,
        id: Uuid,
        reply: oneshot::Sender<bool>,
    },

    HttpAddr {
        reply: oneshot::Sender<Option<SocketAddr>>,
    },

    Shutdown,
}

/// Handle to a running server. Cheap to clone.
pub struct ServerHandle<C> {
    events: mpsc::Sender<ServerEvent<C>>,
    inbound: mpsc::UnboundedSender<InboundFrame>,
    next_connection: Arc<AtomicU64>,
}

impl<C> Clone for ServerHandle<C> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            inbound: self.inbound.clone(),
            next_connection: Arc::clone(&self.next_connection),
        }
    }
}

impl<C: Connection> ServerHandle<C> {
    /// Starts the configuration task for `connection`.
    pub async fn configure(&self, connection: C) -> Result<(), Mua2faError> {
        self.send(ServerEvent::Configure(connection)).await
    }

    /// Hands a raw serverbound frame to the loop.
    pub async fn deliver(&self, frame: InboundFrame) -> Result<(), Mua2faError> {
        self.send(ServerEvent::Payload(frame)).await
    }

    pub async fn logout(&self, id: Uuid) -> Result<(), Mua2faError> {
        self.send(ServerEvent::Logout(id)).await
    }

    /// The union `sub` the player proved, if they finished with one.
    pub async fn identifier(&self, id: Uuid) -> Result<Option<String>, Mua2faError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServerEvent::Identifier { id, reply }).await?;
        rx.await.map_err(|_| Mua2faError::Unavailable)
    }

    pub async fn select(&self, selector: MuaSelector, id: Uuid) -> Result<bool, Mua2faError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServerEvent::Select {
            selector,
            id,
            reply,
        })
        .await?;
        rx.await.map_err(|_| Mua2faError::Unavailable)
    }

    /// Where the OAuth HTTP server listens, or `None` if it is disabled.
    pub async fn http_addr(&self) -> Result<Option<SocketAddr>, Mua2faError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServerEvent::HttpAddr { reply }).await?;
        rx.await.map_err(|_| Mua2faError::Unavailable)
    }

    pub async fn shutdown(&self) -> Result<(), Mua2faError> {
        self.send(ServerEvent::Shutdown).await
    }

    async fn send(&self, event: ServerEvent<C>) -> Result<(), Mua2faError> {
        self.events
            .send(event)
            .await
            .map_err(|_| Mua2faError::Unavailable)
    }
}

impl ServerHandle<ChannelConnection> {
    /// Opens an in-process connection for `profile` and starts its
    /// configuration task. The returned peer plays the game client.
    pub async fn connect(&self, profile: Profile) -> Result<ChannelPeer, Mua2faError> {
        let id = ConnectionId::new(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let (connection, peer) = channel_pair(id, profile, self.inbound.clone());
        self.configure(connection).await?;
        Ok(peer)
    }
}

// ---------------------------------------------------------------------------
// The actor
// ---------------------------------------------------------------------------

pub struct DedicatedServer<C> {
    state: ServerState<C>,
    events: mpsc::Receiver<ServerEvent<C>>,
    inbound: mpsc::UnboundedReceiver<InboundFrame>,
    ticks: TickScheduler,
}

struct ServerState<C> {
    config: ServerConfig,
    sessions: SessionManager<C>,
    connections: HashMap<ConnectionId, C>,
    clock: Clock,
    oauth: Option<OAuthServer>,
}

impl<C: Connection + Clone> DedicatedServer<C> {
    pub fn new(config: ServerConfig) -> Result<(Self, ServerHandle<C>), Mua2faError> {
        let sessions = SessionManager::new(config.sign_key.clone(), config.session_config()?);
        let (events_tx, events) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        let server = Self {
            state: ServerState {
                config,
                sessions,
                connections: HashMap::new(),
                clock: Arc::new(Utc::now),
                oauth: None,
            },
            events,
            inbound,
            ticks: TickScheduler::new(TickConfig::default()),
        };
        let handle = ServerHandle {
            events: events_tx,
            inbound: inbound_tx,
            next_connection: Arc::new(AtomicU64::new(1)),
        };
        Ok((server, handle))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.state.clock = clock;
        self
    }

    /// Sweep rate; 0 disables sweeping.
    pub fn with_tick_rate(mut self, tick_rate_hz: u32) -> Self {
        self.ticks = TickScheduler::with_rate(tick_rate_hz);
        self
    }

    /// Runs the loop on its own task.
    pub fn spawn(self) -> JoinHandle<Result<(), Mua2faError>> {
        tokio::spawn(self.run())
    }

    /// Processes events, frames, and sweeps until shut down or every handle
    /// is dropped.
    pub async fn run(self) -> Result<(), Mua2faError> {
        let Self {
            mut state,
            mut events,
            mut inbound,
            mut ticks,
        } = self;
        state.start_http().await?;
        tracing::info!("server running");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ServerEvent::Shutdown) | None => break,
                    Some(event) => state.handle_event(event),
                },
                Some(frame) = inbound.recv() => state.handle_frame(frame),
                _ = ticks.wait_for_tick() => state.sweep(),
            }
        }

        state.shutdown().await
    }
}

impl<C: Connection + Clone> ServerState<C> {
    async fn start_http(&mut self) -> Result<(), Mua2faError> {
        if !self.config.http_enabled() {
            tracing::info!("oauth http server disabled");
            return Ok(());
        }
        let oauth = OAuthServer::start(self.config.oauth_config(), self.config.sign_key.clone())
            .await?;
        self.oauth = Some(oauth);
        Ok(())
    }

    fn handle_event(&mut self, event: ServerEvent<C>) {
        match event {
            ServerEvent::Configure(connection) => self.configure(connection),
            ServerEvent::Payload(frame) => self.handle_frame(frame),
            ServerEvent::Logout(id) => {
                self.sessions.logout(&id);
                self.connections.retain(|_, c| c.profile().id() != id);
            }
            ServerEvent::Identifier { id, reply } => {
                let _ = reply.send(self.sessions.identifier(&id).map(str::to_owned));
            }
            ServerEvent::Select {
                selector,
                id,
                reply,
            } => {
                let _ = reply.send(self.sessions.select(&selector, &id));
            }
            ServerEvent::HttpAddr { reply } => {
                let _ = reply.send(self.oauth.as_ref().map(OAuthServer::local_addr));
            }
            // handled by the loop itself
            ServerEvent::Shutdown => {}
        }
    }

    fn configure(&mut self, connection: C) {
        let id = connection.id();
        match self.sessions.start(connection.clone(), (self.clock)()) {
            Ok(_) => {
                // a reconnect replaces the player's earlier connection
                let profile = connection.profile().id();
                self.connections.retain(|_, c| c.profile().id() != profile);
                self.connections.insert(id, connection);
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "could not start configuration");
            }
        }
    }

    fn handle_frame(&mut self, frame: InboundFrame) {
        let Some(connection) = self.connections.get(&frame.connection) else {
            tracing::debug!(connection = %frame.connection, "frame from unknown connection");
            return;
        };
        let payload = match frame.decode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(connection = %frame.connection, error = %e, "undecodable frame");
                return;
            }
        };

        let now = (self.clock)();
        let result = match payload {
            ServerboundPayload::ResponseRecord(record) => {
                self.sessions.handle_record(connection, record, now)
            }
            ServerboundPayload::ResponseCancel(state) => {
                self.sessions.handle_cancel(connection, state, now)
            }
        };

        match result {
            Ok(Outcome::Awaiting) => {}
            Ok(Outcome::Finished { .. } | Outcome::Disconnected(_)) => {
                self.connections.remove(&frame.connection);
            }
            Err(e) => {
                tracing::warn!(connection = %frame.connection, error = %e, "payload handling failed");
            }
        }
    }

    fn sweep(&mut self) {
        let expired = self.sessions.sweep((self.clock)());
        if !expired.is_empty() {
            self.connections
                .retain(|_, c| !expired.contains(&c.profile().id()));
        }
    }

    async fn shutdown(mut self) -> Result<(), Mua2faError> {
        tracing::info!("server stopping");
        self.sessions.clear();
        self.connections.clear();
        if let Some(oauth) = self.oauth.take() {
            oauth.close().await?;
        }
        tracing::info!("server stopped");
        Ok(())
    }
}
