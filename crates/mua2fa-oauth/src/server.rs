//! The HTTP side of the reverse channel.
//!
//! | Route       | Caller       | Does                                          |
//! |-------------|--------------|-----------------------------------------------|
//! | `/redirect` | browser      | 302 to the union auth login page              |
//! | `/`         | browser      | OAuth callback; emits the user to the sink    |
//! | `/record`   | game client  | waits one poll interval, answers a signed record |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::Utc;
use mua2fa_protocol::Profile;
use mua2fa_record::{KeyPair, OAuthState, Record, RecordError};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::page::{self, BAD_REQUEST_HINT, CANCEL_COLOR, COMPLETE_COLOR};
use crate::{OAuthConfig, OAuthError, Upstream, UserSink};

/// Query string as ordered pairs; repeated keys are kept so they can be
/// rejected.
type Params = Vec<(String, String)>;

const UNKNOWN_PLAYER: &str = "???";

/// Everything the handlers share.
pub struct AppState {
    config: OAuthConfig,
    keys: KeyPair,
    sink: UserSink,
    upstream: Upstream,
}

impl AppState {
    pub fn new(config: OAuthConfig, keys: KeyPair) -> Result<Self, OAuthError> {
        let upstream = Upstream::new(&config)?;
        let sink = UserSink::new(config.network_tolerance);
        Ok(Self {
            config,
            keys,
            sink,
            upstream,
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn sink(&self) -> &UserSink {
        &self.sink
    }

    fn verify(&self, state: &OAuthState) -> Result<(), OAuthError> {
        if state.verify(&self.keys.public()).is_valid_at(Utc::now()) {
            Ok(())
        } else {
            Err(OAuthError::StateRejected(state.name().to_owned()))
        }
    }

    async fn complete(&self, state: &OAuthState, params: &Params) -> Result<(), OAuthError> {
        let code = only(params, "code")?;
        self.verify(state)?;
        tracing::info!(player = state.name(), "requesting union auth token");
        let user = self.upstream.login(code).await?;
        tracing::info!(player = state.name(), sub = %user.sub, "oauth process finished");
        self.sink.emit(user);
        Ok(())
    }

    async fn sign_next(&self, state: &OAuthState) -> Result<Option<Record>, OAuthError> {
        self.verify(state)?;
        let now = Utc::now();
        let period = self.config.validity_period;
        let expire = period
            .add_to(now)
            .ok_or_else(|| OAuthError::Period(period.to_string()))?;
        let profile = Profile::new(state.id(), state.name()).map_err(RecordError::from)?;
        let Some(user) = self.sink.next(self.config.poll_interval).await else {
            return Ok(None);
        };
        Ok(Some(Record::sign(user, profile, expire, &self.keys)?))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/redirect", get(handle_redirect))
        .route("/", get(handle_callback))
        .route("/record", get(handle_record))
        .with_state(state)
}

fn only<'a>(params: &'a Params, name: &'static str) -> Result<&'a str, OAuthError> {
    let mut values = params.iter().filter(|(k, _)| k == name).map(|(_, v)| v);
    match (values.next(), values.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(OAuthError::Parameter(name)),
    }
}

fn state_param(params: &Params) -> Result<OAuthState, OAuthError> {
    Ok(only(params, "state")?.parse()?)
}

async fn handle_redirect(
    State(app): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Response {
    let target = state_param(&params)
        .and_then(|state| Ok((app.upstream.authorize_url(&state.to_token()?)?, state)));
    match target {
        Ok((url, state)) => {
            tracing::info!(player = state.name(), "redirecting to union auth page");
            (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
        }
        Err(e) => {
            tracing::info!(player = UNKNOWN_PLAYER, error = %e, "refusing redirect");
            page::respond(StatusCode::BAD_REQUEST, CANCEL_COLOR, BAD_REQUEST_HINT)
        }
    }
}

async fn handle_callback(
    State(app): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Response {
    let state = match state_param(&params) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(player = UNKNOWN_PLAYER, error = %e, "oauth callback failed");
            return page::respond(StatusCode::BAD_REQUEST, CANCEL_COLOR, BAD_REQUEST_HINT);
        }
    };
    match app.complete(&state, &params).await {
        Ok(()) => page::respond(StatusCode::OK, COMPLETE_COLOR, state.complete_hint()),
        Err(e) => {
            tracing::warn!(player = state.name(), error = %e, "oauth callback failed");
            page::respond(StatusCode::BAD_REQUEST, CANCEL_COLOR, state.cancel_hint())
        }
    }
}

async fn handle_record(
    State(app): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Response {
    let state = match state_param(&params) {
        Ok(state) => state,
        Err(e) => return bad_record_request(UNKNOWN_PLAYER, &e),
    };
    match app.sign_next(&state).await {
        Ok(Some(record)) => {
            tracing::info!(player = state.name(), "giving signed record");
            (StatusCode::OK, Json(record)).into_response()
        }
        Ok(None) => {
            tracing::info!(player = state.name(), "no record available yet");
            (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
        }
        Err(e) => bad_record_request(state.name(), &e),
    }
}

fn bad_record_request(player: &str, e: &OAuthError) -> Response {
    tracing::info!(player, "rejecting record request");
    tracing::debug!(error = %e, "record request error");
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "bad request" }))).into_response()
}

// ---------------------------------------------------------------------------
// Server lifecycle
// ---------------------------------------------------------------------------

/// A running reverse-channel server.
pub struct OAuthServer {
    state: Arc<AppState>,
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl OAuthServer {
    /// Binds `config.internal_address` and starts serving in the background.
    pub async fn start(config: OAuthConfig, keys: KeyPair) -> Result<Self, OAuthError> {
        tracing::info!("starting oauth http server");
        let state = Arc::new(AppState::new(config, keys)?);
        let listener = TcpListener::bind(state.config.internal_address.as_str()).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown, signal) = oneshot::channel::<()>();
        let app = router(Arc::clone(&state));
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    // a dropped sender also means stop
                    let _ = signal.await;
                })
                .await
        });

        tracing::info!(%local_addr, "started oauth http server");
        Ok(Self {
            state,
            local_addr,
            shutdown: Some(shutdown),
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Stops accepting, wakes pending `/record` polls, and waits for
    /// in-flight requests to drain.
    pub async fn close(mut self) -> Result<(), OAuthError> {
        tracing::info!(local_addr = %self.local_addr, "stopping oauth http server");
        self.state.sink.close();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match (&mut self.task).await {
            Ok(result) => result?,
            Err(e) => tracing::warn!(error = %e, "oauth http server task ended abnormally"),
        }
        tracing::info!("stopped oauth http server");
        Ok(())
    }
}
