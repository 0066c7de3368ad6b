//! The OAuth reverse channel for MUA2FA.
//!
//! The game connection cannot carry a browser login, so the server also
//! runs a small HTTP server and the pieces meet through the signed state:
//!
//! ```text
//! game client ──opens──▶ /redirect?state=…  ──302──▶ union auth login
//!                                                        │
//!                        /?state=…&code=…   ◀──redirect──┘
//!                            │ token + user lookup
//!                            ▼
//!                        UserSink ──▶ /record?state=… ◀──polls── game client
//! ```
//!
//! - **Server** ([`OAuthServer`], [`router`]): the three routes above.
//! - **Upstream** ([`Upstream`]): the authorization-code exchange.
//! - **Polling** ([`poll_record`]): what the game client runs against
//!   `/record` until a signed record comes back.

mod config;
mod error;
pub mod page;
mod period;
mod poll;
mod server;
mod sink;
mod upstream;

pub use config::{MUA_HOST, OAuthConfig, auth_uri, record_uri, user_agent};
pub use error::OAuthError;
pub use period::Period;
pub use poll::{fetch_record, poll_record, record_client};
pub use server::{AppState, OAuthServer, router};
pub use sink::UserSink;
pub use upstream::Upstream;
pub use reqwest::Url;
