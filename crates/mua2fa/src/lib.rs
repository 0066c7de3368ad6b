//! # MUA2FA
//!
//! A second factor for game servers: before a player joins, they prove a
//! MUA union identity through OAuth, and the server remembers it by
//! signing a record the client keeps for next time.
//!
//! This crate ties the layers together: the self-repairing TOML
//! [`ServerConfig`], the [`DedicatedServer`] loop that owns the
//! configuring players and the OAuth HTTP server, and log setup.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mua2fa::prelude::*;
//!
//! # async fn run() -> Result<(), Mua2faError> {
//! mua2fa::logging::init();
//! let config = ServerConfig::load("config/mua2fa-server.toml")?;
//! let (server, handle) = DedicatedServer::<ChannelConnection>::new(config)?;
//! let task = server.spawn();
//! // hand `handle` to the game's connection layer, then:
//! handle.shutdown().await?;
//! # let _ = task.await;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod logging;
mod server;

pub use config::{ConfigError, DEFAULT_PORT, HostAndPort, ServerConfig};
pub use error::Mua2faError;
pub use server::{Clock, DedicatedServer, ServerEvent, ServerHandle};

pub mod prelude {
    pub use crate::{
        Clock, ConfigError, DedicatedServer, HostAndPort, Mua2faError, ServerConfig, ServerEvent,
        ServerHandle,
    };
    pub use mua2fa_client::{ClientData, ClientFlow, EmptyState, Reaction, RecordStore};
    pub use mua2fa_oauth::{OAuthConfig, OAuthServer, Period};
    pub use mua2fa_protocol::{Profile, User, Uuid};
    pub use mua2fa_record::{KeyPair, OAuthState, PublicKey, Record};
    pub use mua2fa_session::{MuaSelector, Outcome, SessionManager};
    pub use mua2fa_transport::{
        ChannelConnection, ChannelPeer, ClientboundPayload, Connection, DisconnectReason,
        PeerEvent, ServerboundPayload,
    };
}
