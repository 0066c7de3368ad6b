//! Configuration-phase transport for MUA2FA.
//!
//! The game server and client talk through four custom payloads while the
//! player is still in the configuration phase:
//!
//! ```text
//! server                                   client
//!   │── request_for_client_record ───────────▶│
//!   │◀──────────── response_to_server_record ─│   (or _cancel)
//!   │── request_for_client_refresh ──────────▶│
//!   │── finish task ─────────────────────────▶│
//! ```
//!
//! [`Connection`] is the server's handle on one configuring player. It is
//! synchronous: the session state machine runs on the server's main loop
//! and only enqueues work. [`channel_pair`] gives an in-process
//! implementation that still encodes every payload to bytes.

mod channel;
mod error;
pub mod payload;

pub use channel::{ChannelConnection, ChannelPeer, InboundFrame, PeerEvent, channel_pair};
pub use error::TransportError;
pub use payload::{ClientboundPayload, Frame, RequestRecord, ServerboundPayload};

use std::fmt;

use mua2fa_protocol::Profile;

/// Namespace of every payload id.
pub const NAMESPACE: &str = "mua2fa";

/// Both sides must agree on this to negotiate the payloads.
pub const NETWORK_VERSION: &str = "1";

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why the server dropped a configuring player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Timeout,
    NotWhitelisted,
}

impl DisconnectReason {
    /// The client-side translation key shown to the player.
    pub fn translation_key(self) -> &'static str {
        match self {
            Self::Timeout => "disconnect.timeout",
            Self::NotWhitelisted => "multiplayer.disconnect.not_whitelisted",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.translation_key())
    }
}

/// The server's handle on one player in the configuration phase.
pub trait Connection: Send + 'static {
    fn id(&self) -> ConnectionId;

    /// The game profile the player logged in with.
    fn profile(&self) -> &Profile;

    fn send(&self, payload: ClientboundPayload) -> Result<(), TransportError>;

    /// Completes the configuration task so the player proceeds to join.
    fn finish_task(&self) -> Result<(), TransportError>;

    fn disconnect(&self, reason: DisconnectReason) -> Result<(), TransportError>;
}
