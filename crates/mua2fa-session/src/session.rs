//! Session types: one configuring player and the knobs that bound it.

use chrono::{DateTime, TimeDelta, Utc};
use mua2fa_record::{NETWORK_TOLERANCE, POLL_INTERVAL};
use mua2fa_transport::DisconnectReason;

/// Time a player gets to finish the second factor.
pub const MUA_REQUEST_COUNTDOWN: TimeDelta = TimeDelta::seconds(180);

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Budget from the first request to the deadline.
    pub request_countdown: TimeDelta,

    /// Added to the deadline when signing the first state.
    pub poll_interval: TimeDelta,

    /// Added to the deadline for re-issued states and for the sweeper.
    pub network_tolerance: TimeDelta,

    /// Disconnect players who skip instead of finishing without identity.
    pub require_union_auth: bool,

    /// Browser entry point (`<external>/redirect`).
    pub auth_uri: String,

    /// Long-poll endpoint (`<external>/record`).
    pub record_uri: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_countdown: MUA_REQUEST_COUNTDOWN,
            poll_interval: POLL_INTERVAL,
            network_tolerance: NETWORK_TOLERANCE,
            require_union_auth: false,
            auth_uri: "http://localhost:58888/redirect".to_owned(),
            record_uri: "http://localhost:58888/record".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerSession
// ---------------------------------------------------------------------------

/// A player awaiting their record.
///
/// The deadline is fixed when the session is first created and survives
/// later requests for the same player, so repeated configuration packets
/// cannot stretch the budget.
#[derive(Debug, Clone)]
pub struct ServerSession<C> {
    pub deadline: DateTime<Utc>,
    pub connection: C,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Where one step of the state machine left the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A record request is out; waiting for the client.
    Awaiting,

    /// The configuration task finished. `identifier` is the union `sub`,
    /// or `None` when the player skipped.
    Finished { identifier: Option<String> },

    Disconnected(DisconnectReason),
}
