//! Clock slack shared by the game server, the HTTP layer and the client.

use chrono::TimeDelta;

/// How long one `/record` poll waits for a login, and the slack added to
/// a freshly issued state so the poll still verifies at its last instant.
pub const POLL_INTERVAL: TimeDelta = TimeDelta::seconds(5);

/// Grace for packets and requests in flight around a deadline.
pub const NETWORK_TOLERANCE: TimeDelta = TimeDelta::seconds(30);
