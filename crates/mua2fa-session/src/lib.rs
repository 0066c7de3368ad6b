//! Configuration-phase sessions for MUA2FA.
//!
//! While a player is in the configuration phase the server holds them in
//! a [`SessionManager`] until they either prove a union identity, skip the
//! second factor, or run out of time:
//!
//! 1. **Sessions** ([`SessionManager`], [`ServerSession`]): deadlines,
//!    record verification, cancel handling, timeout sweeping.
//! 2. **Identifiers**: the `sub` each finished player proved, queried
//!    through [`MuaSelector`] for command targeting.
//!
//! # How it fits in the stack
//!
//! ```text
//! mua2fa (server loop, above)   ← feeds events and ticks in
//!     ↕
//! Session layer (this crate)    ← decides what each player sees next
//!     ↕
//! Transport / record (below)    ← payloads, signatures
//! ```

mod error;
mod manager;
mod selector;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use selector::{Matcher, MuaSelector};
pub use session::{MUA_REQUEST_COUNTDOWN, Outcome, ServerSession, SessionConfig};
