//! The game-client half of MUA2FA.
//!
//! - [`RecordStore`] keeps `mua2fa.dat`, the record this install holds or
//!   the player's prompt preference, and saves it atomically with a
//!   `mua2fa.dat_old` backup.
//! - [`ClientFlow`] answers the server's record requests: straight from the
//!   store when it can, otherwise through a [`Prompt`] that ends in a
//!   browser login, a skip, or a timeout.

mod error;
mod flow;
mod store;

pub use error::ClientError;
pub use flow::{Browser, CLIENT_POLL_INTERVAL, ClientFlow, Hints, Prompt, Reaction, SystemBrowser};
pub use store::{BACKUP_FILE, ClientData, DATA_FILE, EmptyState, RecordStore};
