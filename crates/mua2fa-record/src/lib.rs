//! Signature algebra for MUA2FA.
//!
//! Three things live here:
//!
//! 1. **Keys** ([`KeyPair`], [`PublicKey`]): Ed25519 over raw 32-byte
//!    seeds, signing `(payload, expire)` pairs.
//! 2. **Records** ([`Record`], [`SignEntry`]): the proof a player carries
//!    from server to server: profile + user + signatures, with merge
//!    ([`Record::refresh`]) and pruning ([`Record::filter`]).
//! 3. **State tokens** ([`OAuthState`]): the signed `state` parameter that
//!    threads one login attempt through the browser.
//!
//! Verification returns a [`Validity`] instead of a `bool`, so the caller
//! decides what "now" means:
//!
//! ```rust
//! use chrono::{TimeDelta, Utc};
//! use mua2fa_protocol::{Profile, User, Uuid};
//! use mua2fa_record::{KeyPair, Record};
//!
//! let keys = KeyPair::generate();
//! let profile = Profile::new(Uuid::new_v4(), "Steve").unwrap();
//! let user = User::new("mua:42", "Steve", "steve@example.com");
//! let expire = Utc::now() + TimeDelta::days(365);
//!
//! let record = Record::sign(user, profile.clone(), expire, &keys).unwrap();
//! assert!(record.verify(&profile, &keys.public()).is_valid_at(Utc::now()));
//! ```

mod ed25519;
mod error;
mod record;
mod state;
mod timing;
mod validity;

pub use ed25519::{KeyPair, PublicKey};
pub use error::RecordError;
pub use record::{Record, SignEntry};
pub use state::{MAX_HINT_LEN, OAuthState};
pub use timing::{NETWORK_TOLERANCE, POLL_INTERVAL};
pub use validity::Validity;
