//! Wire-level building blocks for MUA2FA.
//!
//! This crate defines the bytes that get signed and the bytes that travel
//! between game server and game client:
//!
//! - **Base-85** ([`base85`]): the text form of keys and signatures.
//! - **Hashes** ([`Hash`]): fixed-width opaque byte strings.
//! - **Codec** ([`Encode`], [`Decode`], [`Writer`], [`Reader`]): the
//!   deterministic binary encoding every signature is computed over.
//! - **Types** ([`Profile`], [`User`]): the two identities a record binds.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! record (signs encoded bytes) → protocol (this crate) ← transport (payloads)
//! ```
//!
//! Nothing here knows about keys, time, or networking.

pub mod base85;
mod codec;
mod error;
mod hash;
mod types;

pub use codec::{Decode, Encode, MAX_STRING_LEN, Reader, Writer};
pub use error::ProtocolError;
pub use hash::{Hash, KEY_BITS, SIGNATURE_BITS};
pub use types::{MAX_NAME_LEN, Profile, User, is_valid_player_name};

/// Re-exported so dependents name the same `Uuid` type.
pub use uuid::Uuid;
