//! Identity types shared by every layer: the game-side [`Profile`] and the
//! identity-provider [`User`].
//!
//! Both types have two forms:
//! - **wire** ([`Encode`]/[`Decode`]): used inside signed messages and
//!   game payloads, so the byte layout is fixed;
//! - **JSON** (serde): used on the HTTP surface and in the client store.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{Decode, Encode, MAX_STRING_LEN, Reader, Writer};
use crate::ProtocolError;

/// Maximum length of a player name.
pub const MAX_NAME_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A game-side player identity: UUID plus display name.
///
/// The name follows the game's player-name policy: at most 16 characters,
/// each printable ASCII other than space. Construction enforces this, so a
/// `Profile` in hand is always wire-encodable.
///
/// Equality compares both fields. A record issued to `(id, "Alice")` does
/// not verify for `(id, "alice")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ProfileFields")]
pub struct Profile {
    id: Uuid,
    name: String,
}

#[derive(Deserialize)]
struct ProfileFields {
    id: Uuid,
    name: String,
}

impl TryFrom<ProfileFields> for Profile {
    type Error = ProtocolError;

    fn try_from(fields: ProfileFields) -> Result<Self, Self::Error> {
        Self::new(fields.id, fields.name)
    }
}

impl Profile {
    /// Creates a profile after validating the name.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] for an over-long name or one with
    /// whitespace, control, or non-ASCII characters.
    pub fn new(id: Uuid, name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        if !is_valid_player_name(&name) {
            return Err(ProtocolError::InvalidMessage(format!(
                "invalid player name: {name:?}"
            )));
        }
        Ok(Self { id, name })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Player names: ≤ 16 characters, each in `'!'..='~'`.
pub fn is_valid_player_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && name.bytes().all(|b| (0x21..0x7f).contains(&b))
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

impl Encode for Profile {
    fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError> {
        buf.write_uuid(&self.id);
        buf.write_utf8(&self.name, MAX_NAME_LEN)
    }
}

impl Decode for Profile {
    fn decode(buf: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let id = buf.read_uuid()?;
        let name = buf.read_utf8(MAX_NAME_LEN)?;
        Self::new(id, name)
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An identity on the union auth host.
///
/// `sub` is the provider's stable identifier and the only field used for
/// command-selector matching; `nickname` and `email` are informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub sub: String,
    pub nickname: String,
    pub email: String,
}

impl User {
    pub fn new(
        sub: impl Into<String>,
        nickname: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            sub: sub.into(),
            nickname: nickname.into(),
            email: email.into(),
        }
    }
}

impl Encode for User {
    fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError> {
        buf.write_utf8(&self.sub, MAX_STRING_LEN)?;
        buf.write_utf8(&self.nickname, MAX_STRING_LEN)?;
        buf.write_utf8(&self.email, MAX_STRING_LEN)
    }
}

impl Decode for User {
    fn decode(buf: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            sub: buf.read_utf8(MAX_STRING_LEN)?,
            nickname: buf.read_utf8(MAX_STRING_LEN)?,
            email: buf.read_utf8(MAX_STRING_LEN)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Profile {
        Profile::new(Uuid::from_u128(1), "Alice").unwrap()
    }

    // =====================================================================
    // Profile
    // =====================================================================

    #[test]
    fn test_profile_new_accepts_sixteen_chars() {
        assert!(Profile::new(Uuid::nil(), "abcdefghijklmnop").is_ok());
    }

    #[test]
    fn test_profile_new_rejects_long_or_spaced_names() {
        assert!(Profile::new(Uuid::nil(), "abcdefghijklmnopq").is_err());
        assert!(Profile::new(Uuid::nil(), "has space").is_err());
        assert!(Profile::new(Uuid::nil(), "ünïcode").is_err());
    }

    #[test]
    fn test_profile_wire_layout_is_uuid_then_name() {
        let bytes = alice().to_bytes().unwrap();
        assert_eq!(bytes.len(), 16 + 1 + 5);
        assert_eq!(&bytes[..16], Uuid::from_u128(1).as_bytes());
        assert_eq!(bytes[16], 5);
        assert_eq!(&bytes[17..], b"Alice");
    }

    #[test]
    fn test_profile_decode_rejects_invalid_name_on_wire() {
        let mut w = Writer::new();
        w.write_uuid(&Uuid::nil());
        w.write_utf8("bad name", 16).unwrap();
        assert!(Profile::from_bytes(w.as_bytes()).is_err());
    }

    #[test]
    fn test_profile_json_validates_name() {
        let ok = r#"{"id":"00000000-0000-0000-0000-000000000001","name":"Alice"}"#;
        assert_eq!(serde_json::from_str::<Profile>(ok).unwrap(), alice());
        let bad = r#"{"id":"00000000-0000-0000-0000-000000000001","name":"A l"}"#;
        assert!(serde_json::from_str::<Profile>(bad).is_err());
    }

    // =====================================================================
    // User
    // =====================================================================

    #[test]
    fn test_user_wire_round_trip() {
        let user = User::new("mua:42", "Steve", "steve@example.com");
        let bytes = user.to_bytes().unwrap();
        assert_eq!(User::from_bytes(&bytes).unwrap(), user);
    }

    #[test]
    fn test_user_json_requires_all_fields() {
        let missing = r#"{"sub":"mua:42","nickname":"Steve"}"#;
        assert!(serde_json::from_str::<User>(missing).is_err());
    }
}
