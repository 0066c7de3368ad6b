//! The OAuth `state` parameter: a signed, URL-safe bearer token.
//!
//! The server issues one per configuration attempt. It rides through the
//! browser (as the OAuth `state`), through the game client (inside the
//! record request), and back to the server (inside a cancel response).
//! Wherever it lands, the signature proves the server minted it for that
//! profile and that it has not expired.
//!
//! The two hint strings are appended by the client for the browser page
//! and are **not** covered by the signature. Never use them for anything
//! but display.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use mua2fa_protocol::{
    Decode, Encode, Hash, MAX_NAME_LEN, Profile, ProtocolError, Reader, SIGNATURE_BITS, Uuid,
    Writer, is_valid_player_name,
};

use crate::record::truncate_to_seconds;
use crate::{KeyPair, PublicKey, RecordError, Validity};

/// Maximum length of each hint, in UTF-16 units.
pub const MAX_HINT_LEN: usize = 16383;

/// base64url; emits no padding, accepts input with or without it.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    id: Uuid,
    name: String,
    expire: DateTime<Utc>,
    signature: Hash,
    cancel_hint: String,
    complete_hint: String,
}

impl OAuthState {
    /// Mints a state for `(id, name)` valid until `expire`, with empty hints.
    ///
    /// # Errors
    /// Invalid player name or an expiry not after the epoch.
    pub fn sign(
        id: Uuid,
        name: &str,
        expire: DateTime<Utc>,
        keys: &KeyPair,
    ) -> Result<Self, RecordError> {
        let profile = Profile::new(id, name)?;
        let expire = truncate_to_seconds(expire)?;
        let signature = keys.sign(expire, &profile)?;
        Ok(Self {
            id,
            name: name.to_owned(),
            expire,
            signature,
            cancel_hint: String::new(),
            complete_hint: String::new(),
        })
    }

    /// Replaces both hints. The signature is carried over untouched.
    ///
    /// # Errors
    /// [`ProtocolError::StringTooLong`] if a hint exceeds [`MAX_HINT_LEN`].
    pub fn with_hints(
        &self,
        cancel_hint: impl Into<String>,
        complete_hint: impl Into<String>,
    ) -> Result<Self, RecordError> {
        let cancel_hint = cancel_hint.into();
        let complete_hint = complete_hint.into();
        for hint in [&cancel_hint, &complete_hint] {
            let len = hint.encode_utf16().count();
            if len > MAX_HINT_LEN || hint.len() > MAX_HINT_LEN * 3 {
                return Err(ProtocolError::StringTooLong {
                    len,
                    max: MAX_HINT_LEN,
                }
                .into());
            }
        }
        Ok(Self {
            cancel_hint,
            complete_hint,
            ..self.clone()
        })
    }

    /// Checks the signature over `(profile, expire)`; hints play no part.
    pub fn verify(&self, key: &PublicKey) -> Validity {
        match Profile::new(self.id, self.name.as_str()) {
            Ok(profile) => key.verify(self.expire, &self.signature, &profile),
            Err(_) => Validity::Never,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expire(&self) -> DateTime<Utc> {
        self.expire
    }

    pub fn signature(&self) -> &Hash {
        &self.signature
    }

    pub fn cancel_hint(&self) -> &str {
        &self.cancel_hint
    }

    pub fn complete_hint(&self) -> &str {
        &self.complete_hint
    }

    /// Renders the URL-safe token form.
    pub fn to_token(&self) -> Result<String, RecordError> {
        Ok(TOKEN_ENGINE.encode(self.to_bytes()?))
    }

    /// Parses the URL-safe token form.
    pub fn from_token(token: &str) -> Result<Self, RecordError> {
        let bytes = TOKEN_ENGINE
            .decode(token)
            .map_err(|e| RecordError::InvalidToken(e.to_string()))?;
        Ok(Self::from_bytes(&bytes)?)
    }
}

impl fmt::Display for OAuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // construction keeps every field within its wire bound
        let token = self.to_token().map_err(|_| fmt::Error)?;
        f.write_str(&token)
    }
}

impl FromStr for OAuthState {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s)
    }
}

impl Encode for OAuthState {
    fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError> {
        buf.write_uuid(&self.id);
        buf.write_utf8(&self.name, MAX_NAME_LEN)?;
        buf.write_var_long(self.expire.timestamp());
        self.signature.write_fixed(buf, SIGNATURE_BITS)?;
        buf.write_utf8(&self.cancel_hint, MAX_HINT_LEN)?;
        buf.write_utf8(&self.complete_hint, MAX_HINT_LEN)
    }
}

impl Decode for OAuthState {
    fn decode(buf: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let id = buf.read_uuid()?;
        let name = buf.read_utf8(MAX_NAME_LEN)?;
        if !is_valid_player_name(&name) {
            return Err(ProtocolError::InvalidMessage(format!(
                "invalid player name: {name:?}"
            )));
        }
        let secs = buf.read_var_long()?;
        let signature = Hash::read_fixed(buf, SIGNATURE_BITS)?;
        let cancel_hint = buf.read_utf8(MAX_HINT_LEN)?;
        let complete_hint = buf.read_utf8(MAX_HINT_LEN)?;
        let expire = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("expiry out of range: {secs}")))?;
        Ok(Self {
            id,
            name,
            expire,
            signature,
            cancel_hint,
            complete_hint,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn signed(keys: &KeyPair) -> OAuthState {
        OAuthState::sign(Uuid::from_u128(42), "Steve", at(1_800_000_000), keys).unwrap()
    }

    #[test]
    fn test_sign_starts_with_empty_hints() {
        let state = signed(&KeyPair::generate());
        assert_eq!(state.cancel_hint(), "");
        assert_eq!(state.complete_hint(), "");
    }

    #[test]
    fn test_sign_truncates_subsecond_expiry() {
        let keys = KeyPair::generate();
        let expire = at(1_800_000_000) + TimeDelta::milliseconds(750);
        let state = OAuthState::sign(Uuid::nil(), "Steve", expire, &keys).unwrap();
        assert_eq!(state.expire(), at(1_800_000_000));
    }

    #[test]
    fn test_sign_invalid_name_returns_error() {
        let keys = KeyPair::generate();
        assert!(OAuthState::sign(Uuid::nil(), "no spaces allowed", at(10), &keys).is_err());
    }

    #[test]
    fn test_token_round_trip_preserves_every_field() {
        let state = signed(&KeyPair::generate())
            .with_hints("取消\nCancelled", "完成\nDone")
            .unwrap();
        let token = state.to_string();
        assert!(!token.contains('='));
        assert!(!token.contains('+') && !token.contains('/'));
        assert_eq!(token.parse::<OAuthState>().unwrap(), state);
    }

    #[test]
    fn test_from_token_accepts_padded_input() {
        let state = signed(&KeyPair::generate());
        let mut token = state.to_string();
        while token.len() % 4 != 0 {
            token.push('=');
        }
        assert_eq!(OAuthState::from_token(&token).unwrap(), state);
    }

    #[test]
    fn test_decode_invalid_name_returns_error() {
        let state = signed(&KeyPair::generate());
        let mut buf = Writer::new();
        buf.write_uuid(&state.id);
        buf.write_utf8("no spaces allowed", MAX_NAME_LEN).unwrap();
        buf.write_var_long(state.expire.timestamp());
        state.signature.write_fixed(&mut buf, SIGNATURE_BITS).unwrap();
        buf.write_utf8("", MAX_HINT_LEN).unwrap();
        buf.write_utf8("", MAX_HINT_LEN).unwrap();

        assert!(matches!(
            OAuthState::from_bytes(&buf.into_bytes()),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_from_token_garbage_returns_error() {
        assert!(matches!(
            OAuthState::from_token("not base64!"),
            Err(RecordError::InvalidToken(_))
        ));
        assert!(matches!(
            OAuthState::from_token("AAAA"),
            Err(RecordError::Protocol(_))
        ));
    }

    #[test]
    fn test_with_hints_keeps_signature_and_verification() {
        let keys = KeyPair::generate();
        let state = signed(&keys);
        let hinted = state.with_hints("a", "b").unwrap();
        assert_eq!(hinted.signature(), state.signature());
        assert_eq!(hinted.verify(&keys.public()), state.verify(&keys.public()));
        assert_eq!(hinted.verify(&keys.public()), Validity::Until(at(1_800_000_000)));
    }

    #[test]
    fn test_with_hints_over_limit_returns_error() {
        let state = signed(&KeyPair::generate());
        let long = "x".repeat(MAX_HINT_LEN + 1);
        assert!(state.with_hints(long, "").is_err());
    }

    #[test]
    fn test_verify_other_key_is_never() {
        let state = signed(&KeyPair::generate());
        assert_eq!(state.verify(&KeyPair::generate().public()), Validity::Never);
    }

    #[test]
    fn test_verify_after_expiry_is_false() {
        let keys = KeyPair::generate();
        let state = signed(&keys);
        let validity = state.verify(&keys.public());
        assert!(!validity.is_valid_at(at(1_800_000_001)));
    }
}
