//! Signed records binding a game [`Profile`] to a union-auth [`User`].
//!
//! A [`Record`] carries one or more [`SignEntry`] values. Each entry is an
//! independent Ed25519 signature over `(profile, user)` with its own key
//! and expiry. Multiple entries accumulate on the client as it joins
//! servers (or as one server rotates its key), and [`Record::filter`]
//! prunes them back down.
//!
//! ```text
//! Record ─┬─ profile (uuid, name)
//!         ├─ user    (sub, nickname, email)
//!         └─ signatures: [ (key₁, expire₁, sig₁), (key₂, expire₂, sig₂), … ]
//!                          └──── each signs encode(profile, user) ‖ expire
//! ```

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use mua2fa_protocol::{
    Decode, Encode, Hash, KEY_BITS, Profile, ProtocolError, Reader, SIGNATURE_BITS, User, Uuid,
    Writer,
};
use serde::{Deserialize, Serialize};

use crate::{KeyPair, PublicKey, RecordError, Validity};

// ---------------------------------------------------------------------------
// SignEntry
// ---------------------------------------------------------------------------

/// One `(key, expiry, signature)` triple.
///
/// Construction validates widths, truncates the expiry to whole seconds,
/// and parses the key, so every entry in hand has a usable [`PublicKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignEntry {
    key_bytes: Hash,
    key: PublicKey,
    expire_at: DateTime<Utc>,
    signature: Hash,
}

impl SignEntry {
    /// # Errors
    /// - [`RecordError::Protocol`]: key not 256 bits or signature not 512 bits
    /// - [`RecordError::InvalidKey`]: key bytes are not a curve point
    /// - [`RecordError::InvalidExpiry`]: expiry not after the unix epoch
    pub fn new(
        key_bytes: Hash,
        expire_at: DateTime<Utc>,
        signature: Hash,
    ) -> Result<Self, RecordError> {
        let key = PublicKey::from_hash(&key_bytes)?;
        let expire_at = truncate_to_seconds(expire_at)?;
        signature.expect_width(SIGNATURE_BITS)?;
        Ok(Self {
            key_bytes,
            key,
            expire_at,
            signature,
        })
    }

    pub fn key_bytes(&self) -> &Hash {
        &self.key_bytes
    }

    pub fn key(&self) -> &PublicKey {
        &self.key
    }

    pub fn expire_at(&self) -> DateTime<Utc> {
        self.expire_at
    }

    pub fn signature(&self) -> &Hash {
        &self.signature
    }

    /// Checks this entry against its own embedded key.
    fn self_validity(&self, profile: &Profile, user: &User) -> Validity {
        self.key
            .verify(self.expire_at, &self.signature, &(profile, user))
    }
}

/// Truncates to whole seconds and requires the result to be after the epoch.
pub(crate) fn truncate_to_seconds(t: DateTime<Utc>) -> Result<DateTime<Utc>, RecordError> {
    let secs = t.timestamp();
    if secs <= 0 {
        return Err(RecordError::InvalidExpiry(secs));
    }
    DateTime::from_timestamp(secs, 0).ok_or(RecordError::InvalidExpiry(secs))
}

impl Encode for SignEntry {
    fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError> {
        self.key_bytes.write_fixed(buf, KEY_BITS)?;
        buf.write_var_long(self.expire_at.timestamp());
        self.signature.write_fixed(buf, SIGNATURE_BITS)
    }
}

impl Decode for SignEntry {
    fn decode(buf: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let key_bytes = Hash::read_fixed(buf, KEY_BITS)?;
        let secs = buf.read_var_long()?;
        let signature = Hash::read_fixed(buf, SIGNATURE_BITS)?;
        let expire_at = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("expiry out of range: {secs}")))?;
        Self::new(key_bytes, expire_at, signature)
            .map_err(|e| ProtocolError::InvalidMessage(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// An immutable, multi-signed binding of a profile to a user.
///
/// Serialized as JSON in the shape the `/record` endpoint returns:
///
/// ```json
/// {"id": "…uuid…", "name": "Steve",
///  "mua": {"sub": "…", "nickname": "…", "email": "…"},
///  "signatures": [{"key": "…base85…", "expire_at": 1767225600, "signature": "…base85…"}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecordFields", into = "RecordFields")]
pub struct Record {
    profile: Profile,
    user: User,
    signatures: Vec<SignEntry>,
}

impl Record {
    /// # Errors
    /// [`RecordError::NoSignatures`] if `signatures` is empty.
    pub fn new(
        profile: Profile,
        user: User,
        signatures: Vec<SignEntry>,
    ) -> Result<Self, RecordError> {
        if signatures.is_empty() {
            return Err(RecordError::NoSignatures);
        }
        Ok(Self {
            profile,
            user,
            signatures,
        })
    }

    /// Issues a record with a single signature by `keys`, valid until
    /// `expire` (truncated to whole seconds).
    pub fn sign(
        user: User,
        profile: Profile,
        expire: DateTime<Utc>,
        keys: &KeyPair,
    ) -> Result<Self, RecordError> {
        let expire = truncate_to_seconds(expire)?;
        let signature = keys.sign(expire, &(&profile, &user))?;
        let entry = SignEntry::new(keys.public().to_hash(), expire, signature)?;
        Self::new(profile, user, vec![entry])
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn signatures(&self) -> &[SignEntry] {
        &self.signatures
    }

    /// Whether any signature entry remains (only [`filter`](Self::filter)
    /// can produce a record without one).
    pub fn has_signatures(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Checks whether this record vouches for `claim` under `key`.
    ///
    /// [`Validity::Never`] unless `claim` equals the record's own profile.
    /// Otherwise the union of every entry signed by `key` whose signature
    /// checks out: valid at `t` iff some such entry has `t <= expire_at`.
    pub fn verify(&self, claim: &Profile, key: &PublicKey) -> Validity {
        if *claim != self.profile {
            return Validity::Never;
        }
        let key_bytes = key.to_hash();
        let payload = (&self.profile, &self.user);
        self.signatures
            .iter()
            .filter(|entry| entry.key_bytes == key_bytes)
            .map(|entry| key.verify(entry.expire_at, &entry.signature, &payload))
            .fold(Validity::Never, Validity::or)
    }

    /// Merges a record the server just confirmed into this one.
    ///
    /// Same profile and user: signatures are concatenated, `self` first.
    /// Anything else: the identity changed, so `newer` replaces `self`.
    pub fn refresh(&self, newer: Record) -> Record {
        if newer.profile == self.profile && newer.user == self.user {
            let mut signatures = self.signatures.clone();
            signatures.extend(newer.signatures);
            return Record {
                profile: self.profile.clone(),
                user: self.user.clone(),
                signatures,
            };
        }
        newer
    }

    /// Drops expired and forged entries, keeping one entry per key.
    ///
    /// Among valid entries sharing a key, the one with the latest expiry
    /// wins (on a tie, the later entry). Representatives keep the position
    /// where their key first appeared. When nothing is dropped the record
    /// is returned borrowed.
    ///
    /// The result may have no signatures left; check
    /// [`has_signatures`](Self::has_signatures) before storing it.
    pub fn filter(&self, now: DateTime<Utc>) -> Cow<'_, Record> {
        let mut kept: Vec<&SignEntry> = Vec::with_capacity(self.signatures.len());
        for entry in &self.signatures {
            if !entry.self_validity(&self.profile, &self.user).is_valid_at(now) {
                continue;
            }
            match kept.iter_mut().find(|k| k.key_bytes == entry.key_bytes) {
                Some(slot) if slot.expire_at > entry.expire_at => {}
                Some(slot) => *slot = entry,
                None => kept.push(entry),
            }
        }
        if kept.len() == self.signatures.len() {
            return Cow::Borrowed(self);
        }
        Cow::Owned(Record {
            profile: self.profile.clone(),
            user: self.user.clone(),
            signatures: kept.into_iter().cloned().collect(),
        })
    }
}

impl Encode for Record {
    fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError> {
        self.profile.encode(buf)?;
        self.user.encode(buf)?;
        buf.write_list(&self.signatures)
    }
}

impl Decode for Record {
    fn decode(buf: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let profile = Profile::decode(buf)?;
        let user = User::decode(buf)?;
        let signatures = buf.read_list()?;
        Self::new(profile, user, signatures)
            .map_err(|e| ProtocolError::InvalidMessage(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// JSON form
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct RecordFields {
    id: Uuid,
    name: String,
    mua: User,
    signatures: Vec<SignEntryFields>,
}

#[derive(Serialize, Deserialize)]
struct SignEntryFields {
    key: Hash,
    expire_at: i64,
    signature: Hash,
}

impl From<Record> for RecordFields {
    fn from(record: Record) -> Self {
        Self {
            id: record.profile.id(),
            name: record.profile.name().to_owned(),
            mua: record.user,
            signatures: record
                .signatures
                .into_iter()
                .map(|e| SignEntryFields {
                    key: e.key_bytes,
                    expire_at: e.expire_at.timestamp(),
                    signature: e.signature,
                })
                .collect(),
        }
    }
}

impl TryFrom<RecordFields> for Record {
    type Error = RecordError;

    fn try_from(fields: RecordFields) -> Result<Self, Self::Error> {
        let profile = Profile::new(fields.id, fields.name)?;
        let signatures = fields
            .signatures
            .into_iter()
            .map(|e| {
                let expire_at = DateTime::from_timestamp(e.expire_at, 0)
                    .ok_or(RecordError::InvalidExpiry(e.expire_at))?;
                SignEntry::new(e.key, expire_at, e.signature)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(profile, fields.mua, signatures)
    }
}
