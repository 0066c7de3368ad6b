//! Ed25519 keys and the `(payload, expire)` signing scheme.
//!
//! A signature never covers just the payload. The signed message is
//!
//! ```text
//! encode(payload) ‖ var_long(expire as unix seconds)
//! ```
//!
//! so the expiry cannot be extended without the private key, and the same
//! payload signed for two expiries yields two unrelated signatures.
//!
//! Keys are serialized as raw 32-byte values: the private half as its seed,
//! the public half as its compressed point. There is no PKCS#8/X.509
//! wrapping anywhere.

use std::fmt;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use mua2fa_protocol::{Encode, Hash, KEY_BITS, SIGNATURE_BITS, Writer};
use rand::Rng;

use crate::{RecordError, Validity};

// ---------------------------------------------------------------------------
// KeyPair
// ---------------------------------------------------------------------------

/// A signing key with its public half.
///
/// `Debug` deliberately prints only the public key.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generates a fresh keypair from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let seed: [u8; 32] = rand::rng().random();
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// Derives the keypair from its 32-byte seed.
    ///
    /// # Errors
    /// [`RecordError::Protocol`] if `seed` is not exactly 256 bits.
    pub fn from_seed(seed: &Hash) -> Result<Self, RecordError> {
        let bytes = fixed::<32>(seed, KEY_BITS)?;
        Ok(Self {
            signing: SigningKey::from_bytes(&bytes),
        })
    }

    /// The serialized form: the private seed.
    pub fn seed(&self) -> Hash {
        Hash::from_bytes(self.signing.to_bytes())
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key())
    }

    /// Signs `payload` bound to `expire`.
    ///
    /// # Errors
    /// Fails only if `payload` cannot be encoded.
    pub fn sign<T: Encode + ?Sized>(
        &self,
        expire: DateTime<Utc>,
        payload: &T,
    ) -> Result<Hash, RecordError> {
        let message = signed_message(payload, expire)?;
        let signature = self.signing.sign(&message);
        Ok(Hash::from_bytes(signature.to_bytes()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// An Ed25519 verifying key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parses a raw 32-byte compressed point.
    ///
    /// # Errors
    /// - [`RecordError::Protocol`]: wrong width
    /// - [`RecordError::InvalidKey`]: the bytes are not a curve point
    pub fn from_hash(bytes: &Hash) -> Result<Self, RecordError> {
        let bytes = fixed::<32>(bytes, KEY_BITS)?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|e| RecordError::InvalidKey(e.to_string()))
    }

    /// The serialized form: the compressed point.
    pub fn to_hash(&self) -> Hash {
        Hash::from_bytes(self.0.to_bytes())
    }

    /// Checks `signature` over `(payload, expire)`.
    ///
    /// Returns [`Validity::Until`]`(expire)` when the signature is good and
    /// [`Validity::Never`] for every kind of failure.
    pub fn verify<T: Encode + ?Sized>(
        &self,
        expire: DateTime<Utc>,
        signature: &Hash,
        payload: &T,
    ) -> Validity {
        let Ok(bytes) = fixed::<64>(signature, SIGNATURE_BITS) else {
            return Validity::Never;
        };
        let signature = Signature::from_bytes(&bytes);
        let message = match signed_message(payload, expire) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "payload not encodable, rejecting signature");
                return Validity::Never;
            }
        };
        match self.0.verify_strict(&message, &signature) {
            Ok(()) => Validity::Until(expire),
            Err(_) => Validity::Never,
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hash())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn signed_message<T: Encode + ?Sized>(
    payload: &T,
    expire: DateTime<Utc>,
) -> Result<Vec<u8>, RecordError> {
    let mut buf = Writer::new();
    payload.encode(&mut buf)?;
    buf.write_var_long(expire.timestamp());
    Ok(buf.into_bytes())
}

fn fixed<const N: usize>(hash: &Hash, bits: usize) -> Result<[u8; N], RecordError> {
    hash.expect_width(bits)?;
    let mut out = [0u8; N];
    out.copy_from_slice(hash.as_bytes());
    Ok(out)
}
