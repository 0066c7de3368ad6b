//! The four configuration-phase payloads and their wire form.
//!
//! Every payload travels as a [`Frame`]: a namespaced id followed by the
//! encoded body.
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │ id: utf8 ("mua2fa:<path>")   │ body: payload-specific bytes │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```

use chrono::TimeDelta;
use mua2fa_protocol::{
    Decode, Encode, Hash, KEY_BITS, MAX_STRING_LEN, ProtocolError, Reader, Writer,
};
use mua2fa_record::{OAuthState, PublicKey, Record};

use crate::TransportError;

pub const REQUEST_RECORD_ID: &str = "mua2fa:request_for_client_record";
pub const REQUEST_REFRESH_ID: &str = "mua2fa:request_for_client_refresh";
pub const RESPONSE_RECORD_ID: &str = "mua2fa:response_to_server_record";
pub const RESPONSE_CANCEL_ID: &str = "mua2fa:response_to_server_cancel";

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A payload id together with its undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: String,
    pub body: Vec<u8>,
}

impl Encode for Frame {
    fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError> {
        buf.write_utf8(&self.id, MAX_STRING_LEN)?;
        buf.write_bytes(&self.body);
        Ok(())
    }
}

impl Decode for Frame {
    fn decode(buf: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let id = buf.read_utf8(MAX_STRING_LEN)?;
        let body = buf.read_bytes(buf.remaining())?.to_vec();
        Ok(Self { id, body })
    }
}

// ---------------------------------------------------------------------------
// RequestRecord
// ---------------------------------------------------------------------------

/// The server's challenge: "prove an identity signed by `key`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    /// The server's public key; a cached record must verify under it.
    pub key: PublicKey,
    /// Time left before the server gives up, carried in milliseconds.
    /// Never negative on the wire.
    pub duration: TimeDelta,
    /// Ignore any cached record and run the browser flow.
    pub force_refresh: bool,
    pub auth_uri: String,
    pub record_uri: String,
    pub state: OAuthState,
}

impl Encode for RequestRecord {
    fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError> {
        self.key.to_hash().write_fixed(buf, KEY_BITS)?;
        buf.write_var_long(self.duration.num_milliseconds().max(0));
        buf.write_bool(self.force_refresh);
        buf.write_utf8(&self.auth_uri, MAX_STRING_LEN)?;
        buf.write_utf8(&self.record_uri, MAX_STRING_LEN)?;
        self.state.encode(buf)
    }
}

impl Decode for RequestRecord {
    fn decode(buf: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        let key = PublicKey::from_hash(&Hash::read_fixed(buf, KEY_BITS)?)
            .map_err(|e| ProtocolError::InvalidMessage(e.to_string()))?;
        let millis = buf.read_var_long()?;
        let duration = TimeDelta::try_milliseconds(millis)
            .filter(|d| *d >= TimeDelta::zero())
            .ok_or_else(|| {
                ProtocolError::InvalidMessage(format!("duration out of range: {millis} ms"))
            })?;
        let force_refresh = buf.read_bool()?;
        let auth_uri = buf.read_utf8(MAX_STRING_LEN)?;
        let record_uri = buf.read_utf8(MAX_STRING_LEN)?;
        let state = OAuthState::decode(buf)?;
        Ok(Self {
            key,
            duration,
            force_refresh,
            auth_uri,
            record_uri,
            state,
        })
    }
}

// ---------------------------------------------------------------------------
// Directional enums
// ---------------------------------------------------------------------------

/// Server → client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientboundPayload {
    RequestRecord(RequestRecord),
    /// The server accepted this record; merge it into the local store.
    RequestRefresh(Record),
}

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerboundPayload {
    ResponseRecord(Record),
    ResponseCancel(OAuthState),
}

impl ClientboundPayload {
    pub fn id(&self) -> &'static str {
        match self {
            Self::RequestRecord(_) => REQUEST_RECORD_ID,
            Self::RequestRefresh(_) => REQUEST_REFRESH_ID,
        }
    }

    pub fn to_frame(&self) -> Result<Frame, TransportError> {
        let body = match self {
            Self::RequestRecord(request) => request.to_bytes()?,
            Self::RequestRefresh(record) => record.to_bytes()?,
        };
        Ok(Frame {
            id: self.id().to_owned(),
            body,
        })
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, TransportError> {
        match frame.id.as_str() {
            REQUEST_RECORD_ID => Ok(Self::RequestRecord(RequestRecord::from_bytes(&frame.body)?)),
            REQUEST_REFRESH_ID => Ok(Self::RequestRefresh(Record::from_bytes(&frame.body)?)),
            other => Err(TransportError::UnknownPayload(other.to_owned())),
        }
    }
}

impl ServerboundPayload {
    pub fn id(&self) -> &'static str {
        match self {
            Self::ResponseRecord(_) => RESPONSE_RECORD_ID,
            Self::ResponseCancel(_) => RESPONSE_CANCEL_ID,
        }
    }

    pub fn to_frame(&self) -> Result<Frame, TransportError> {
        let body = match self {
            Self::ResponseRecord(record) => record.to_bytes()?,
            Self::ResponseCancel(state) => state.to_bytes()?,
        };
        Ok(Frame {
            id: self.id().to_owned(),
            body,
        })
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, TransportError> {
        match frame.id.as_str() {
            RESPONSE_RECORD_ID => Ok(Self::ResponseRecord(Record::from_bytes(&frame.body)?)),
            RESPONSE_CANCEL_ID => Ok(Self::ResponseCancel(OAuthState::from_bytes(&frame.body)?)),
            other => Err(TransportError::UnknownPayload(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use mua2fa_protocol::{Profile, User, Uuid};
    use mua2fa_record::KeyPair;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn request(keys: &KeyPair) -> RequestRecord {
        RequestRecord {
            key: keys.public(),
            duration: TimeDelta::seconds(180),
            force_refresh: true,
            auth_uri: "http://localhost:58888/redirect".into(),
            record_uri: "http://localhost:58888/record".into(),
            state: OAuthState::sign(Uuid::from_u128(1), "Steve", at(1_800_000_000), keys)
                .unwrap(),
        }
    }

    #[test]
    fn test_request_record_layout_starts_with_key_then_millis() {
        let keys = KeyPair::generate();
        let bytes = request(&keys).to_bytes().unwrap();
        assert_eq!(&bytes[..32], keys.public().to_hash().as_bytes());

        let mut reader = Reader::new(&bytes[32..]);
        assert_eq!(reader.read_var_long().unwrap(), 180_000);
        assert!(reader.read_bool().unwrap());
    }

    #[test]
    fn test_request_record_negative_duration_encodes_as_zero() {
        let keys = KeyPair::generate();
        let mut req = request(&keys);
        req.duration = TimeDelta::milliseconds(-1500);
        let back = RequestRecord::from_bytes(&req.to_bytes().unwrap()).unwrap();
        assert_eq!(back.duration, TimeDelta::zero());
    }

    /// A request body whose duration field holds `millis` verbatim.
    fn raw_request(keys: &KeyPair, millis: i64) -> Vec<u8> {
        let req = request(keys);
        let mut buf = Writer::new();
        req.key.to_hash().write_fixed(&mut buf, KEY_BITS).unwrap();
        buf.write_var_long(millis);
        buf.write_bool(req.force_refresh);
        buf.write_utf8(&req.auth_uri, MAX_STRING_LEN).unwrap();
        buf.write_utf8(&req.record_uri, MAX_STRING_LEN).unwrap();
        req.state.encode(&mut buf).unwrap();
        buf.into_bytes()
    }

    #[test]
    fn test_request_record_decode_out_of_range_duration_returns_error() {
        let keys = KeyPair::generate();
        for millis in [i64::MIN, -1] {
            assert!(matches!(
                RequestRecord::from_bytes(&raw_request(&keys, millis)),
                Err(ProtocolError::InvalidMessage(_))
            ));
        }
    }

    #[test]
    fn test_request_record_decode_max_duration_does_not_panic() {
        let keys = KeyPair::generate();
        let back = RequestRecord::from_bytes(&raw_request(&keys, i64::MAX)).unwrap();
        assert_eq!(back.duration.num_milliseconds(), i64::MAX);
    }

    #[test]
    fn test_from_frame_clientbound_round_trip() {
        let keys = KeyPair::generate();
        let payload = ClientboundPayload::RequestRecord(request(&keys));
        let frame = Frame::from_bytes(&payload.to_frame().unwrap().to_bytes().unwrap()).unwrap();
        assert_eq!(frame.id, REQUEST_RECORD_ID);
        assert_eq!(ClientboundPayload::from_frame(&frame).unwrap(), payload);
    }

    #[test]
    fn test_from_frame_serverbound_record() {
        let keys = KeyPair::generate();
        let profile = Profile::new(Uuid::from_u128(1), "Steve").unwrap();
        let user = User::new("mua:1", "Steve", "s@example.com");
        let record = Record::sign(user, profile, at(1_800_000_000), &keys).unwrap();
        let payload = ServerboundPayload::ResponseRecord(record);
        let frame = payload.to_frame().unwrap();
        assert_eq!(frame.id, RESPONSE_RECORD_ID);
        assert_eq!(ServerboundPayload::from_frame(&frame).unwrap(), payload);
    }

    #[test]
    fn test_from_frame_cancel_body_is_state_only() {
        let keys = KeyPair::generate();
        let state = request(&keys).state;
        let frame = ServerboundPayload::ResponseCancel(state.clone())
            .to_frame()
            .unwrap();
        assert_eq!(frame.body, state.to_bytes().unwrap());
    }

    #[test]
    fn test_from_frame_wrong_direction_returns_error() {
        let keys = KeyPair::generate();
        let frame = ClientboundPayload::RequestRecord(request(&keys))
            .to_frame()
            .unwrap();
        assert!(matches!(
            ServerboundPayload::from_frame(&frame),
            Err(TransportError::UnknownPayload(_))
        ));
    }

    #[test]
    fn test_from_frame_truncated_body_returns_error() {
        let keys = KeyPair::generate();
        let mut frame = ClientboundPayload::RequestRecord(request(&keys))
            .to_frame()
            .unwrap();
        frame.body.truncate(40);
        assert!(matches!(
            ClientboundPayload::from_frame(&frame),
            Err(TransportError::Protocol(_))
        ));
    }
}
