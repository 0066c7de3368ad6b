//! Deterministic binary codec for wire payloads and signed messages.
//!
//! Signatures are computed over encoded bytes, so the encoding must be
//! byte-for-byte reproducible on both sides. That rules out serde formats
//! with map ordering or float quirks; instead every type spells out its
//! field order by hand through [`Encode`] and [`Decode`].
//!
//! ## Primitives
//!
//! | Primitive | Layout |
//! |---|---|
//! | `u8` / `bool` | one byte |
//! | var-int / var-long | 7-bit groups, least significant first, high bit = "more" |
//! | fixed bytes | raw, no prefix |
//! | UTF-8 | var-int byte length, then bytes; bounded per field |
//! | UUID | 16 bytes, most significant half first |
//! | list | var-int count, then items |
//! | pair | first then second |

use uuid::Uuid;

use crate::ProtocolError;

/// Upper bound for unbounded string fields (user sub, nickname, email, URIs).
pub const MAX_STRING_LEN: usize = 32767;

/// A type with a fixed, deterministic byte encoding.
pub trait Encode {
    /// Appends this value to `buf`.
    ///
    /// # Errors
    /// Encoding can fail when a value violates a field bound (an over-long
    /// string, a hash of the wrong width). `buf` may hold a partial write
    /// afterwards and should be discarded.
    fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError>;

    /// Encodes into a fresh byte vector.
    fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Writer::new();
        self.encode(&mut buf)?;
        Ok(buf.into_bytes())
    }
}

/// A type that can be read back from its [`Encode`] form.
pub trait Decode: Sized {
    fn decode(buf: &mut Reader<'_>) -> Result<Self, ProtocolError>;

    /// Decodes a complete value, rejecting trailing bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut buf = Reader::new(bytes);
        let value = Self::decode(&mut buf)?;
        buf.finish()?;
        Ok(value)
    }
}

impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError> {
        self.0.encode(buf)?;
        self.1.encode(buf)
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode(buf: &mut Reader<'_>) -> Result<Self, ProtocolError> {
        Ok((A::decode(buf)?, B::decode(buf)?))
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError> {
        (**self).encode(buf)
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Growable output buffer.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_var_int(&mut self, value: i32) {
        self.write_leb128(u64::from(value as u32));
    }

    pub fn write_var_long(&mut self, value: i64) {
        self.write_leb128(value as u64);
    }

    fn write_leb128(&mut self, mut value: u64) {
        while value & !0x7f != 0 {
            self.buf.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a length-prefixed string of at most `max` characters.
    ///
    /// Characters are counted in UTF-16 units and the byte length may not
    /// exceed `max * 3`, which is what game clients enforce on their side.
    pub fn write_utf8(&mut self, value: &str, max: usize) -> Result<(), ProtocolError> {
        let units = value.encode_utf16().count();
        if units > max {
            return Err(ProtocolError::StringTooLong { len: units, max });
        }
        if value.len() > max * 3 {
            return Err(ProtocolError::StringTooLong {
                len: value.len(),
                max: max * 3,
            });
        }
        let len = i32::try_from(value.len()).map_err(|_| ProtocolError::StringTooLong {
            len: value.len(),
            max: max * 3,
        })?;
        self.write_var_int(len);
        self.write_bytes(value.as_bytes());
        Ok(())
    }

    pub fn write_uuid(&mut self, value: &Uuid) {
        self.write_bytes(value.as_bytes());
    }

    /// Writes a var-int count followed by each item.
    pub fn write_list<T: Encode>(&mut self, items: &[T]) -> Result<(), ProtocolError> {
        let count = i32::try_from(items.len())
            .map_err(|_| ProtocolError::InvalidMessage(format!("list too long: {}", items.len())))?;
        self.write_var_int(count);
        items.iter().try_for_each(|item| item.encode(self))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Cursor over a borrowed input buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fails with [`ProtocolError::TrailingBytes`] if anything is left.
    pub fn finish(&self) -> Result<(), ProtocolError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(ProtocolError::TrailingBytes(n)),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::UnexpectedEof {
                needed: len - self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Any non-zero byte reads as `true`.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_var_int(&mut self) -> Result<i32, ProtocolError> {
        Ok(self.read_leb128(5)? as u32 as i32)
    }

    pub fn read_var_long(&mut self) -> Result<i64, ProtocolError> {
        Ok(self.read_leb128(10)? as i64)
    }

    fn read_leb128(&mut self, max_bytes: u32) -> Result<u64, ProtocolError> {
        let mut value: u64 = 0;
        for i in 0..max_bytes {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ProtocolError::VarIntTooBig)
    }

    /// Reads a length-prefixed string of at most `max` characters.
    pub fn read_utf8(&mut self, max: usize) -> Result<String, ProtocolError> {
        let len = self.read_var_int()?;
        let len = usize::try_from(len)
            .map_err(|_| ProtocolError::InvalidMessage(format!("negative string length: {len}")))?;
        if len > max * 3 {
            return Err(ProtocolError::StringTooLong { len, max: max * 3 });
        }
        let bytes = self.read_bytes(len)?;
        let value = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
        let units = value.encode_utf16().count();
        if units > max {
            return Err(ProtocolError::StringTooLong { len: units, max });
        }
        Ok(value.to_owned())
    }

    pub fn read_uuid(&mut self) -> Result<Uuid, ProtocolError> {
        let bytes = self.read_bytes(16)?;
        Uuid::from_slice(bytes).map_err(|e| ProtocolError::InvalidMessage(e.to_string()))
    }

    /// Reads a var-int count followed by that many items.
    pub fn read_list<T: Decode>(&mut self) -> Result<Vec<T>, ProtocolError> {
        let count = self.read_var_int()?;
        let count = usize::try_from(count)
            .map_err(|_| ProtocolError::InvalidMessage(format!("negative list length: {count}")))?;
        // every item takes at least one byte; don't trust the count for allocation
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Byte(u8);

    impl Encode for Byte {
        fn encode(&self, buf: &mut Writer) -> Result<(), ProtocolError> {
            buf.write_u8(self.0);
            Ok(())
        }
    }

    impl Decode for Byte {
        fn decode(buf: &mut Reader<'_>) -> Result<Self, ProtocolError> {
            buf.read_u8().map(Byte)
        }
    }

    // =====================================================================
    // var-int / var-long
    // =====================================================================

    #[test]
    fn test_write_var_long_small_value_is_one_byte() {
        let mut w = Writer::new();
        w.write_var_long(127);
        assert_eq!(w.as_bytes(), &[0x7f]);
    }

    #[test]
    fn test_write_var_long_least_significant_group_first() {
        let mut w = Writer::new();
        w.write_var_long(300);
        // 300 = 0b10_0101100 → [0xac, 0x02]
        assert_eq!(w.as_bytes(), &[0xac, 0x02]);
    }

    #[test]
    fn test_write_var_long_epoch_seconds_is_five_bytes() {
        let mut w = Writer::new();
        w.write_var_long(1_735_689_600);
        assert_eq!(w.len(), 5);
        assert_eq!(Reader::new(w.as_bytes()).read_var_long().unwrap(), 1_735_689_600);
    }

    #[test]
    fn test_write_var_int_negative_uses_five_bytes() {
        let mut w = Writer::new();
        w.write_var_int(-1);
        assert_eq!(w.as_bytes(), &[0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(Reader::new(w.as_bytes()).read_var_int().unwrap(), -1);
    }

    #[test]
    fn test_read_var_int_too_many_continuations_returns_error() {
        let bytes = [0x80u8; 6];
        let err = Reader::new(&bytes).read_var_int().unwrap_err();
        assert_eq!(err, ProtocolError::VarIntTooBig);
    }

    #[test]
    fn test_read_var_long_truncated_returns_eof() {
        let bytes = [0x80u8, 0x80];
        let err = Reader::new(&bytes).read_var_long().unwrap_err();
        assert_eq!(err, ProtocolError::UnexpectedEof { needed: 1 });
    }

    // =====================================================================
    // strings
    // =====================================================================

    #[test]
    fn test_write_utf8_over_max_chars_returns_error() {
        let mut w = Writer::new();
        let err = w.write_utf8("seventeen_chars__", 16).unwrap_err();
        assert_eq!(err, ProtocolError::StringTooLong { len: 17, max: 16 });
    }

    #[test]
    fn test_read_utf8_round_trips_multibyte_text() {
        let mut w = Writer::new();
        w.write_utf8("登录成功", 16).unwrap();
        let mut r = Reader::new(w.as_bytes());
        assert_eq!(r.read_utf8(16).unwrap(), "登录成功");
        r.finish().unwrap();
    }

    #[test]
    fn test_read_utf8_declared_length_over_bound_returns_error() {
        let mut w = Writer::new();
        w.write_var_int(49);
        w.write_bytes(&[b'a'; 49]);
        let err = Reader::new(w.as_bytes()).read_utf8(16).unwrap_err();
        assert_eq!(err, ProtocolError::StringTooLong { len: 49, max: 48 });
    }

    #[test]
    fn test_read_utf8_too_many_chars_within_byte_bound_returns_error() {
        let mut w = Writer::new();
        w.write_var_int(20);
        w.write_bytes(&[b'a'; 20]);
        let err = Reader::new(w.as_bytes()).read_utf8(16).unwrap_err();
        assert_eq!(err, ProtocolError::StringTooLong { len: 20, max: 16 });
    }

    #[test]
    fn test_read_utf8_invalid_bytes_returns_error() {
        let bytes = [2u8, 0xc3, 0x28];
        let err = Reader::new(&bytes).read_utf8(16).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidUtf8);
    }

    // =====================================================================
    // uuid / list / pair / finish
    // =====================================================================

    #[test]
    fn test_write_uuid_is_sixteen_big_endian_bytes() {
        let id = Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);
        let mut w = Writer::new();
        w.write_uuid(&id);
        assert_eq!(w.as_bytes()[0], 0x00);
        assert_eq!(w.as_bytes()[15], 0xff);
        assert_eq!(Reader::new(w.as_bytes()).read_uuid().unwrap(), id);
    }

    #[test]
    fn test_read_list_huge_count_fails_without_allocating() {
        let mut w = Writer::new();
        w.write_var_int(i32::MAX);
        let err = Reader::new(w.as_bytes()).read_list::<Byte>().unwrap_err();
        assert_eq!(err, ProtocolError::UnexpectedEof { needed: 1 });
    }

    #[test]
    fn test_read_list_negative_count_returns_invalid_message() {
        let mut w = Writer::new();
        w.write_var_int(-3);
        let result = Reader::new(w.as_bytes()).read_list::<Byte>();
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_pair_encodes_as_concatenation() {
        let bytes = (Byte(1), Byte(2)).to_bytes().unwrap();
        assert_eq!(bytes, vec![1, 2]);
        let (a, b) = <(Byte, Byte)>::from_bytes(&bytes).unwrap();
        assert_eq!((a.0, b.0), (1, 2));
    }

    #[test]
    fn test_from_bytes_trailing_data_returns_error() {
        let err = Byte::from_bytes(&[1, 2, 3]).unwrap_err();
        assert_eq!(err, ProtocolError::TrailingBytes(2));
    }
}
