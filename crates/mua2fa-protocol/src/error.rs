//! Error types for the protocol layer.
//!
//! Every byte string that crosses a trust boundary (a base-85 key in a
//! config file, a payload from a game client, a state token from a
//! browser) is parsed by this crate. Each way that parsing can fail gets
//! its own variant, so callers can log precisely and then reject.

/// Errors that can occur while encoding or decoding wire data.
///
/// `Clone + PartialEq` are derived so tests can assert on exact variants
/// with `assert_eq!`. None of the variants carry a foreign error type,
/// which keeps that possible.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A hash whose bit count is not a multiple of 32 was handed to the
    /// base-85 encoder.
    #[error("hash width must be a positive multiple of 32 bits, got {0} bits")]
    InvalidWidth(usize),

    /// A base-85 string whose length is not a positive multiple of 5.
    #[error("base85 length must be a positive multiple of 5, got {0}")]
    InvalidLength(usize),

    /// A character outside the base-85 alphabet.
    ///
    /// The range is the 5-character group the offending character sits in,
    /// matching what the encoder emits per 32-bit word.
    #[error("invalid base85 character at index range [{start}, {end}]")]
    InvalidCharacter { start: usize, end: usize },

    /// A 5-character group whose numeric value is `>= 2^32`.
    #[error("base85 group at index {0} does not fit in 32 bits")]
    Overflow(usize),

    /// A fixed-width field (key or signature) had the wrong size.
    #[error("unexpected hash width: {actual} != {expected} bits")]
    UnexpectedWidth { expected: usize, actual: usize },

    /// The buffer ended in the middle of a field.
    #[error("unexpected end of buffer: {needed} more bytes needed")]
    UnexpectedEof { needed: usize },

    /// A length-prefixed string exceeded its per-field maximum.
    #[error("string too long: {len} > {max}")]
    StringTooLong { len: usize, max: usize },

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// A var-int or var-long ran past its maximum byte count.
    #[error("var-int is too big")]
    VarIntTooBig,

    /// Bytes were left over after decoding a complete value.
    #[error("{0} trailing bytes after decoded value")]
    TrailingBytes(usize),

    /// The message decoded structurally but violates a field rule
    /// (negative list length, bad player name, ...).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
