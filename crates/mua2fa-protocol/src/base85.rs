//! Fixed-alphabet base-85 codec for 32-bit aligned byte strings.
//!
//! Each big-endian 32-bit word becomes exactly five characters, most
//! significant digit first. The alphabet avoids quotes, backslash, comma,
//! and whitespace, so encoded keys survive TOML, JSON, and URLs untouched.
//!
//! ```text
//! bytes:  [de ad be ef]        → u32 0xDEADBEEF
//! digits: v/85⁴ v/85³ v/85² v/85 v   (each mod 85)
//! chars:  ALPHABET[digit] × 5
//! ```

use crate::ProtocolError;

/// Digits, upper case, lower case, then the 23 symbols, in that order.
const ALPHABET: &[u8; 85] = b"0123456789\
ABCDEFGHIJKLMNOPQRSTUVWXYZ\
abcdefghijklmnopqrstuvwxyz\
!#$%&()*+-;<=>?@^_`{|}~";

const DIVISORS: [u32; 5] = [85 * 85 * 85 * 85, 85 * 85 * 85, 85 * 85, 85, 1];

/// Encodes `bytes` into base-85.
///
/// # Errors
/// [`ProtocolError::InvalidWidth`] unless the input is a non-empty
/// multiple of four bytes.
pub fn encode(bytes: &[u8]) -> Result<String, ProtocolError> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(ProtocolError::InvalidWidth(bytes.len() * 8));
    }
    let mut out = String::with_capacity(bytes.len() / 4 * 5);
    for word in bytes.chunks_exact(4) {
        let value = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
        for divisor in DIVISORS {
            out.push(char::from(ALPHABET[(value / divisor % 85) as usize]));
        }
    }
    Ok(out)
}

/// Decodes a base-85 string back into bytes.
///
/// # Errors
/// - [`ProtocolError::InvalidLength`]: length is not a positive multiple of 5
/// - [`ProtocolError::InvalidCharacter`]: a character outside the alphabet
/// - [`ProtocolError::Overflow`]: a group encodes a value `>= 2^32`
pub fn decode(text: &str) -> Result<Vec<u8>, ProtocolError> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chars.len() % 5 != 0 {
        return Err(ProtocolError::InvalidLength(chars.len()));
    }
    let mut out = Vec::with_capacity(chars.len() / 5 * 4);
    for (group, digits) in chars.chunks_exact(5).enumerate() {
        let start = group * 5;
        let mut value: u64 = 0;
        for &c in digits {
            let digit = digit_of(c).ok_or(ProtocolError::InvalidCharacter {
                start,
                end: start + 4,
            })?;
            value = value * 85 + u64::from(digit);
        }
        let word = u32::try_from(value).map_err(|_| ProtocolError::Overflow(start))?;
        out.extend_from_slice(&word.to_be_bytes());
    }
    Ok(out)
}

fn digit_of(c: char) -> Option<u8> {
    let byte = u8::try_from(c).ok()?;
    ALPHABET.iter().position(|&a| a == byte).map(|p| p as u8)
}
