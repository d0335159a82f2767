//! 256-bit words.
//!
//! A [`Word`] is the only value the machine knows about: literals, stack
//! entries, memory and storage cells, call arguments and jump targets are all
//! words. The encoding rules are shared by the compiler and the interpreter
//! and must stay bit-exact:
//!
//! - booleans: all zero except the low bit
//! - non-negative integers: big-endian, zero-padded on the left
//! - negative integers: two's complement over the 256-bit range
//! - short text: UTF-8 bytes, zero-padded on the right
//!
//! Decoding an integer treats any word with the top bit set (value >= 2^255)
//! as negative.

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Word size in bytes.
pub const WORD_LEN: usize = 32;

/// Largest integer magnitude a source literal may carry (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("integer {0} is not a safe integer (magnitude above 2^53 - 1)")]
    UnsafeInteger(BigInt),
    #[error("integer {0} does not fit in a 256-bit word")]
    OutOfRange(BigInt),
    #[error("text {text:?} is {len} bytes, a word holds at most 32")]
    TextTooLong { text: String, len: usize },
    #[error("invalid word hex {0:?}")]
    InvalidHex(String),
}

/// A fixed 256-bit value, stored big-endian.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Word(pub [u8; WORD_LEN]);

fn modulus() -> BigInt {
    BigInt::one() << 256
}

impl Word {
    pub const ZERO: Word = Word([0; WORD_LEN]);

    pub fn from_bool(b: bool) -> Word {
        let mut bytes = [0u8; WORD_LEN];
        bytes[WORD_LEN - 1] = b as u8;
        Word(bytes)
    }

    pub fn from_i64(n: i64) -> Word {
        let fill = if n < 0 { 0xff } else { 0x00 };
        let mut bytes = [fill; WORD_LEN];
        bytes[WORD_LEN - 8..].copy_from_slice(&n.to_be_bytes());
        Word(bytes)
    }

    pub fn from_u64(n: u64) -> Word {
        let mut bytes = [0u8; WORD_LEN];
        bytes[WORD_LEN - 8..].copy_from_slice(&n.to_be_bytes());
        Word(bytes)
    }

    pub fn from_usize(n: usize) -> Word {
        Word::from_u64(n as u64)
    }

    /// Encodes an integer, rejecting values outside `[-2^255, 2^256)`.
    pub fn from_int(n: &BigInt) -> Result<Word, EncodingError> {
        let lower: BigInt = -(BigInt::one() << 255usize);
        if *n < lower || *n >= modulus() {
            return Err(EncodingError::OutOfRange(n.clone()));
        }
        Ok(Word::wrapping_from_int(n))
    }

    /// Encodes a source literal, which must be a safe integer.
    pub fn from_safe_int(n: &BigInt) -> Result<Word, EncodingError> {
        if n.abs() > BigInt::from(MAX_SAFE_INTEGER) {
            return Err(EncodingError::UnsafeInteger(n.clone()));
        }
        Word::from_int(n)
    }

    /// Reduces `n` modulo 2^256 and encodes the result. Arithmetic results
    /// always go through here.
    pub fn wrapping_from_int(n: &BigInt) -> Word {
        let reduced = n.mod_floor(&modulus());
        let (_, magnitude) = reduced.to_bytes_be();
        let mut bytes = [0u8; WORD_LEN];
        if !reduced.is_zero() {
            bytes[WORD_LEN - magnitude.len()..].copy_from_slice(&magnitude);
        }
        Word(bytes)
    }

    pub fn from_text(text: &str) -> Result<Word, EncodingError> {
        let raw = text.as_bytes();
        if raw.len() > WORD_LEN {
            return Err(EncodingError::TextTooLong {
                text: text.to_string(),
                len: raw.len(),
            });
        }
        let mut bytes = [0u8; WORD_LEN];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Word(bytes))
    }

    /// Parses exactly 64 hex characters, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Word, EncodingError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != WORD_LEN * 2 {
            return Err(EncodingError::InvalidHex(s.to_string()));
        }
        let mut bytes = [0u8; WORD_LEN];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| EncodingError::InvalidHex(s.to_string()))?;
        Ok(Word(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Word> {
        let array: [u8; WORD_LEN] = bytes.try_into().ok()?;
        Some(Word(array))
    }

    pub fn as_bytes(&self) -> &[u8; WORD_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_negative(&self) -> bool {
        self.0[0] & 0x80 != 0
    }

    /// Truthiness: any non-zero word is true.
    pub fn to_bool(&self) -> bool {
        self.0.iter().any(|b| *b != 0)
    }

    /// Decodes the word as a signed two's-complement integer.
    pub fn to_int(&self) -> BigInt {
        let unsigned = self.to_unsigned();
        if self.is_negative() {
            unsigned - modulus()
        } else {
            unsigned
        }
    }

    pub fn to_unsigned(&self) -> BigInt {
        BigInt::from_bytes_be(Sign::Plus, &self.0)
    }

    /// Decodes the word as an index (jump target, slot number).
    pub fn to_usize(&self) -> Option<usize> {
        if self.is_negative() {
            return None;
        }
        self.to_unsigned().to_usize()
    }

    /// Decodes the word as right-padded UTF-8 text.
    pub fn to_text(&self) -> Option<String> {
        let end = self
            .0
            .iter()
            .rposition(|b| *b != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        String::from_utf8(self.0[..end].to_vec()).ok()
    }

    /// Best-effort rendering for diagnostics: small integers in decimal,
    /// printable text quoted, everything else as hex.
    pub fn describe(&self) -> String {
        let n = self.to_int();
        if n.abs() <= BigInt::from(MAX_SAFE_INTEGER) {
            return n.to_string();
        }
        match self.to_text() {
            Some(text) if !text.is_empty() && text.chars().all(|c| c.is_ascii_graphic()) => {
                format!("\"{}\"", text)
            }
            _ => format!("0x{}", self.to_hex()),
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({})", self.describe())
    }
}

impl From<bool> for Word {
    fn from(b: bool) -> Self {
        Word::from_bool(b)
    }
}

impl From<i64> for Word {
    fn from(n: i64) -> Self {
        Word::from_i64(n)
    }
}

// Hex string in JSON, raw bytes in postcard.
impl Serialize for Word {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

struct WordVisitor;

impl<'de> Visitor<'de> for WordVisitor {
    type Value = Word;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a 64-character hex string or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Word, E> {
        Word::from_hex(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Word, E> {
        Ok(Word::from_u64(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Word, E> {
        Ok(Word::from_i64(v))
    }
}

impl<'de> Deserialize<'de> for Word {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(WordVisitor)
        } else {
            <[u8; WORD_LEN]>::deserialize(deserializer).map(Word)
        }
    }
}
