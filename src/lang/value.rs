use crate::lang::word::{EncodingError, Word};
use num_bigint::BigInt;

/// A host-side value passed into a contract call.
///
/// Everything crossing into the machine is encoded to a [`Word`] first; the
/// machine itself never sees a `Value`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(BigInt),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn encode(&self) -> Result<Word, EncodingError> {
        match self {
            Value::Int(n) => Word::from_int(n),
            Value::Bool(b) => Ok(Word::from_bool(*b)),
            Value::Text(s) => Word::from_text(s),
        }
    }

    /// Parses a command-line argument: an integer, `true`/`false`, or text.
    pub fn parse_arg(arg: &str) -> Value {
        match arg {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => match arg.parse::<BigInt>() {
                Ok(n) => Value::Int(n),
                Err(_) => Value::Text(arg.to_string()),
            },
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}
