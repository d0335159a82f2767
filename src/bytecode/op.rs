use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::lang::word::Word;
use crate::runtime::runtime_error::ExecutionFault;

// =============================================================================
// OP - Bytecode instructions
// =============================================================================

/// One machine instruction.
///
/// Binary operators pop the right operand first, then the left.
/// Jump targets are absolute indices into the instruction list being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // literals
    Push(Word),
    /// Push the call-scoped memory value stored under this key.
    PushParam(Word),
    Pop,

    // storage ( value addr -- ) / ( addr -- value )
    Sload,
    Sstore,

    // memory
    Mload,
    Mstore,

    Hash256,

    // arithmetic
    Add,
    Subtract,
    Multiply,
    /// Ceiling division.
    Divide,
    Modulo,

    // logic, no short-circuit
    And,
    Or,

    // comparison
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanEqual,
    LessThanEqual,

    // control flow
    /// ( target -- )
    Jump,
    /// ( target cond -- ), jumps when `cond` is false.
    Jumpi,
}

impl Op {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Push(_) => "PUSH",
            Op::PushParam(_) => "PUSH_PARAM",
            Op::Pop => "POP",
            Op::Sload => "SLOAD",
            Op::Sstore => "SSTORE",
            Op::Mload => "MLOAD",
            Op::Mstore => "MSTORE",
            Op::Hash256 => "HASH256",
            Op::Add => "ADD",
            Op::Subtract => "SUBTRACT",
            Op::Multiply => "MULTIPLY",
            Op::Divide => "DIVIDE",
            Op::Modulo => "MODULO",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Equal => "EQUAL",
            Op::NotEqual => "NOT_EQUAL",
            Op::GreaterThan => "GREATER_THAN",
            Op::LessThan => "LESS_THAN",
            Op::GreaterThanEqual => "GREATER_THAN_EQUAL",
            Op::LessThanEqual => "LESS_THAN_EQUAL",
            Op::Jump => "JUMP",
            Op::Jumpi => "JUMPI",
        }
    }

    pub fn operand(&self) -> Option<Word> {
        match self {
            Op::Push(w) | Op::PushParam(w) => Some(*w),
            _ => None,
        }
    }

    /// `(pops, pushes)`.
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Op::Push(_) | Op::PushParam(_) => (0, 1),
            Op::Pop | Op::Jump => (1, 0),
            Op::Sload | Op::Mload | Op::Hash256 => (1, 1),
            Op::Sstore | Op::Mstore | Op::Jumpi => (2, 0),
            Op::Add
            | Op::Subtract
            | Op::Multiply
            | Op::Divide
            | Op::Modulo
            | Op::And
            | Op::Or
            | Op::Equal
            | Op::NotEqual
            | Op::GreaterThan
            | Op::LessThan
            | Op::GreaterThanEqual
            | Op::LessThanEqual => (2, 1),
        }
    }

    /// Rebuilds an instruction from its mnemonic and optional operand.
    ///
    /// An operand given to an operand-less opcode is ignored.
    pub fn from_parts(opcode: &str, value: Option<Word>) -> Result<Op, ExecutionFault> {
        let with_operand = |make: fn(Word) -> Op| {
            value
                .map(make)
                .ok_or_else(|| ExecutionFault::MissingOperand(opcode.to_string()))
        };

        Ok(match opcode {
            "PUSH" => with_operand(Op::Push)?,
            "PUSH_PARAM" => with_operand(Op::PushParam)?,
            "POP" => Op::Pop,
            "SLOAD" => Op::Sload,
            "SSTORE" => Op::Sstore,
            "MLOAD" => Op::Mload,
            "MSTORE" => Op::Mstore,
            "HASH256" => Op::Hash256,
            "ADD" => Op::Add,
            "SUBTRACT" => Op::Subtract,
            "MULTIPLY" => Op::Multiply,
            "DIVIDE" => Op::Divide,
            "MODULO" => Op::Modulo,
            "AND" => Op::And,
            "OR" => Op::Or,
            "EQUAL" => Op::Equal,
            "NOT_EQUAL" => Op::NotEqual,
            "GREATER_THAN" => Op::GreaterThan,
            "LESS_THAN" => Op::LessThan,
            "GREATER_THAN_EQUAL" => Op::GreaterThanEqual,
            "LESS_THAN_EQUAL" => Op::LessThanEqual,
            "JUMP" => Op::Jump,
            "JUMPI" => Op::Jumpi,
            other => return Err(ExecutionFault::UnknownOpcode(other.to_string())),
        })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand() {
            Some(w) => write!(f, "{} {}", self.mnemonic(), w.describe()),
            None => write!(f, "{}", self.mnemonic()),
        }
    }
}

/// Untyped instruction as it appears on the wire, before the opcode is
/// checked against the instruction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInstruction {
    pub opcode: String,
    #[serde(default)]
    pub value: Option<Word>,
}

impl From<&Op> for RawInstruction {
    fn from(op: &Op) -> Self {
        RawInstruction {
            opcode: op.mnemonic().to_string(),
            value: op.operand(),
        }
    }
}

impl TryFrom<RawInstruction> for Op {
    type Error = ExecutionFault;

    fn try_from(raw: RawInstruction) -> Result<Op, ExecutionFault> {
        Op::from_parts(&raw.opcode, raw.value)
    }
}

// JSON omits `value` on operand-less opcodes; postcard needs a fixed shape.
impl Serialize for Op {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            let operand = self.operand();
            let mut map = serializer.serialize_map(Some(1 + usize::from(operand.is_some())))?;
            map.serialize_entry("opcode", self.mnemonic())?;
            if let Some(value) = operand {
                map.serialize_entry("value", &value)?;
            }
            map.end()
        } else {
            RawInstruction::from(self).serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Op {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawInstruction::deserialize(deserializer)?;
        Op::try_from(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape_with_operand() {
        let json = serde_json::to_string(&Op::Push(Word::from_i64(7))).unwrap();
        assert_eq!(
            json,
            format!(r#"{{"opcode":"PUSH","value":"{}"}}"#, Word::from_i64(7).to_hex())
        );
    }

    #[test]
    fn test_json_shape_without_operand() {
        let json = serde_json::to_string(&Op::Sstore).unwrap();
        assert_eq!(json, r#"{"opcode":"SSTORE"}"#);
    }

    #[test]
    fn test_json_accepts_numeric_value() {
        let op: Op = serde_json::from_str(r#"{"opcode":"PUSH","value":12}"#).unwrap();
        assert_eq!(op, Op::Push(Word::from_i64(12)));
    }

    #[test]
    fn test_unknown_opcode() {
        let err = Op::from_parts("RETURN", None).unwrap_err();
        assert!(matches!(err, ExecutionFault::UnknownOpcode(name) if name == "RETURN"));
    }

    #[test]
    fn test_missing_operand() {
        let err = Op::from_parts("PUSH_PARAM", None).unwrap_err();
        assert!(matches!(err, ExecutionFault::MissingOperand(name) if name == "PUSH_PARAM"));
    }

    #[test]
    fn test_postcard_round_trip() {
        let ops = vec![
            Op::Push(Word::from_i64(-1)),
            Op::PushParam(Word::from_text("key").unwrap()),
            Op::Jumpi,
        ];
        let bytes = postcard::to_allocvec(&ops).unwrap();
        let back: Vec<Op> = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, ops);
    }

    #[test]
    fn test_display() {
        assert_eq!(Op::Push(Word::from_i64(3)).to_string(), "PUSH 3");
        assert_eq!(Op::GreaterThanEqual.to_string(), "GREATER_THAN_EQUAL");
    }
}
