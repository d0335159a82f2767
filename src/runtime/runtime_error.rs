use crate::lang::word::EncodingError;
use crate::runtime::storage::StorageError;

/// Everything that can abort a deploy or a call.
///
/// Storage writes issued before the fault stay applied.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionFault {
    #[error("stack underflow: {op} at pc {pc} needs more operands")]
    StackUnderflow { op: &'static str, pc: usize },

    #[error("stack overflow: more than {limit} words")]
    StackOverflow { limit: usize },

    #[error("undefined parameter {0}")]
    UndefinedParameter(String),

    #[error("storage key {0} not found")]
    MissingStorageKey(String),

    #[error("memory slot {0} is empty")]
    MissingMemorySlot(String),

    #[error("unknown opcode {0:?}")]
    UnknownOpcode(String),

    #[error("opcode {0} requires a value")]
    MissingOperand(String),

    #[error("division by zero at pc {pc}")]
    DivisionByZero { pc: usize },

    #[error("function {0} is not defined")]
    UndefinedFunction(usize),

    #[error("function {index} takes {expected} argument(s), got {got}")]
    TooManyArguments {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("jump target {target} is outside 0..={len}")]
    JumpOutOfBounds { target: String, len: usize },

    #[error("no bytecode loaded")]
    NotLoaded,

    #[error("step limit of {0} exceeded")]
    StepLimitExceeded(usize),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),
}
