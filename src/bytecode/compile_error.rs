use crate::frontend::lexer::LexError;
use crate::frontend::parser_error::ParseError;
use crate::lang::word::EncodingError;

/// Any failure between source text and bytecode. No partial bytecode is
/// ever returned alongside one of these.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Two top-level declarations share a name.
    #[error("'{name}' is declared more than once")]
    DuplicateDeclaration { name: String },

    /// A function lists the same parameter name twice.
    #[error("function '{function}' declares parameter '{name}' more than once")]
    DuplicateParameter { function: String, name: String },

    /// A parameter named after a storage variable or mapping. Storage
    /// resolves first, so the argument could never be read.
    #[error("parameter '{name}' of function '{function}' is hidden by the contract-level '{name}'")]
    ShadowedParameter { function: String, name: String },

    /// Left side of `=` is not an identifier or mapping access.
    #[error("cannot assign to {target}")]
    InvalidAssignmentTarget { target: String },

    /// `name[...]` where `name` is not a declared mapping.
    #[error("'{name}' is not a mapping")]
    UnknownMapping { name: String },

    /// A mapping used with the wrong number of keys.
    #[error("mapping '{name}' takes {expected} key(s), got {found}")]
    MappingArity {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Internal compiler error: an expression whose term and operator
    /// counts do not interleave.
    #[error("internal compiler error: expression with {terms} term(s) and {operators} operator(s)")]
    MalformedExpression { terms: usize, operators: usize },

    /// Internal compiler error: a jump placeholder was never resolved.
    #[error("internal compiler error: {pending} jump placeholder(s) never patched")]
    UnpatchedJump { pending: usize },
}
