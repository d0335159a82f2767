/// A parsing error with source location.
///
/// `line` and `col` are 1-based positions coming from the lexer spans.
/// `expected` names what the grammar wanted at that point and `found`
/// describes the token actually seen, e.g. `expected '{', found identifier 'x'`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{line}:{col}: expected {expected}, found {found}")]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    pub line: usize,
    pub col: usize,
}
