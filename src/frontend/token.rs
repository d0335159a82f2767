use crate::lang::node::Operator;

/// Lexical tokens.
///
/// Keywords (`contract`, `var`, `func`, `mapping`, `return`, `if`, `else`,
/// `for`, `true`, `false`) are plain identifiers; the parser decides what
/// they mean from context.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Ident(std::string::String),
    Number(std::string::String),

    // Delimiters
    LBrace,   // {
    RBrace,   // }
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,
    Colon,
    Semicolon,

    // Assignment
    Assign, // =

    // Comparison
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // Logic
    AndAnd,
    OrOr,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Arrows
    Arrow,    // ->
    FatArrow, // =>

    Eof,
}

impl Token {
    /// Maps a binary operator token to its expression operator.
    pub fn as_operator(&self) -> Option<Operator> {
        Some(match self {
            Token::Plus => Operator::Add,
            Token::Minus => Operator::Subtract,
            Token::Star => Operator::Multiply,
            Token::Slash => Operator::Divide,
            Token::Percent => Operator::Modulo,
            Token::EqEq => Operator::Equal,
            Token::NotEq => Operator::NotEqual,
            Token::Lt => Operator::Less,
            Token::Gt => Operator::Greater,
            Token::LtEq => Operator::LessEqual,
            Token::GtEq => Operator::GreaterEqual,
            Token::AndAnd => Operator::And,
            Token::OrOr => Operator::Or,
            _ => return None,
        })
    }

    /// True if this is the identifier `word`.
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Token::Ident(name) if name == word)
    }

    /// Short kind name used in "expected X, found Y" diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Ident(_) => "identifier",
            Token::Number(_) => "number",
            Token::LBrace => "'{'",
            Token::RBrace => "'}'",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::Comma => "','",
            Token::Colon => "':'",
            Token::Semicolon => "';'",
            Token::Assign => "'='",
            Token::EqEq => "'=='",
            Token::NotEq => "'!='",
            Token::Lt => "'<'",
            Token::Gt => "'>'",
            Token::LtEq => "'<='",
            Token::GtEq => "'>='",
            Token::AndAnd => "'&&'",
            Token::OrOr => "'||'",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::Slash => "'/'",
            Token::Percent => "'%'",
            Token::Arrow => "'->'",
            Token::FatArrow => "'=>'",
            Token::Eof => "end of input",
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::Number(n) => write!(f, "{}", n),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Semicolon => write!(f, ";"),
            Token::Assign => write!(f, "="),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Arrow => write!(f, "->"),
            Token::FatArrow => write!(f, "=>"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}
