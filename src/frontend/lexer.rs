use crate::frontend::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{line}:{col}: {message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

/// Single left-to-right scanner. Holds nothing but its cursor.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn error(&self, span: Span, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            line: span.line,
            col: span.col,
        }
    }

    /// Skips whitespace and `//` line comments.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek() == Some('/') {
                while let Some(c) = self.current() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Token {
        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Token::Number(digits)
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Token::Ident(ident)
    }

    fn read_operator(&mut self, span: Span) -> Result<Token, LexError> {
        let Some(ch) = self.current() else {
            return Err(self.error(span, "unexpected end of input"));
        };
        let next = self.peek();

        // Two-character operators win over their one-character prefixes
        let two = match (ch, next) {
            ('=', Some('=')) => Some(Token::EqEq),
            ('!', Some('=')) => Some(Token::NotEq),
            ('&', Some('&')) => Some(Token::AndAnd),
            ('|', Some('|')) => Some(Token::OrOr),
            ('>', Some('=')) => Some(Token::GtEq),
            ('<', Some('=')) => Some(Token::LtEq),
            ('-', Some('>')) => Some(Token::Arrow),
            ('=', Some('>')) => Some(Token::FatArrow),
            _ => None,
        };
        if let Some(token) = two {
            self.advance();
            self.advance();
            return Ok(token);
        }

        let token = match ch {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            ';' => Token::Semicolon,
            '=' => Token::Assign,
            '<' => Token::Lt,
            '>' => Token::Gt,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' => return Err(self.error(span, "incomplete operator '!', expected '!='")),
            '&' => return Err(self.error(span, "incomplete operator '&', expected '&&'")),
            '|' => return Err(self.error(span, "incomplete operator '|', expected '||'")),
            other => return Err(self.error(span, format!("unexpected character '{}'", other))),
        };
        self.advance();
        Ok(token)
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia();
            let span = self.span();

            let token = match self.current() {
                None => {
                    tokens.push(Spanned {
                        token: Token::Eof,
                        span,
                    });
                    break;
                }
                Some(ch) if ch.is_ascii_digit() => self.read_number(),
                Some(ch) if ch.is_ascii_alphabetic() => self.read_identifier(),
                Some(_) => self.read_operator(span)?,
            };

            tokens.push(Spanned { token, span });
        }

        Ok(tokens)
    }
}
