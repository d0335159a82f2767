use std::fmt::Write;

use crate::frontend::lexer::Spanned;
use crate::frontend::token::Token;

/// Token listing for the `tokens` CLI command.
pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints the source text of each token
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const BLU: &'static str = "\x1b[34m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        print!("{}", self.render(tokens));
    }

    pub fn render(&self, tokens: &[Spanned]) -> String {
        let mut out = String::new();
        for s in tokens {
            self.render_one(&mut out, s);
        }
        out
    }

    fn render_one(&self, out: &mut String, s: &Spanned) {
        let line = s.span.line;
        let col = s.span.col;

        let kind = self.kind(&s.token);
        let colr = if self.color { self.color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        // Writing into a String cannot fail
        let _ = if self.show_debug_repr {
            writeln!(
                out,
                "[{:02}:{:02}] {}{:<8} {:?}{}",
                line, col, colr, kind, s.token, reset
            )
        } else {
            writeln!(
                out,
                "[{:02}:{:02}] {}{:<8} {}{}",
                line, col, colr, kind, s.token, reset
            )
        };
    }

    fn kind(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            Eof => "EOF",
            Number(_) => "NUMBER",
            Ident(name) if is_keyword(name) => "KEYWORD",
            Ident(_) => "IDENT",

            LParen | RParen => "PAREN",
            LBracket | RBracket => "BRACKET",
            LBrace | RBrace => "BRACE",
            Comma | Colon | Semicolon => "PUNCT",
            Arrow | FatArrow => "ARROW",

            Plus | Minus | Star | Slash | Percent => "OP",
            EqEq | NotEq | Lt | LtEq | Gt | GtEq => "CMP",
            AndAnd | OrOr => "LOGIC",
            Assign => "ASSIGN",
        }
    }

    fn color(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            Eof => Self::DIM,
            Number(_) => Self::CYN,
            Ident(name) if is_keyword(name) => Self::BLU,
            Ident(_) => Self::YEL,
            Plus | Minus | Star | Slash | Percent => Self::MAG,
            EqEq | NotEq | Lt | LtEq | Gt | GtEq | AndAnd | OrOr => Self::MAG,
            _ => Self::RESET,
        }
    }
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "contract" | "var" | "func" | "mapping" | "return" | "if" | "else" | "for" | "true" | "false"
    )
}
