use num_bigint::BigInt;

use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::parser_error::ParseError;
use crate::frontend::token::Token;
use crate::lang::contract::{
    Contract, Declaration, FunctionDeclaration, MappingDeclaration, Param, VariableDeclaration,
};
use crate::lang::node::{Assignment, Expression, Literal, LocalVar, Statement, Term};

/// Identifiers the parser gives meaning to. They cannot name variables,
/// mappings, functions or parameters.
const KEYWORDS: &[&str] = &[
    "contract", "var", "func", "mapping", "return", "if", "else", "for", "true", "false",
];

/// Default limit on nested blocks and `else if` chains.
pub const MAX_NESTING_DEPTH: usize = 128;

fn is_reserved(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Recursive-descent parser for Sable contracts.
///
/// The parser consumes lexed `Spanned` tokens and produces a `Contract`.
/// Keywords arrive as plain identifiers and are recognized here by context.
///
/// Expressions are kept flat: a list of terms and the operators between
/// them. Operator precedence is resolved later, by the code generator.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Span of the most recently consumed token.
    ///
    /// Used as the error location when the token list is empty.
    last_span: Option<Span>,

    // Safety limits
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            last_span: None,
            depth: 0,
            max_depth: MAX_NESTING_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Runs `f` one nesting level deeper, failing past `max_depth`.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= self.max_depth {
            return Err(self.error(format!("nesting depth <= {}", self.max_depth)));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Returns the current token without consuming it.
    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    /// Advances by one token. Never moves past `Eof`.
    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if let Some(s) = &spanned {
            self.last_span = Some(s.span);
            if s.token != Token::Eof {
                self.pos += 1;
            }
        }
        spanned
    }

    fn peek(&self) -> &Token {
        self.current().map(|s| &s.token).unwrap_or(&Token::Eof)
    }

    fn peek_next(&self) -> &Token {
        self.tokens
            .get(self.pos + 1)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn check_keyword(&self, word: &str) -> bool {
        self.peek().is_keyword(word)
    }

    /// Builds a `ParseError` at the current token.
    ///
    /// Falls back to `last_span`, then to 1:1 for an empty token list.
    fn error(&self, expected: impl Into<String>) -> ParseError {
        let (found, span) = match self.current() {
            Some(spanned) => (describe(&spanned.token), spanned.span),
            None => (
                Token::Eof.kind().to_string(),
                self.last_span.unwrap_or(Span { line: 1, col: 1 }),
            ),
        };
        ParseError {
            expected: expected.into(),
            found,
            line: span.line,
            col: span.col,
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if self.check(&token) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(token.kind()))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.check_keyword(word) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("'{}'", word)))
        }
    }

    /// Consumes a non-keyword identifier. `what` names the role for errors.
    fn expect_name(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Token::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(what)),
        }
    }

    /// Parses a complete contract:
    ///
    /// ```text
    /// contract <Name> { <declarations> }
    /// ```
    ///
    /// Nothing but end of input may follow the closing brace.
    pub fn parse(&mut self) -> Result<Contract, ParseError> {
        self.expect_keyword("contract")?;
        let name = self.expect_name("contract name")?;
        self.expect(Token::LBrace)?;

        let mut declarations = Vec::new();
        while !self.check(&Token::RBrace) {
            declarations.push(self.parse_declaration()?);
        }
        self.expect(Token::RBrace)?;
        self.expect(Token::Eof)?;

        Ok(Contract { name, declarations })
    }

    fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        if self.check_keyword("var") {
            Ok(Declaration::Variable(self.parse_variable_declaration()?))
        } else if self.check_keyword("mapping") {
            Ok(Declaration::Mapping(self.parse_mapping_declaration()?))
        } else if self.check_keyword("func") {
            Ok(Declaration::Function(self.parse_function()?))
        } else {
            Err(self.error("declaration ('var', 'mapping' or 'func')"))
        }
    }

    /// `var <name>: <Type> = <literal>`
    fn parse_variable_declaration(&mut self) -> Result<VariableDeclaration, ParseError> {
        self.advance(); // consume 'var'
        let name = self.expect_name("variable name")?;
        self.expect(Token::Colon)?;
        let ty = self.expect_name("type name")?;
        self.expect(Token::Assign)?;
        let value = self.parse_literal()?;
        Ok(VariableDeclaration { name, ty, value })
    }

    /// A constant initializer: a number, `-` number, `true` or `false`.
    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        match self.peek() {
            Token::Number(_) => self.parse_number(false),
            Token::Minus if matches!(self.peek_next(), Token::Number(_)) => {
                self.advance(); // consume '-'
                self.parse_number(true)
            }
            t if t.is_keyword("true") => {
                self.advance();
                Ok(Literal::Bool(true))
            }
            t if t.is_keyword("false") => {
                self.advance();
                Ok(Literal::Bool(false))
            }
            _ => Err(self.error("literal")),
        }
    }

    fn parse_number(&mut self, negative: bool) -> Result<Literal, ParseError> {
        let digits = match self.peek() {
            Token::Number(digits) => digits.clone(),
            _ => return Err(self.error("number")),
        };
        let value: BigInt = digits.parse().map_err(|_| self.error("decimal number"))?;
        self.advance();
        Ok(Literal::Integer(if negative { -value } else { value }))
    }

    /// `mapping(<K1> => mapping(<K2> => <V>)) <name>`, nested to any depth.
    fn parse_mapping_declaration(&mut self) -> Result<MappingDeclaration, ParseError> {
        self.advance(); // consume 'mapping'
        let mut key_types = Vec::new();
        let value_type = self.parse_mapping_type(&mut key_types)?;
        let name = self.expect_name("mapping name")?;
        Ok(MappingDeclaration {
            name,
            key_types,
            value_type,
        })
    }

    /// Parses `( K => V )` after a `mapping` keyword, where `V` may itself be
    /// `mapping(...)`. Key types are appended outermost first; returns the
    /// innermost value type.
    ///
    /// Iterative, so depth is bounded only by the input.
    fn parse_mapping_type(&mut self, key_types: &mut Vec<String>) -> Result<String, ParseError> {
        let mut open = 0;
        let value_type = loop {
            self.expect(Token::LParen)?;
            open += 1;
            key_types.push(self.expect_name("key type")?);
            self.expect(Token::FatArrow)?;

            if self.check_keyword("mapping") {
                self.advance();
            } else {
                break self.expect_name("value type or 'mapping'")?;
            }
        };

        for _ in 0..open {
            self.expect(Token::RParen)?;
        }
        Ok(value_type)
    }

    /// `func <name>(<params>) (-> <Type>)? { <statements> }`
    fn parse_function(&mut self) -> Result<FunctionDeclaration, ParseError> {
        self.advance(); // consume 'func'
        let name = self.expect_name("function name")?;

        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let param_name = self.expect_name("parameter name")?;
                self.expect(Token::Colon)?;
                let ty = self.expect_name("parameter type")?;
                params.push(Param {
                    name: param_name,
                    ty,
                });
                if self.check(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;

        let return_type = if self.check(&Token::Arrow) {
            self.advance();
            Some(self.expect_name("return type")?)
        } else {
            None
        };

        let body = self.parse_block()?;
        Ok(FunctionDeclaration {
            name,
            params,
            return_type,
            body,
        })
    }

    /// `{ <statements> }`
    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.nested(Self::parse_block_inner)
    }

    fn parse_block_inner(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.expect(Token::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.check(&Token::Eof) {
                return Err(self.error("'}'"));
            }
            body.push(self.parse_statement()?);
        }
        self.expect(Token::RBrace)?;
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        if self.check_keyword("return") {
            self.advance();
            Ok(Statement::Return(self.parse_expression()?))
        } else if self.check_keyword("if") {
            self.parse_if()
        } else if self.check_keyword("for") {
            self.parse_for()
        } else if self.check_keyword("var") {
            Ok(Statement::LocalVar(self.parse_local_var()?))
        } else {
            Ok(Statement::Assignment(self.parse_assignment()?))
        }
    }

    /// `if <cond> { ... } (else { ... } | else if ...)?`
    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        self.advance(); // consume 'if'
        let condition = self.parse_expression()?;
        let then_body = self.parse_block()?;

        let else_body = if self.check_keyword("else") {
            self.advance();
            if self.check_keyword("if") {
                Some(vec![self.nested(Self::parse_if)?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_body,
            else_body,
        })
    }

    /// `for var i = <init>; <cond>; <step assignment> { ... }`
    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        self.advance(); // consume 'for'
        if !self.check_keyword("var") {
            return Err(self.error("'var' loop variable"));
        }
        let init = self.parse_local_var()?;
        self.expect(Token::Semicolon)?;
        let condition = self.parse_expression()?;
        self.expect(Token::Semicolon)?;
        let step = self.parse_assignment()?;
        let body = self.parse_block()?;

        Ok(Statement::For {
            init,
            condition,
            step,
            body,
        })
    }

    /// `var <name> (: <Type>)? = <expr>`
    fn parse_local_var(&mut self) -> Result<LocalVar, ParseError> {
        self.advance(); // consume 'var'
        let name = self.expect_name("variable name")?;
        if self.check(&Token::Colon) {
            self.advance();
            self.expect_name("type name")?;
        }
        self.expect(Token::Assign)?;
        let value = self.parse_expression()?;
        Ok(LocalVar { name, value })
    }

    /// `<expr> = <expr>`. Target validity is checked by the generator.
    fn parse_assignment(&mut self) -> Result<Assignment, ParseError> {
        let target = self.parse_expression()?;
        self.expect(Token::Assign)?;
        let value = self.parse_expression()?;
        Ok(Assignment { target, value })
    }

    /// `term (op term)*`, kept flat.
    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let mut terms = vec![self.parse_term()?];
        let mut operators = Vec::new();

        while let Some(op) = self.peek().as_operator() {
            self.advance();
            operators.push(op);
            terms.push(self.parse_term()?);
        }

        Ok(Expression { terms, operators })
    }

    /// A number, boolean, identifier, or mapping access `m[k1][k2]...`.
    ///
    /// A `-` directly before a number in term position is a negative literal.
    fn parse_term(&mut self) -> Result<Term, ParseError> {
        match self.peek() {
            Token::Number(_) => Ok(Term::Literal(self.parse_number(false)?)),
            Token::Minus if matches!(self.peek_next(), Token::Number(_)) => {
                self.advance();
                Ok(Term::Literal(self.parse_number(true)?))
            }
            t if t.is_keyword("true") || t.is_keyword("false") => {
                Ok(Term::Literal(self.parse_literal()?))
            }
            Token::Ident(name) if !is_reserved(name) => {
                let base = name.clone();
                self.advance();

                let mut keys = Vec::new();
                while self.check(&Token::LBracket) {
                    self.advance();
                    keys.push(self.parse_term()?);
                    self.expect(Token::RBracket)?;
                }

                if keys.is_empty() {
                    Ok(Term::Ident(base))
                } else {
                    Ok(Term::Index { base, keys })
                }
            }
            _ => Err(self.error("expression")),
        }
    }
}

/// Token description for the `found` half of an error message.
fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("identifier '{}'", name),
        Token::Number(n) => format!("number {}", n),
        other => other.kind().to_string(),
    }
}
