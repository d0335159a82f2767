use num_bigint::BigInt;

/// A literal value in source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(BigInt),
    Bool(bool),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One operand of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Literal(Literal),

    // Local, global, or call parameter; resolved by the generator
    Ident(String),

    // Mapping access: base[k1][k2]...
    Index { base: String, keys: Vec<Term> },
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Literal(lit) => write!(f, "{}", lit),
            Term::Ident(name) => write!(f, "{}", name),
            Term::Index { base, keys } => {
                write!(f, "{}", base)?;
                for key in keys {
                    write!(f, "[{}]", key)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,

    // Logic
    And,
    Or,
}

impl Operator {
    /// Binding strength; higher binds tighter. Every level is
    /// left-associative.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::And | Operator::Or => 0,
            Operator::Equal
            | Operator::NotEqual
            | Operator::Less
            | Operator::Greater
            | Operator::LessEqual
            | Operator::GreaterEqual => 1,
            Operator::Add | Operator::Subtract => 2,
            Operator::Multiply | Operator::Divide | Operator::Modulo => 3,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::LessEqual => "<=",
            Operator::GreaterEqual => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
        }
    }
}

/// An infix expression exactly as written: `terms[0] operators[0] terms[1] ...`.
///
/// Precedence is not resolved here; the generator reorders into postfix.
/// Invariant: `terms.len() == operators.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub terms: Vec<Term>,
    pub operators: Vec<Operator>,
}

impl Expression {
    pub fn single(term: Term) -> Self {
        Expression {
            terms: vec![term],
            operators: Vec::new(),
        }
    }

    /// Returns the only term when the expression has no operators.
    pub fn as_single_term(&self) -> Option<&Term> {
        match (self.terms.as_slice(), self.operators.is_empty()) {
            ([term], true) => Some(term),
            _ => None,
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                if let Some(op) = self.operators.get(i - 1) {
                    write!(f, " {} ", op.symbol())?;
                }
            }
            write!(f, "{}", term)?;
        }
        Ok(())
    }
}

/// `var name = value` inside a function body.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub name: String,
    pub value: Expression,
}

/// `target = value`. The target must be a single identifier or mapping access.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Expression,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Return(Expression),
    Assignment(Assignment),
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Option<Vec<Statement>>,
    },
    For {
        init: LocalVar,
        condition: Expression,
        step: Assignment,
        body: Vec<Statement>,
    },
    LocalVar(LocalVar),
}
