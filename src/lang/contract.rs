use crate::lang::node::{Literal, Statement};

/// A parsed contract: its name and top-level declarations in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub name: String,
    pub declarations: Vec<Declaration>,
}

impl Contract {
    /// Function declarations in table order (index 0 is the first `func`).
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDeclaration> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Function(f) => Some(f),
            _ => None,
        })
    }

    /// Index of the named function in the bytecode function table.
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions().position(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Variable(VariableDeclaration),
    Mapping(MappingDeclaration),
    Function(FunctionDeclaration),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Variable(v) => &v.name,
            Declaration::Mapping(m) => &m.name,
            Declaration::Function(f) => &f.name,
        }
    }
}

/// `var name: Type = literal` at contract level.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: String,
    pub ty: String,
    pub value: Literal,
}

/// `mapping(K1 => mapping(K2 => V)) name`; `key_types` is `[K1, K2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingDeclaration {
    pub name: String,
    pub key_types: Vec<String>,
    pub value_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Vec<Statement>,
}

#[cfg(test)]
mod tests {
    use crate::frontend::{Lexer, Parser};

    #[test]
    fn test_function_index_follows_func_order() {
        let tokens = Lexer::new(
            "contract C { func a() {} var x: Int = 1 mapping(Int => Int) m func b() {} }",
        )
        .tokenize()
        .unwrap();
        let contract = Parser::new(tokens).parse().unwrap();
        assert_eq!(contract.function_index("a"), Some(0));
        assert_eq!(contract.function_index("b"), Some(1));
        assert_eq!(contract.function_index("x"), None);
    }
}
