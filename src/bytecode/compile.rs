use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace};

use crate::{
    bytecode::{Bytecode, FunctionCode, Op, compile_error::CompileError},
    frontend::{lexer::Lexer, parser::Parser},
    lang::{
        contract::{Contract, Declaration, FunctionDeclaration},
        node::{Assignment, Expression, Literal, LocalVar, Operator, Statement, Term},
        word::Word,
    },
};

/// Lexes, parses and compiles one contract source.
pub fn compile_source(source: &str) -> Result<Bytecode, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let contract = Parser::new(tokens).parse()?;
    Compiler::new().compile_contract(&contract)
}

// =============================================================================
// Slot allocation
// =============================================================================

/// Name-to-slot maps for the two address spaces.
///
/// Storage slots live for the whole compile. Memory slots are reset at the
/// start of each function. In both, the first reference to a name takes the
/// next unused index.
#[derive(Debug, Default)]
pub struct SlotAllocator {
    storage: HashMap<String, usize>,
    memory: HashMap<String, usize>,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage_slot(&mut self, name: &str) -> usize {
        let next = self.storage.len();
        let slot = *self.storage.entry(name.to_string()).or_insert(next);
        if slot == next {
            trace!(name, slot, "allocated storage slot");
        }
        slot
    }

    pub fn memory_slot(&mut self, name: &str) -> usize {
        let next = self.memory.len();
        let slot = *self.memory.entry(name.to_string()).or_insert(next);
        if slot == next {
            trace!(name, slot, "allocated memory slot");
        }
        slot
    }

    pub fn lookup_storage(&self, name: &str) -> Option<usize> {
        self.storage.get(name).copied()
    }

    pub fn lookup_memory(&self, name: &str) -> Option<usize> {
        self.memory.get(name).copied()
    }

    pub fn reset_memory(&mut self) {
        self.memory.clear();
    }
}

// =============================================================================
// Code buffer with back-patched jump targets
// =============================================================================

/// Index of a `PUSH` whose jump target is not known yet.
#[must_use]
#[derive(Debug)]
struct Patch(usize);

/// Instruction list under construction.
///
/// Placeholders are plain indices into `ops`; `finish` fails if any is left
/// unpatched.
#[derive(Debug, Default)]
struct CodeBuffer {
    ops: Vec<Op>,
    pending: usize,
    /// Early `return` jumps, all resolved to the end of the list.
    exits: Vec<Patch>,
}

impl CodeBuffer {
    fn emit(&mut self, op: Op) {
        self.ops.push(op);
    }

    fn here(&self) -> usize {
        self.ops.len()
    }

    fn placeholder(&mut self) -> Patch {
        let at = self.here();
        self.ops.push(Op::Push(Word::ZERO));
        self.pending += 1;
        Patch(at)
    }

    fn patch(&mut self, patch: Patch, target: usize) {
        self.ops[patch.0] = Op::Push(Word::from_usize(target));
        self.pending -= 1;
    }

    /// `PUSH <end>; JUMP`, patched in `finish`.
    fn jump_to_end(&mut self) {
        let exit = self.placeholder();
        self.emit(Op::Jump);
        self.exits.push(exit);
    }

    fn finish(mut self) -> Result<Vec<Op>, CompileError> {
        let end = self.here();
        for exit in std::mem::take(&mut self.exits) {
            self.patch(exit, end);
        }
        if self.pending != 0 {
            return Err(CompileError::UnpatchedJump {
                pending: self.pending,
            });
        }
        Ok(self.ops)
    }
}

// =============================================================================
// Compiler
// =============================================================================

fn opcode_for(op: Operator) -> Op {
    match op {
        Operator::Add => Op::Add,
        Operator::Subtract => Op::Subtract,
        Operator::Multiply => Op::Multiply,
        Operator::Divide => Op::Divide,
        Operator::Modulo => Op::Modulo,
        Operator::Equal => Op::Equal,
        Operator::NotEqual => Op::NotEqual,
        Operator::Less => Op::LessThan,
        Operator::Greater => Op::GreaterThan,
        Operator::LessEqual => Op::LessThanEqual,
        Operator::GreaterEqual => Op::GreaterThanEqual,
        Operator::And => Op::And,
        Operator::Or => Op::Or,
    }
}

fn encode_literal(literal: &Literal) -> Result<Word, CompileError> {
    Ok(match literal {
        Literal::Integer(n) => Word::from_safe_int(n)?,
        Literal::Bool(b) => Word::from_bool(*b),
    })
}

/// Code generator for one contract. Consumed by `compile_contract`, so slot
/// numbering never leaks between compiles.
#[derive(Debug, Default)]
pub struct Compiler {
    slots: SlotAllocator,

    /// Declared storage variables.
    globals: HashSet<String>,

    /// Declared mappings and their key counts.
    mappings: HashMap<String, usize>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_contract(mut self, contract: &Contract) -> Result<Bytecode, CompileError> {
        debug!(
            contract = %contract.name,
            declarations = contract.declarations.len(),
            "compiling contract"
        );

        self.collect_declarations(contract)?;
        let initialization = self.compile_initialization(contract)?;

        let mut functions = BTreeMap::new();
        for (index, function) in contract.functions().enumerate() {
            functions.insert(index, self.compile_function(function)?);
        }

        debug!(
            contract = %contract.name,
            functions = functions.len(),
            storage_slots = self.slots.storage.len(),
            "compiled contract"
        );

        Ok(Bytecode {
            initialization,
            functions,
        })
    }

    fn collect_declarations(&mut self, contract: &Contract) -> Result<(), CompileError> {
        let mut seen = HashSet::new();
        for decl in &contract.declarations {
            if !seen.insert(decl.name()) {
                return Err(CompileError::DuplicateDeclaration {
                    name: decl.name().to_string(),
                });
            }
            match decl {
                Declaration::Variable(v) => {
                    self.globals.insert(v.name.clone());
                }
                Declaration::Mapping(m) => {
                    self.mappings.insert(m.name.clone(), m.key_types.len());
                }
                Declaration::Function(_) => {}
            }
        }
        Ok(())
    }

    /// Stores every variable's initial value. Mappings only claim a slot.
    fn compile_initialization(&mut self, contract: &Contract) -> Result<Vec<Op>, CompileError> {
        let mut code = CodeBuffer::default();
        for decl in &contract.declarations {
            match decl {
                Declaration::Variable(v) => {
                    code.emit(Op::Push(encode_literal(&v.value)?));
                    let slot = self.slots.storage_slot(&v.name);
                    code.emit(Op::Push(Word::from_usize(slot)));
                    code.emit(Op::Sstore);
                }
                Declaration::Mapping(m) => {
                    self.slots.storage_slot(&m.name);
                }
                Declaration::Function(_) => {}
            }
        }
        code.finish()
    }

    fn compile_function(
        &mut self,
        function: &FunctionDeclaration,
    ) -> Result<FunctionCode, CompileError> {
        self.slots.reset_memory();
        self.check_params(function)?;

        let params = function
            .params
            .iter()
            .map(|p| Word::from_text(&p.name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut code = CodeBuffer::default();
        let last = function.body.len().saturating_sub(1);
        for (i, stmt) in function.body.iter().enumerate() {
            match stmt {
                // A trailing return already ends the body
                Statement::Return(expr) if i == last => {
                    self.compile_expression(expr, &mut code)?
                }
                _ => self.compile_statement(stmt, &mut code)?,
            }
        }

        trace!(function = %function.name, ops = code.here(), "compiled function");
        Ok(FunctionCode {
            params,
            body: code.finish()?,
        })
    }

    fn check_params(&self, function: &FunctionDeclaration) -> Result<(), CompileError> {
        let mut seen = HashSet::new();
        for param in &function.params {
            let name = param.name.as_str();
            if !seen.insert(name) {
                return Err(CompileError::DuplicateParameter {
                    function: function.name.clone(),
                    name: name.to_string(),
                });
            }
            if self.globals.contains(name) || self.mappings.contains_key(name) {
                return Err(CompileError::ShadowedParameter {
                    function: function.name.clone(),
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn compile_block(
        &mut self,
        body: &[Statement],
        code: &mut CodeBuffer,
    ) -> Result<(), CompileError> {
        for stmt in body {
            self.compile_statement(stmt, code)?;
        }
        Ok(())
    }

    fn compile_statement(
        &mut self,
        stmt: &Statement,
        code: &mut CodeBuffer,
    ) -> Result<(), CompileError> {
        match stmt {
            Statement::Return(expr) => {
                self.compile_expression(expr, code)?;
                code.jump_to_end();
            }
            Statement::Assignment(assignment) => self.compile_assignment(assignment, code)?,
            Statement::LocalVar(local) => self.compile_local_var(local, code)?,
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                // PUSH <else>; cond; JUMPI; then [PUSH <end>; JUMP; else]
                let to_else = code.placeholder();
                self.compile_expression(condition, code)?;
                code.emit(Op::Jumpi);
                self.compile_block(then_body, code)?;

                match else_body {
                    Some(else_body) => {
                        let to_end = code.placeholder();
                        code.emit(Op::Jump);
                        let else_start = code.here();
                        code.patch(to_else, else_start);
                        self.compile_block(else_body, code)?;
                        let end = code.here();
                        code.patch(to_end, end);
                    }
                    None => {
                        let end = code.here();
                        code.patch(to_else, end);
                    }
                }
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                self.compile_local_var(init, code)?;
                let head = code.here();
                let to_exit = code.placeholder();
                self.compile_expression(condition, code)?;
                code.emit(Op::Jumpi);
                self.compile_block(body, code)?;
                self.compile_assignment(step, code)?;
                code.emit(Op::Push(Word::from_usize(head)));
                code.emit(Op::Jump);
                let exit = code.here();
                code.patch(to_exit, exit);
            }
        }
        Ok(())
    }

    fn compile_local_var(
        &mut self,
        local: &LocalVar,
        code: &mut CodeBuffer,
    ) -> Result<(), CompileError> {
        self.compile_expression(&local.value, code)?;
        let slot = self.slots.memory_slot(&local.name);
        code.emit(Op::Push(Word::from_usize(slot)));
        code.emit(Op::Mstore);
        Ok(())
    }

    /// Value first, then the target address, then the store.
    fn compile_assignment(
        &mut self,
        assignment: &Assignment,
        code: &mut CodeBuffer,
    ) -> Result<(), CompileError> {
        let invalid = || CompileError::InvalidAssignmentTarget {
            target: assignment.target.to_string(),
        };
        let target = assignment.target.as_single_term().ok_or_else(invalid)?;

        self.compile_expression(&assignment.value, code)?;

        match target {
            Term::Literal(_) => return Err(invalid()),
            Term::Ident(name) => {
                if let Some(slot) = self.slots.lookup_memory(name) {
                    code.emit(Op::Push(Word::from_usize(slot)));
                    code.emit(Op::Mstore);
                } else if self.globals.contains(name) {
                    let slot = self.slots.storage_slot(name);
                    code.emit(Op::Push(Word::from_usize(slot)));
                    code.emit(Op::Sstore);
                } else if let Some(&expected) = self.mappings.get(name) {
                    return Err(CompileError::MappingArity {
                        name: name.clone(),
                        expected,
                        found: 0,
                    });
                } else {
                    // Parameter: overwrite its memory cell
                    code.emit(Op::Push(Word::from_text(name)?));
                    code.emit(Op::Mstore);
                }
            }
            Term::Index { base, keys } => {
                self.compile_mapping_address(base, keys, code)?;
                code.emit(Op::Sstore);
            }
        }
        Ok(())
    }

    /// Shunting-yard over the flat term/operator list, emitting in postfix
    /// order as operators are popped.
    fn compile_expression(
        &mut self,
        expr: &Expression,
        code: &mut CodeBuffer,
    ) -> Result<(), CompileError> {
        let malformed = || CompileError::MalformedExpression {
            terms: expr.terms.len(),
            operators: expr.operators.len(),
        };
        if expr.terms.len() != expr.operators.len() + 1 {
            return Err(malformed());
        }
        let (first, rest) = expr.terms.split_first().ok_or_else(malformed)?;

        let mut pending: Vec<Operator> = Vec::new();
        self.compile_term(first, code)?;

        for (op, term) in expr.operators.iter().zip(rest) {
            // Left-associative: pop everything binding at least as tightly
            while let Some(top) = pending.last().copied() {
                if top.precedence() < op.precedence() {
                    break;
                }
                code.emit(opcode_for(top));
                pending.pop();
            }
            pending.push(*op);
            self.compile_term(term, code)?;
        }

        while let Some(op) = pending.pop() {
            code.emit(opcode_for(op));
        }
        Ok(())
    }

    /// Resolution order for identifiers: local, storage variable, parameter.
    fn compile_term(
        &mut self,
        term: &Term,
        code: &mut CodeBuffer,
    ) -> Result<(), CompileError> {
        match term {
            Term::Literal(literal) => code.emit(Op::Push(encode_literal(literal)?)),
            Term::Ident(name) => {
                if let Some(slot) = self.slots.lookup_memory(name) {
                    code.emit(Op::Push(Word::from_usize(slot)));
                    code.emit(Op::Mload);
                } else if self.globals.contains(name) {
                    let slot = self.slots.storage_slot(name);
                    code.emit(Op::Push(Word::from_usize(slot)));
                    code.emit(Op::Sload);
                } else if let Some(&expected) = self.mappings.get(name) {
                    return Err(CompileError::MappingArity {
                        name: name.clone(),
                        expected,
                        found: 0,
                    });
                } else {
                    code.emit(Op::PushParam(Word::from_text(name)?));
                }
            }
            Term::Index { base, keys } => {
                self.compile_mapping_address(base, keys, code)?;
                code.emit(Op::Sload);
            }
        }
        Ok(())
    }

    /// `PUSH slot`, then `<key>; ADD; HASH256` per key: the address after
    /// key `i` is `hash(address_{i-1} + key_i)`.
    fn compile_mapping_address(
        &mut self,
        base: &str,
        keys: &[Term],
        code: &mut CodeBuffer,
    ) -> Result<(), CompileError> {
        let expected = *self
            .mappings
            .get(base)
            .ok_or_else(|| CompileError::UnknownMapping {
                name: base.to_string(),
            })?;
        if keys.len() != expected {
            return Err(CompileError::MappingArity {
                name: base.to_string(),
                expected,
                found: keys.len(),
            });
        }

        let slot = self.slots.storage_slot(base);
        code.emit(Op::Push(Word::from_usize(slot)));
        for key in keys {
            self.compile_term(key, code)?;
            code.emit(Op::Add);
            code.emit(Op::Hash256);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Bytecode {
        compile_source(source).unwrap()
    }

    fn compile_err(source: &str) -> CompileError {
        compile_source(source).unwrap_err()
    }

    /// Body of function `index`.
    fn body(source: &str, index: usize) -> Vec<Op> {
        compile(source).functions[&index].body.clone()
    }

    fn push(n: i64) -> Op {
        Op::Push(Word::from_i64(n))
    }

    fn param(name: &str) -> Op {
        Op::PushParam(Word::from_text(name).unwrap())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    #[test]
    fn test_multiplication_binds_tighter() {
        let ops = body("contract C { func f() -> Int { return 2 + 3 * 4 } }", 0);
        assert_eq!(ops, vec![push(2), push(3), push(4), Op::Multiply, Op::Add]);
    }

    #[test]
    fn test_logical_binds_loosest() {
        let ops = body("contract C { func f(a: Int, b: Int, c: Bool) { return a + b && c } }", 0);
        assert_eq!(
            ops,
            vec![param("a"), param("b"), Op::Add, param("c"), Op::And]
        );
    }

    #[test]
    fn test_comparison_below_arithmetic() {
        let ops = body("contract C { func f(a: Int, b: Int) { return a == b + 1 } }", 0);
        assert_eq!(
            ops,
            vec![param("a"), param("b"), push(1), Op::Add, Op::Equal]
        );
    }

    #[test]
    fn test_left_associative() {
        let ops = body("contract C { func f(a: Int, b: Int, c: Int) { return a - b - c } }", 0);
        assert_eq!(
            ops,
            vec![param("a"), param("b"), Op::Subtract, param("c"), Op::Subtract]
        );
    }

    #[test]
    fn test_mixed_levels() {
        let ops = body(
            "contract C { func f(a: Int, b: Int) { return a * 2 > b || a % 3 != 0 } }",
            0,
        );
        assert_eq!(
            ops,
            vec![
                param("a"),
                push(2),
                Op::Multiply,
                param("b"),
                Op::GreaterThan,
                param("a"),
                push(3),
                Op::Modulo,
                push(0),
                Op::NotEqual,
                Op::Or,
            ]
        );
    }

    #[test]
    fn test_boolean_literal() {
        let ops = body("contract C { func f() { return true } }", 0);
        assert_eq!(ops, vec![Op::Push(Word::from_bool(true))]);
    }

    // =========================================================================
    // Storage, memory and parameters
    // =========================================================================

    #[test]
    fn test_initialization() {
        let bc = compile("contract C { var a: Int = 7 mapping(Int => Int) m var b: Bool = false }");
        assert_eq!(
            bc.initialization,
            vec![
                push(7),
                push(0),
                Op::Sstore,
                Op::Push(Word::from_bool(false)),
                push(2),
                Op::Sstore,
            ]
        );
    }

    #[test]
    fn test_global_read() {
        let ops = body("contract C { var a: Int = 7 func read() -> Int { return a } }", 0);
        assert_eq!(ops, vec![push(0), Op::Sload]);
    }

    #[test]
    fn test_storage_slot_stability() {
        let ops = body(
            "contract C { var a: Int = 1 var b: Int = 2 func f() { b = a + b + a + b } }",
            0,
        );
        let slot_pushes: Vec<&Op> = ops
            .iter()
            .zip(ops.iter().skip(1))
            .filter(|(_, next)| matches!(next, Op::Sload | Op::Sstore))
            .map(|(op, _)| op)
            .collect();
        assert_eq!(
            slot_pushes,
            vec![&push(0), &push(1), &push(0), &push(1), &push(1)]
        );
    }

    #[test]
    fn test_local_variable() {
        let ops = body("contract C { func f() { var x = 1 return x } }", 0);
        assert_eq!(ops, vec![push(1), push(0), Op::Mstore, push(0), Op::Mload]);
    }

    #[test]
    fn test_local_shadows_global() {
        let ops = body("contract C { var x: Int = 5 func f() { var x = 1 return x } }", 0);
        assert_eq!(ops[3..], [push(0), Op::Mload]);
    }

    #[test]
    fn test_memory_slots_reset_per_function() {
        let src = "contract C { func f() { var a = 1 var b = 2 } func g() { var c = 3 } }";
        assert_eq!(body(src, 0)[4], push(1));
        assert_eq!(body(src, 1), vec![push(3), push(0), Op::Mstore]);
    }

    #[test]
    fn test_assign_to_parameter() {
        let ops = body("contract C { func f(n: Int) { n = n + 1 } }", 0);
        assert_eq!(
            ops,
            vec![
                param("n"),
                push(1),
                Op::Add,
                Op::Push(Word::from_text("n").unwrap()),
                Op::Mstore,
            ]
        );
    }

    #[test]
    fn test_function_table() {
        let bc = compile(
            "contract C { var a: Int = 1 func first() {} func second(x: Int, y: Int) -> Int { return x } }",
        );
        assert_eq!(bc.functions.len(), 2);
        assert!(bc.functions[&0].params.is_empty());
        assert_eq!(
            bc.functions[&1].params,
            vec![Word::from_text("x").unwrap(), Word::from_text("y").unwrap()]
        );
    }

    // =========================================================================
    // Mappings
    // =========================================================================

    #[test]
    fn test_mapping_store() {
        let ops = body(
            "contract C { mapping(Int => Int) balances func set(key: Int, value: Int) { balances[key] = value } }",
            0,
        );
        assert_eq!(
            ops,
            vec![
                param("value"),
                push(0),
                param("key"),
                Op::Add,
                Op::Hash256,
                Op::Sstore,
            ]
        );
    }

    #[test]
    fn test_nested_mapping_load() {
        let ops = body(
            "contract C { var x: Int = 0 mapping(Int => mapping(Int => Int)) m func get(k1: Int, k2: Int) { return m[k1][k2] } }",
            0,
        );
        assert_eq!(
            ops,
            vec![
                push(1),
                param("k1"),
                Op::Add,
                Op::Hash256,
                param("k2"),
                Op::Add,
                Op::Hash256,
                Op::Sload,
            ]
        );
    }

    #[test]
    fn test_mapping_literal_key() {
        let ops = body("contract C { mapping(Int => Int) m func f() { return m[3] } }", 0);
        assert_eq!(ops, vec![push(0), push(3), Op::Add, Op::Hash256, Op::Sload]);
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    #[test]
    fn test_if_else_layout() {
        let ops = body(
            "contract C { var x: Int = 0 func f() { if false { x = 1 } else { x = 2 } } }",
            0,
        );
        assert_eq!(
            ops,
            vec![
                push(8),
                Op::Push(Word::from_bool(false)),
                Op::Jumpi,
                push(1),
                push(0),
                Op::Sstore,
                push(11),
                Op::Jump,
                push(2),
                push(0),
                Op::Sstore,
            ]
        );
    }

    #[test]
    fn test_if_without_else() {
        let ops = body("contract C { var x: Int = 0 func f(c: Bool) { if c { x = 1 } } }", 0);
        assert_eq!(
            ops,
            vec![push(6), param("c"), Op::Jumpi, push(1), push(0), Op::Sstore]
        );
    }

    #[test]
    fn test_for_layout() {
        let ops = body(
            "contract C { var total: Int = 0 func f(n: Int) { for var i = 0; i < n; i = i + 1 { total = total + i } } }",
            0,
        );
        assert_eq!(
            ops,
            vec![
                push(0),
                push(0),
                Op::Mstore,
                push(24), // head: exit target
                push(0),
                Op::Mload,
                param("n"),
                Op::LessThan,
                Op::Jumpi,
                push(0),
                Op::Sload,
                push(0),
                Op::Mload,
                Op::Add,
                push(0),
                Op::Sstore,
                push(0),
                Op::Mload,
                push(1),
                Op::Add,
                push(0),
                Op::Mstore,
                push(3),
                Op::Jump,
            ]
        );
    }

    #[test]
    fn test_early_return_jumps_to_end() {
        let ops = body(
            "contract C { func f(a: Int) -> Int { if a > 1 { return 1 } return 2 } }",
            0,
        );
        assert_eq!(
            ops,
            vec![
                push(8),
                param("a"),
                push(1),
                Op::GreaterThan,
                Op::Jumpi,
                push(1),
                push(9),
                Op::Jump,
                push(2),
            ]
        );
    }

    #[test]
    fn test_all_jump_targets_in_range() {
        let bc = compile(
            "contract C { var t: Int = 0 func f(n: Int) { for var i = 0; i < n; i = i + 1 { if i % 2 == 0 { t = t + i } else { return t } } return 0 } }",
        );
        let ops = &bc.functions[&0].body;
        for (i, op) in ops.iter().enumerate() {
            if matches!(op, Op::Jump | Op::Jumpi) {
                continue;
            }
            if matches!(ops.get(i + 1), Some(Op::Jump)) {
                let target = op.operand().and_then(|w| w.to_usize()).unwrap();
                assert!(target <= ops.len(), "target {} out of range", target);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let src = "contract C { var a: Int = 1 mapping(Int => Int) m func f(k: Int) { m[k] = a if a > 0 { a = a - 1 } } }";
        assert_eq!(compile(src), compile(src));
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_unsafe_literal() {
        let err = compile_err("contract C { func f() { return 9007199254740992 } }");
        assert!(matches!(err, CompileError::Encoding(_)));
    }

    #[test]
    fn test_safe_literal_boundary() {
        let ops = body("contract C { func f() { return 9007199254740991 } }", 0);
        assert_eq!(ops, vec![push(9_007_199_254_740_991)]);
    }

    #[test]
    fn test_unsafe_initializer() {
        let err = compile_err("contract C { var a: Int = -9007199254740992 }");
        assert!(matches!(err, CompileError::Encoding(_)));
    }

    #[test]
    fn test_duplicate_declaration() {
        let err = compile_err("contract C { var a: Int = 1 func a() {} }");
        assert_eq!(
            err,
            CompileError::DuplicateDeclaration {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn test_parameter_hidden_by_global() {
        let err = compile_err("contract C { var a: Int = 1 func f(a: Int) -> Int { return a } }");
        assert_eq!(
            err,
            CompileError::ShadowedParameter {
                function: "f".to_string(),
                name: "a".to_string()
            }
        );

        let err = compile_err("contract C { mapping(Int => Int) m func f(m: Int) {} }");
        assert!(matches!(err, CompileError::ShadowedParameter { name, .. } if name == "m"));
    }

    #[test]
    fn test_duplicate_parameter() {
        let err = compile_err("contract C { func f(a: Int, a: Int) -> Int { return a } }");
        assert_eq!(
            err,
            CompileError::DuplicateParameter {
                function: "f".to_string(),
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_assignment_targets() {
        for src in [
            "contract C { func f() { 1 = 2 } }",
            "contract C { func f(a: Int, b: Int) { a + b = 3 } }",
        ] {
            assert!(matches!(
                compile_err(src),
                CompileError::InvalidAssignmentTarget { .. }
            ));
        }
    }

    #[test]
    fn test_index_on_non_mapping() {
        let err = compile_err("contract C { var x: Int = 0 func f() { return x[1] } }");
        assert_eq!(
            err,
            CompileError::UnknownMapping {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_mapping_arity() {
        let err = compile_err("contract C { mapping(Int => mapping(Int => Int)) m func f(k: Int) { return m[k] } }");
        assert_eq!(
            err,
            CompileError::MappingArity {
                name: "m".to_string(),
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_front_end_errors_propagate() {
        assert!(matches!(compile_err("contract C { @ }"), CompileError::Lex(_)));
        assert!(matches!(compile_err("contract { }"), CompileError::Parse(_)));
    }

    // =========================================================================
    // Slot allocator
    // =========================================================================

    #[test]
    fn test_slot_allocator_first_use_order() {
        let mut slots = SlotAllocator::new();
        assert_eq!(slots.storage_slot("a"), 0);
        assert_eq!(slots.storage_slot("b"), 1);
        assert_eq!(slots.storage_slot("a"), 0);
        assert_eq!(slots.memory_slot("x"), 0);
        assert_eq!(slots.memory_slot("y"), 1);
        slots.reset_memory();
        assert_eq!(slots.lookup_memory("y"), None);
        assert_eq!(slots.memory_slot("y"), 0);
        assert_eq!(slots.lookup_storage("b"), Some(1));
    }

    #[test]
    fn test_unpatched_placeholder_is_reported() {
        let mut code = CodeBuffer::default();
        let _leak = code.placeholder();
        assert_eq!(
            code.finish(),
            Err(CompileError::UnpatchedJump { pending: 1 })
        );
    }
}
