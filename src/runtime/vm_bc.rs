use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::Zero;
use tracing::{debug, trace, warn};

use crate::bytecode::{Bytecode, Op};
use crate::lang::hash::{Address, Hash};
use crate::lang::value::Value;
use crate::lang::word::Word;
use crate::runtime::runtime_error::ExecutionFault;
use crate::runtime::storage::{MemoryStorage, Storage, StorageError};

#[derive(Debug, Clone)]
pub struct VmConfig {
    pub max_stack_size: usize,
    /// Runaway guard, not a cost model. `None` means unbounded.
    pub max_steps: Option<usize>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_stack_size: 1024,
            max_steps: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Ready,
    Running,
    Halted,
    Faulted,
}

/// Key of the serialized bytecode in the account index.
fn bytecode_key(address: &Address) -> String {
    format!("{}:bytecode", address)
}

/// Stack machine over 256-bit words.
///
/// `storage` backs SLOAD/SSTORE; `accounts` maps the contract address to
/// its storage root and holds the deployed bytecode. One instance runs one
/// call at a time.
pub struct Vm<S = MemoryStorage, A = MemoryStorage> {
    storage: S,
    accounts: A,
    bytecode: Option<Arc<Bytecode>>,
    address: Option<Address>,

    stack: Vec<Word>,
    /// Call-scoped. Parameters live under their text-encoded names, locals
    /// under their slot numbers.
    memory: HashMap<Word, Word>,
    pc: usize,
    current_op: &'static str,

    // Safety limits
    config: VmConfig,
    steps: usize,
    state: VmState,
}

impl Vm<MemoryStorage, MemoryStorage> {
    pub fn in_memory() -> Self {
        Vm::new(MemoryStorage::new(), MemoryStorage::new())
    }
}

impl<S: Storage, A: Storage> Vm<S, A> {
    pub fn new(storage: S, accounts: A) -> Self {
        Self::with_config(storage, accounts, VmConfig::default())
    }

    pub fn with_config(storage: S, accounts: A, config: VmConfig) -> Self {
        Self {
            storage,
            accounts,
            bytecode: None,
            address: None,
            stack: Vec::new(),
            memory: HashMap::new(),
            pc: 0,
            current_op: "",
            config,
            steps: 0,
            state: VmState::Ready,
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    /// Address of the loaded bytecode.
    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn accounts(&self) -> &A {
        &self.accounts
    }

    /// Makes `bytecode` the current program and returns its address.
    pub fn load(&mut self, bytecode: Bytecode) -> Result<Address, ExecutionFault> {
        let address = bytecode.address()?;
        debug!(%address, functions = bytecode.functions.len(), "loaded bytecode");
        self.bytecode = Some(Arc::new(bytecode));
        self.address = Some(address);
        self.stack.clear();
        self.memory.clear();
        self.state = VmState::Ready;
        Ok(address)
    }

    fn loaded(&self) -> Result<(Arc<Bytecode>, Address), ExecutionFault> {
        match (&self.bytecode, self.address) {
            (Some(bytecode), Some(address)) => Ok((Arc::clone(bytecode), address)),
            _ => Err(ExecutionFault::NotLoaded),
        }
    }

    /// Runs the initialization code once, then records the bytecode and
    /// the storage root under the contract address.
    pub fn deploy(&mut self) -> Result<Address, ExecutionFault> {
        let (bytecode, address) = self.loaded()?;
        debug!(%address, "deploying contract");

        self.stack.clear();
        self.memory.clear();
        self.run(&bytecode.initialization)?;

        self.accounts
            .insert(&bytecode_key(&address), bytecode.to_bytes()?)?;
        self.refresh_root(&address)?;
        Ok(address)
    }

    /// Decodes the bytecode deployed at `address`.
    pub fn get_bytecode(&self, address: &Address) -> Result<Bytecode, ExecutionFault> {
        let key = bytecode_key(address);
        let blob = self
            .accounts
            .get(&key)?
            .ok_or(ExecutionFault::MissingStorageKey(key))?;
        Bytecode::from_bytes(&blob)
    }

    /// Calls function `index` with host values, encoding each to a word.
    pub fn call_function(
        &mut self,
        index: usize,
        args: &[Value],
    ) -> Result<Option<Word>, ExecutionFault> {
        let words = args
            .iter()
            .map(Value::encode)
            .collect::<Result<Vec<_>, _>>()?;
        self.call_function_words(index, &words)
    }

    /// Calls function `index`. Returns the top of the stack at halt, if any.
    ///
    /// Stack and memory start empty; `args[i]` is bound under `params[i]`.
    /// Missing trailing arguments stay unbound and fault only if read.
    pub fn call_function_words(
        &mut self,
        index: usize,
        args: &[Word],
    ) -> Result<Option<Word>, ExecutionFault> {
        let (bytecode, address) = self.loaded()?;
        let function = bytecode
            .function(index)
            .ok_or(ExecutionFault::UndefinedFunction(index))?;
        if args.len() > function.params.len() {
            return Err(ExecutionFault::TooManyArguments {
                index,
                expected: function.params.len(),
                got: args.len(),
            });
        }

        debug!(%address, index, args = args.len(), "calling function");
        self.stack.clear();
        self.memory.clear();
        for (param, arg) in function.params.iter().zip(args) {
            self.memory.insert(*param, *arg);
        }

        self.run(&function.body)
    }

    fn run(&mut self, ops: &[Op]) -> Result<Option<Word>, ExecutionFault> {
        self.pc = 0;
        self.steps = 0;
        self.state = VmState::Running;

        match self.exec_ops(ops) {
            Ok(()) => {
                self.state = VmState::Halted;
                Ok(self.stack.last().copied())
            }
            Err(fault) => {
                self.state = VmState::Faulted;
                warn!(pc = self.pc, op = self.current_op, %fault, "execution fault");
                Err(fault)
            }
        }
    }

    // Execution

    fn check_limits(&mut self) -> Result<(), ExecutionFault> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(ExecutionFault::StepLimitExceeded(max));
            }
        }

        Ok(())
    }

    fn exec_ops(&mut self, ops: &[Op]) -> Result<(), ExecutionFault> {
        while self.pc < ops.len() {
            self.check_limits()?;

            let op = ops[self.pc];
            self.current_op = op.mnemonic();
            trace!(pc = self.pc, %op, depth = self.stack.len(), "step");
            self.pc += 1;

            match op {
                Op::Push(w) => self.push(w)?,
                Op::PushParam(key) => {
                    let value = *self
                        .memory
                        .get(&key)
                        .ok_or_else(|| ExecutionFault::UndefinedParameter(key.describe()))?;
                    self.push(value)?;
                }
                Op::Pop => {
                    self.pop()?;
                }

                // Storage
                Op::Sload => {
                    let addr = self.pop()?;
                    let key = addr.to_hex();
                    let bytes = self
                        .storage
                        .get(&key)?
                        .ok_or(ExecutionFault::MissingStorageKey(key.clone()))?;
                    let value = Word::from_slice(&bytes).ok_or_else(|| {
                        StorageError::Corrupt(format!(
                            "value at {} is {} bytes, expected a word",
                            key,
                            bytes.len()
                        ))
                    })?;
                    self.push(value)?;
                }
                Op::Sstore => {
                    let addr = self.pop()?;
                    let value = self.pop()?;
                    let key = addr.to_hex();
                    trace!(key = %key, value = %value.describe(), "sstore");
                    self.storage.insert(&key, value.as_bytes().to_vec())?;
                    let address = self.address.ok_or(ExecutionFault::NotLoaded)?;
                    self.refresh_root(&address)?;
                }

                // Memory
                Op::Mload => {
                    let addr = self.pop()?;
                    let value = *self
                        .memory
                        .get(&addr)
                        .ok_or_else(|| ExecutionFault::MissingMemorySlot(addr.describe()))?;
                    self.push(value)?;
                }
                Op::Mstore => {
                    let addr = self.pop()?;
                    let value = self.pop()?;
                    self.memory.insert(addr, value);
                }

                Op::Hash256 => {
                    let value = self.pop()?;
                    let digest = Hash::digest(value.as_bytes());
                    self.push(Word(digest.0))?;
                }

                // Arithmetic
                Op::Add => self.binary_int(|l, r| Ok(l + r))?,
                Op::Subtract => self.binary_int(|l, r| Ok(l - r))?,
                Op::Multiply => self.binary_int(|l, r| Ok(l * r))?,
                Op::Divide => {
                    let pc = self.pc - 1;
                    self.binary_int(|l, r| {
                        if r.is_zero() {
                            return Err(ExecutionFault::DivisionByZero { pc });
                        }
                        // ceil(l / r) == -floor(-l / r)
                        Ok(-((-l).div_floor(&r)))
                    })?
                }
                Op::Modulo => {
                    let pc = self.pc - 1;
                    self.binary_int(|l, r| {
                        if r.is_zero() {
                            return Err(ExecutionFault::DivisionByZero { pc });
                        }
                        Ok(l % r)
                    })?
                }

                // Logic
                Op::And => self.binary_bool(|l, r| l && r)?,
                Op::Or => self.binary_bool(|l, r| l || r)?,

                // Comparison
                Op::Equal => self.compare(|l, r| l == r)?,
                Op::NotEqual => self.compare(|l, r| l != r)?,
                Op::GreaterThan => self.compare(|l, r| l > r)?,
                Op::LessThan => self.compare(|l, r| l < r)?,
                Op::GreaterThanEqual => self.compare(|l, r| l >= r)?,
                Op::LessThanEqual => self.compare(|l, r| l <= r)?,

                // Control flow
                Op::Jump => {
                    let target = self.pop()?;
                    self.pc = Self::jump_target(target, ops.len())?;
                }
                Op::Jumpi => {
                    let condition = self.pop()?;
                    let target = self.pop()?;
                    if !condition.to_bool() {
                        self.pc = Self::jump_target(target, ops.len())?;
                    }
                }
            }
        }

        Ok(())
    }

    /// A target equal to `len` halts the run.
    fn jump_target(target: Word, len: usize) -> Result<usize, ExecutionFault> {
        match target.to_usize() {
            Some(t) if t <= len => Ok(t),
            _ => Err(ExecutionFault::JumpOutOfBounds {
                target: target.describe(),
                len,
            }),
        }
    }

    fn refresh_root(&mut self, address: &Address) -> Result<(), ExecutionFault> {
        let root = self.storage.root_hash()?;
        self.accounts
            .insert(&address.to_string(), root.as_slice().to_vec())?;
        Ok(())
    }

    // Stack operations

    fn push(&mut self, value: Word) -> Result<(), ExecutionFault> {
        if self.stack.len() >= self.config.max_stack_size {
            return Err(ExecutionFault::StackOverflow {
                limit: self.config.max_stack_size,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Word, ExecutionFault> {
        self.stack.pop().ok_or(ExecutionFault::StackUnderflow {
            op: self.current_op,
            pc: self.pc.saturating_sub(1),
        })
    }

    /// Pops right then left, applies `f` to their signed values and pushes
    /// the result reduced modulo 2^256.
    fn binary_int(
        &mut self,
        f: impl FnOnce(BigInt, BigInt) -> Result<BigInt, ExecutionFault>,
    ) -> Result<(), ExecutionFault> {
        let right = self.pop()?.to_int();
        let left = self.pop()?.to_int();
        let result = f(left, right)?;
        self.push(Word::wrapping_from_int(&result))
    }

    fn binary_bool(&mut self, f: impl FnOnce(bool, bool) -> bool) -> Result<(), ExecutionFault> {
        let right = self.pop()?.to_bool();
        let left = self.pop()?.to_bool();
        self.push(Word::from_bool(f(left, right)))
    }

    fn compare(&mut self, f: impl FnOnce(&BigInt, &BigInt) -> bool) -> Result<(), ExecutionFault> {
        let right = self.pop()?.to_int();
        let left = self.pop()?.to_int();
        self.push(Word::from_bool(f(&left, &right)))
    }
}
