//! # Sable
//!
//! A minimal smart-contract toolchain: source text is lexed, parsed into a
//! [`Contract`], lowered to [`Bytecode`], and executed by a stack [`Vm`]
//! over 256-bit words with a pluggable [`Storage`] backend.
//!
//! ```no_run
//! use sable::{Value, Vm};
//!
//! let bytecode = sable::compile(
//!     "contract Counter { var count: Int = 7 func add(n: Int) -> Int { return count + n } }",
//! )?;
//! let mut vm = Vm::in_memory();
//! vm.load(bytecode)?;
//! vm.deploy()?;
//! let result = vm.call_function(0, &[Value::from(3)])?;
//! assert_eq!(result.map(|w| w.to_int()), Some(10.into()));
//! # Ok::<(), sable::Error>(())
//! ```

pub mod bytecode;
pub mod error;
pub mod frontend;
pub mod lang;
pub mod runtime;

pub use bytecode::{Bytecode, CompileError, FunctionCode, Op};
pub use error::{Error, Result};
pub use frontend::{LexError, ParseError};
pub use lang::{Address, Contract, EncodingError, Hash, Value, Word};
pub use runtime::{
    ExecutionFault, FileStorage, MemoryStorage, Storage, StorageError, Vm, VmConfig, VmState,
};

/// Compiles contract source to bytecode.
pub fn compile(source: &str) -> std::result::Result<Bytecode, CompileError> {
    bytecode::compile::compile_source(source)
}
