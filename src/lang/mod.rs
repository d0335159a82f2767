//! # Sable language model
//!
//! This module defines the contract AST produced by the parser and consumed
//! by the bytecode generator, plus the value types shared by the generator
//! and the virtual machine.
//!
//! ## Layout
//!
//! - [`contract`]: top-level declarations (variables, mappings, functions)
//! - [`node`]: statements and flat infix expressions
//! - [`word`]: the 256-bit word and its encoding rules
//! - [`value`]: host-side call arguments
//! - [`hash`]: SHA-256 digests, contract addresses and storage roots

pub mod contract;
pub mod hash;
pub mod node;
pub mod value;
pub mod word;

pub use contract::Contract;
pub use hash::{Address, Hash};
pub use value::Value;
pub use word::{EncodingError, Word};
