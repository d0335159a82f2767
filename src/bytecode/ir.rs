use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bytecode::Op;
use crate::bytecode::op::RawInstruction;
use crate::lang::hash::{Address, Hash};
use crate::lang::word::Word;
use crate::runtime::runtime_error::ExecutionFault;

/// A compiled contract.
///
/// JSON form:
///
/// ```text
/// { "initialization": [ {"opcode": "PUSH", "value": "<64 hex>"}, ... ],
///   "functions": { "0": { "params": ["<64 hex>"], "body": [ ... ] } } }
/// ```
///
/// The postcard encoding is canonical; its SHA-256 is the contract address.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawBytecode")]
pub struct Bytecode {
    /// Runs once, on deploy.
    pub initialization: Vec<Op>,

    /// Function table, indexed by declaration order.
    pub functions: BTreeMap<usize, FunctionCode>,
}

/// A single compiled function.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionCode {
    /// Parameter names, text-encoded. Argument `i` is bound in memory under
    /// `params[i]`.
    pub params: Vec<Word>,

    /// Jump targets index into this list only.
    pub body: Vec<Op>,
}

/// Wire shape before opcode validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBytecode {
    #[serde(default)]
    pub initialization: Vec<RawInstruction>,
    #[serde(default)]
    pub functions: BTreeMap<usize, RawFunctionCode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFunctionCode {
    #[serde(default)]
    pub params: Vec<Word>,
    #[serde(default)]
    pub body: Vec<RawInstruction>,
}

fn validate(raw: Vec<RawInstruction>) -> Result<Vec<Op>, ExecutionFault> {
    raw.into_iter().map(Op::try_from).collect()
}

impl TryFrom<RawBytecode> for Bytecode {
    type Error = ExecutionFault;

    fn try_from(raw: RawBytecode) -> Result<Self, Self::Error> {
        let initialization = validate(raw.initialization)?;
        let functions = raw
            .functions
            .into_iter()
            .map(|(index, f)| {
                Ok((
                    index,
                    FunctionCode {
                        params: f.params,
                        body: validate(f.body)?,
                    },
                ))
            })
            .collect::<Result<_, ExecutionFault>>()?;
        Ok(Bytecode {
            initialization,
            functions,
        })
    }
}

impl Bytecode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(&self, index: usize) -> Option<&FunctionCode> {
        self.functions.get(&index)
    }

    pub fn to_json(&self) -> Result<String, ExecutionFault> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ExecutionFault::InvalidBytecode(e.to_string()))
    }

    /// Parses the JSON form. Unknown mnemonics come back as
    /// `ExecutionFault::UnknownOpcode`, not as a generic decode error.
    pub fn from_json(text: &str) -> Result<Bytecode, ExecutionFault> {
        let raw: RawBytecode = serde_json::from_str(text)
            .map_err(|e| ExecutionFault::InvalidBytecode(e.to_string()))?;
        Bytecode::try_from(raw)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ExecutionFault> {
        postcard::to_allocvec(self).map_err(|e| ExecutionFault::InvalidBytecode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Bytecode, ExecutionFault> {
        let raw: RawBytecode = postcard::from_bytes(bytes)
            .map_err(|e| ExecutionFault::InvalidBytecode(e.to_string()))?;
        Bytecode::try_from(raw)
    }

    /// SHA-256 of the postcard encoding.
    pub fn address(&self) -> Result<Address, ExecutionFault> {
        Ok(Hash::digest(&self.to_bytes()?))
    }

    /// Total instruction count across initialization and all functions.
    pub fn len(&self) -> usize {
        let functions: usize = self.functions.values().map(|f| f.body.len()).sum();
        self.initialization.len() + functions
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
