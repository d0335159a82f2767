use crate::bytecode::CompileError;
use crate::runtime::{ExecutionFault, StorageError};

/// Any failure surfaced by the toolchain.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("execution fault: {0}")]
    Execution(#[from] ExecutionFault),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Error {
    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Compile(CompileError::Lex(_)) => "lex_error",
            Error::Compile(CompileError::Parse(_)) => "parse_error",
            Error::Compile(CompileError::Encoding(_)) => "encoding_error",
            Error::Compile(_) => "compile_error",
            Error::Execution(ExecutionFault::Storage(_)) | Error::Storage(_) => "storage_error",
            Error::Execution(ExecutionFault::Encoding(_)) => "encoding_error",
            Error::Execution(_) => "execution_fault",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
