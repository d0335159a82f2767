pub mod runtime_error;
pub mod storage;
pub mod vm_bc;

pub use runtime_error::ExecutionFault;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use vm_bc::{Vm, VmConfig, VmState};
