//! Error types for execution engines.

use qmock_qir::ParseError;
use thiserror::Error;

use crate::engine::ModuleHandle;

/// Errors that can occur while loading or running a kernel.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The module could not be compiled.
    #[error("Compilation failed: {0}")]
    Compile(#[from] ParseError),

    /// Kernel symbol is not defined in the module.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Handle does not refer to a loaded module.
    #[error("Module not loaded: {0}")]
    ModuleNotLoaded(ModuleHandle),

    /// Operand addresses a qubit outside the register.
    #[error("Qubit {qubit} out of range for a {num_qubits}-qubit register")]
    QubitOutOfRange { qubit: u64, num_qubits: u32 },

    /// Register is larger than the engine supports.
    #[error("Kernel requires {requested} qubits, engine supports at most {max}")]
    TooManyQubits { requested: u32, max: u32 },

    /// Operation is ill-formed for execution (e.g. repeated operands).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Engine failure unrelated to the submitted program.
    #[error("Execution failed: {0}")]
    Execution(String),
}

impl EngineError {
    /// Whether the error is caused by the submitted program rather than the
    /// engine itself.
    pub fn is_program_error(&self) -> bool {
        !matches!(
            self,
            EngineError::ModuleNotLoaded(_) | EngineError::Execution(_)
        )
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
