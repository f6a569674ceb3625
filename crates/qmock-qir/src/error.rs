//! Error types for QIR decoding.

use thiserror::Error;

/// Errors that can occur while parsing or lowering a QIR module.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Lexer error (invalid token).
    #[error("Lexer error at position {position}: {message}")]
    LexerError { position: usize, message: String },

    /// Payload is LLVM bitcode rather than textual IR.
    #[error("LLVM bitcode modules are not supported; submit textual QIR")]
    Bitcode,

    /// Payload is not valid UTF-8.
    #[error("Module is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Unexpected token.
    #[error("Unexpected token at line {line}: expected {expected}, found {found}")]
    UnexpectedToken {
        line: usize,
        expected: String,
        found: String,
    },

    /// Unexpected end of input.
    #[error("Unexpected end of input: {0}")]
    UnexpectedEof(String),

    /// Attribute value could not be interpreted.
    #[error("Invalid attribute '{key}': {value}")]
    InvalidAttribute { key: String, value: String },

    /// Call to a quantum intrinsic this lowering does not know.
    #[error("Unknown intrinsic at line {line}: {name}")]
    UnknownIntrinsic { line: usize, name: String },

    /// Instruction the interpreter cannot execute.
    #[error("Unsupported instruction at line {line}: {text}")]
    UnsupportedInstruction { line: usize, text: String },

    /// Branch to a label the function does not define.
    #[error("Unknown label at line {line}: %{label}")]
    UnknownLabel { line: usize, label: String },

    /// Wrong number of operands to an intrinsic.
    #[error("Intrinsic '{name}' expects {expected} operands, got {got}")]
    WrongOperandCount {
        name: String,
        expected: usize,
        got: usize,
    },

    /// Operand is not of the expected kind.
    #[error("Invalid operand {index} to '{name}': expected {expected}")]
    InvalidOperand {
        name: String,
        index: usize,
        expected: &'static str,
    },

    /// Function is a declaration and has no body to lower.
    #[error("Function '{0}' has no body")]
    NoBody(String),
}

/// Result type for QIR operations.
pub type ParseResult<T> = Result<T, ParseError>;
