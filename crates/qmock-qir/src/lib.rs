//! QIR Module Decoding for qmock
//!
//! This crate turns the payload of a submitted program into something the
//! execution engine can run. Programs are QIR modules in LLVM textual
//! assembly; the crate recovers the module structure (functions, attribute
//! groups, call instructions and branches) and lowers the kernel body to
//! basic blocks of gate, measurement and reset operations on static qubit
//! addresses. Blocks end in a return, a jump or a branch on a measured bit.
//!
//! # Supported Intrinsics
//!
//! | Kind | Intrinsics |
//! |------|------------|
//! | Single-qubit | `h`, `x`, `y`, `z`, `s`, `s__adj`, `t`, `t__adj` |
//! | Rotations | `rx`, `ry`, `rz`, `r1`, `u3` |
//! | Multi-qubit | `cnot`/`cx`, `cy`, `cz`, `swap`, `ccx` |
//! | Non-unitary | `mz`, `mresetz`, `reset` |
//! | Feedback | `read_result` (with `br i1` on its value) |
//! | Runtime | `__quantum__rt__*` (ignored) |
//!
//! # Example
//!
//! ```rust
//! use qmock_qir::{lower, parse_module};
//!
//! let source = r#"
//! define void @bell() #0 {
//!   call void @__quantum__qis__h__body(ptr null)
//!   call void @__quantum__qis__cnot__body(ptr null, ptr inttoptr (i64 1 to ptr))
//!   call void @__quantum__qis__mz__body(ptr null, ptr null)
//!   call void @__quantum__qis__mz__body(ptr inttoptr (i64 1 to ptr), ptr inttoptr (i64 1 to ptr))
//!   ret void
//! }
//! attributes #0 = { "entry_point" "requiredQubits"="2" }
//! "#;
//!
//! let module = parse_module(source).unwrap();
//! assert!(module.has_entry_point());
//!
//! let function = module.kernel().unwrap();
//! assert_eq!(module.required_qubits(function).unwrap(), Some(2));
//!
//! let kernel = lower(function).unwrap();
//! assert!(kernel.is_straight_line());
//! assert_eq!(kernel.operations().count(), 4);
//! ```

mod error;
mod lexer;
mod lower;
mod module;
mod parser;

pub use error::{ParseError, ParseResult};
pub use lower::{Block, Condition, Gate, Kernel, Operation, Terminator, lower};
pub use module::{
    Attribute, AttributeGroup, ENTRY_POINT_ATTR, Function, Instruction, InstructionKind, Module,
    Operand, REQUIRED_QUBITS_ATTR,
};
pub use parser::{decode_module, parse_module};
