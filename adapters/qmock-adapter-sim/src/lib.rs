//! qmock Statevector Execution Engine
//!
//! [`SimulatorEngine`] implements [`qmock_hal::ExecutionEngine`] by lowering
//! QIR kernels and simulating them on a full statevector. Results are exact
//! up to sampling noise; register size is limited by memory.
//!
//! # Measurement Semantics
//!
//! - Bitstrings list measured results in result-index order.
//! - A kernel that measures nothing is measured on every qubit at the end,
//!   qubit 0 first.
//! - Mid-circuit measurement collapses the state; `reset` measures and
//!   flips on a one. Such kernels are simulated shot by shot, all others
//!   are simulated once and sampled.
//!
//! # Memory
//!
//! | Qubits | Memory |
//! |--------|--------|
//! | 10 | ~16 KB |
//! | 15 | ~512 KB |
//! | 20 | ~16 MB |
//! | 25 | ~512 MB |
//!
//! # Example
//!
//! ```rust
//! use qmock_adapter_sim::SimulatorEngine;
//! use qmock_hal::{LoadedModule, RunConfig};
//! use qmock_qir::parse_module;
//!
//! let module = parse_module(r#"
//! define void @flip() #0 {
//!   call void @__quantum__qis__x__body(ptr null)
//!   call void @__quantum__qis__mz__body(ptr null, ptr null)
//!   ret void
//! }
//! attributes #0 = { "entry_point" }
//! "#).unwrap();
//!
//! let mut engine = SimulatorEngine::seeded(20, 1);
//! let mut loaded = LoadedModule::load(&mut engine, &module).unwrap();
//! let kernel = loaded.lookup("flip").unwrap();
//! let counts = loaded.run(&kernel, &RunConfig { num_qubits: 1, shots: 8 }).unwrap();
//! assert_eq!(counts.get("1"), 8);
//! ```

mod simulator;
mod statevector;

pub use simulator::{DEFAULT_MAX_QUBITS, SimulatorEngine};
