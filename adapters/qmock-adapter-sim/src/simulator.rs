//! Simulator execution engine.

use std::collections::BTreeMap;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use qmock_hal::{
    Counts, EngineError, EngineResult, ExecutionEngine, KernelRef, ModuleHandle, RunConfig,
};
use qmock_qir::{Condition, Kernel, Module, Operation, Terminator, lower};

use crate::statevector::Statevector;

/// Default register limit.
pub const DEFAULT_MAX_QUBITS: u32 = 20;

/// Blocks a single shot may enter before the kernel is treated as looping forever.
const MAX_BLOCK_VISITS: usize = 100_000;

/// Local statevector execution engine.
///
/// Modules are lowered to kernels when they are added; kernels are executed
/// by statevector simulation. Registers are limited to ~20 qubits by memory.
pub struct SimulatorEngine {
    /// Loaded modules, keyed by handle, each mapping symbol to kernel.
    modules: FxHashMap<ModuleHandle, FxHashMap<String, Kernel>>,
    /// Next handle to hand out.
    next_handle: u64,
    /// Maximum number of qubits supported.
    max_qubits: u32,
    rng: StdRng,
}

impl SimulatorEngine {
    /// Create a new engine with default settings and an entropy-seeded RNG.
    pub fn new() -> Self {
        Self::with_rng(DEFAULT_MAX_QUBITS, StdRng::from_entropy())
    }

    /// Create an engine with a custom register limit.
    pub fn with_max_qubits(max_qubits: u32) -> Self {
        Self::with_rng(max_qubits, StdRng::from_entropy())
    }

    /// Create an engine whose sampling is reproducible.
    pub fn seeded(max_qubits: u32, seed: u64) -> Self {
        Self::with_rng(max_qubits, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_qubits: u32, rng: StdRng) -> Self {
        Self {
            modules: FxHashMap::default(),
            next_handle: 0,
            max_qubits,
            rng,
        }
    }

    /// Maximum number of qubits supported.
    pub fn max_qubits(&self) -> u32 {
        self.max_qubits
    }

    fn kernel(&self, kernel: &KernelRef) -> EngineResult<&Kernel> {
        self.modules
            .get(&kernel.module)
            .ok_or(EngineError::ModuleNotLoaded(kernel.module))?
            .get(&kernel.symbol)
            .ok_or_else(|| EngineError::SymbolNotFound(kernel.symbol.clone()))
    }

    /// Check the kernel fits the register and every operation is well formed.
    fn validate(&self, kernel: &Kernel, num_qubits: u32) -> EngineResult<()> {
        if num_qubits > self.max_qubits {
            return Err(EngineError::TooManyQubits {
                requested: num_qubits,
                max: self.max_qubits,
            });
        }

        for op in kernel.operations() {
            let qubits = op.qubits();
            if let Some(&qubit) = qubits.iter().find(|&&q| q >= u64::from(num_qubits)) {
                return Err(EngineError::QubitOutOfRange { qubit, num_qubits });
            }
            for (i, q) in qubits.iter().enumerate() {
                if qubits[i + 1..].contains(q) {
                    return Err(EngineError::InvalidOperation(format!(
                        "{op:?} uses qubit {q} more than once"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Simulate once and sample the final state. Only valid for straight-line
    /// kernels where no measurement or reset affects later operations.
    fn run_sampled(&mut self, kernel: &Kernel, num_qubits: usize, shots: u32) -> Counts {
        let mut sv = Statevector::new(num_qubits);
        // Result slot -> measured qubit, last write wins.
        let mut results = BTreeMap::new();

        for op in kernel.operations() {
            match op {
                Operation::Gate { gate, qubits } => sv.apply_gate(gate, &as_indices(qubits)),
                Operation::Measure { qubit, result } => {
                    results.insert(*result, *qubit as usize);
                }
                Operation::Reset { .. } | Operation::ReadResult { .. } => {}
            }
        }

        let mut counts = Counts::new();
        for _ in 0..shots {
            let outcome = sv.sample(&mut self.rng);
            let bitstring = if results.is_empty() {
                sv.outcome_to_bitstring(outcome)
            } else {
                results
                    .values()
                    .map(|q| if outcome & (1 << q) != 0 { '1' } else { '0' })
                    .collect()
            };
            counts.insert(bitstring, 1);
        }
        counts
    }

    /// Simulate every shot from scratch, collapsing on each measurement.
    fn run_per_shot(
        &mut self,
        kernel: &Kernel,
        num_qubits: usize,
        shots: u32,
    ) -> EngineResult<Counts> {
        let mut counts = Counts::new();

        for shot in 0..shots {
            let mut sv = Statevector::new(num_qubits);
            let results = self.interpret(kernel, &mut sv)?;

            let bitstring = if results.is_empty() {
                let outcome = sv.sample(&mut self.rng);
                sv.outcome_to_bitstring(outcome)
            } else {
                results
                    .values()
                    .map(|&bit| if bit { '1' } else { '0' })
                    .collect()
            };
            counts.insert(bitstring, 1);

            if shot > 0 && shot % 1000 == 0 {
                debug!("Completed {} shots", shot);
            }
        }
        Ok(counts)
    }

    /// Run one shot of `kernel` on `sv`, following branches on measured bits.
    ///
    /// Returns the bit recorded in each result slot.
    fn interpret(
        &mut self,
        kernel: &Kernel,
        sv: &mut Statevector,
    ) -> EngineResult<BTreeMap<u64, bool>> {
        let mut results = BTreeMap::new();
        let mut values: FxHashMap<&str, bool> = FxHashMap::default();
        let mut current = 0;

        for _ in 0..MAX_BLOCK_VISITS {
            let Some(block) = kernel.blocks.get(current) else {
                return Ok(results);
            };

            for op in &block.operations {
                match op {
                    Operation::Gate { gate, qubits } => sv.apply_gate(gate, &as_indices(qubits)),
                    Operation::Measure { qubit, result } => {
                        let bit = sv.measure(*qubit as usize, &mut self.rng);
                        results.insert(*result, bit);
                    }
                    Operation::Reset { qubit } => sv.reset(*qubit as usize, &mut self.rng),
                    Operation::ReadResult { result, dest } => {
                        // Results never written read as zero.
                        let bit = results.get(result).copied().unwrap_or(false);
                        values.insert(dest.as_str(), bit);
                    }
                }
            }

            current = match &block.terminator {
                Terminator::Return => return Ok(results),
                Terminator::Jump(next) => *next,
                Terminator::Branch {
                    condition,
                    if_true,
                    if_false,
                } => {
                    let taken = match condition {
                        Condition::Const(bit) => *bit,
                        Condition::Value(name) => {
                            values.get(name.as_str()).copied().ok_or_else(|| {
                                EngineError::InvalidOperation(format!(
                                    "branch on %{name} before it is defined"
                                ))
                            })?
                        }
                    };
                    if taken { *if_true } else { *if_false }
                }
            };
        }

        Err(EngineError::InvalidOperation(format!(
            "kernel {} did not return after {MAX_BLOCK_VISITS} blocks",
            kernel.name
        )))
    }
}

impl Default for SimulatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn as_indices(qubits: &[u64]) -> Vec<usize> {
    qubits.iter().map(|&q| q as usize).collect()
}

impl ExecutionEngine for SimulatorEngine {
    fn name(&self) -> &str {
        "simulator"
    }

    #[instrument(skip(self, module), fields(functions = module.functions.len()))]
    fn add_module(&mut self, module: &Module) -> EngineResult<ModuleHandle> {
        let mut kernels = FxHashMap::default();
        for function in module.defined_functions() {
            let kernel = lower(function)?;
            debug!(
                "Compiled {} ({} blocks, {} operations)",
                kernel.name,
                kernel.blocks.len(),
                kernel.operations().count()
            );
            kernels.insert(kernel.name.clone(), kernel);
        }

        self.next_handle += 1;
        let handle = ModuleHandle(self.next_handle);
        self.modules.insert(handle, kernels);
        Ok(handle)
    }

    fn lookup(&self, handle: ModuleHandle, symbol: &str) -> EngineResult<KernelRef> {
        let kernels = self
            .modules
            .get(&handle)
            .ok_or(EngineError::ModuleNotLoaded(handle))?;
        if !kernels.contains_key(symbol) {
            return Err(EngineError::SymbolNotFound(symbol.to_string()));
        }
        Ok(KernelRef {
            module: handle,
            symbol: symbol.to_string(),
        })
    }

    #[instrument(skip(self), fields(symbol = %kernel.symbol))]
    fn run(&mut self, kernel: &KernelRef, config: &RunConfig) -> EngineResult<Counts> {
        let start = Instant::now();

        // Cloned so sampling can borrow the RNG mutably.
        let compiled = self.kernel(kernel)?.clone();
        self.validate(&compiled, config.num_qubits)?;

        let num_qubits = config.num_qubits as usize;
        let has_reset = compiled
            .operations()
            .any(|op| matches!(op, Operation::Reset { .. }));

        let counts = if compiled.is_straight_line()
            && compiled.measurements_are_terminal()
            && !has_reset
        {
            self.run_sampled(&compiled, num_qubits, config.shots)
        } else {
            debug!("Kernel has branches, mid-circuit measurement or reset, simulating per shot");
            self.run_per_shot(&compiled, num_qubits, config.shots)?
        };

        debug!(
            "Simulation of {} qubits, {} shots completed in {:?}",
            num_qubits,
            config.shots,
            start.elapsed()
        );
        Ok(counts)
    }

    fn remove_module(&mut self, handle: ModuleHandle) -> EngineResult<()> {
        self.modules
            .remove(&handle)
            .map(|_| ())
            .ok_or(EngineError::ModuleNotLoaded(handle))
    }

    fn loaded_modules(&self) -> usize {
        self.modules.len()
    }
}
