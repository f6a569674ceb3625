//! Execution engine abstraction.
//!
//! An engine compiles modules into runnable kernels and executes them:
//!
//! ```text
//!   add_module() ──→ lookup() ──→ run() ──→ remove_module()
//! ```
//!
//! [`LoadedModule`] scopes the first and last step so a module is unloaded
//! on every exit path.

use std::fmt;

use qmock_qir::Module;
use tracing::warn;

use crate::error::EngineResult;
use crate::result::Counts;

/// Handle to a module loaded into an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u64);

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// A resolved kernel symbol inside a loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelRef {
    pub module: ModuleHandle,
    pub symbol: String,
}

/// Parameters of a single kernel run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Size of the qubit register.
    pub num_qubits: u32,
    /// Number of repetitions.
    pub shots: u32,
}

/// An engine able to compile and run QIR kernels.
pub trait ExecutionEngine: Send {
    /// Engine name, for logs.
    fn name(&self) -> &str;

    /// Compile every defined function in `module` and keep the result loaded.
    fn add_module(&mut self, module: &Module) -> EngineResult<ModuleHandle>;

    /// Resolve a kernel by symbol name.
    fn lookup(&self, handle: ModuleHandle, symbol: &str) -> EngineResult<KernelRef>;

    /// Run a kernel and collect the measured histogram.
    fn run(&mut self, kernel: &KernelRef, config: &RunConfig) -> EngineResult<Counts>;

    /// Unload a module.
    fn remove_module(&mut self, handle: ModuleHandle) -> EngineResult<()>;

    /// Number of modules currently loaded.
    fn loaded_modules(&self) -> usize;
}

/// A module loaded for the lifetime of this guard.
pub struct LoadedModule<'e> {
    engine: &'e mut dyn ExecutionEngine,
    handle: ModuleHandle,
}

impl<'e> LoadedModule<'e> {
    /// Load `module` into `engine`.
    pub fn load(engine: &'e mut dyn ExecutionEngine, module: &Module) -> EngineResult<Self> {
        let handle = engine.add_module(module)?;
        Ok(Self { engine, handle })
    }

    /// Handle of the loaded module.
    pub fn handle(&self) -> ModuleHandle {
        self.handle
    }

    /// Resolve a kernel in this module.
    pub fn lookup(&self, symbol: &str) -> EngineResult<KernelRef> {
        self.engine.lookup(self.handle, symbol)
    }

    /// Run a kernel resolved from this module.
    pub fn run(&mut self, kernel: &KernelRef, config: &RunConfig) -> EngineResult<Counts> {
        self.engine.run(kernel, config)
    }
}

impl Drop for LoadedModule<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.engine.remove_module(self.handle) {
            warn!(handle = %self.handle, engine = self.engine.name(), "Failed to unload module: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use rustc_hash::FxHashSet;

    #[derive(Default)]
    struct RecordingEngine {
        next: u64,
        loaded: FxHashSet<u64>,
    }

    impl ExecutionEngine for RecordingEngine {
        fn name(&self) -> &str {
            "recording"
        }

        fn add_module(&mut self, _module: &Module) -> EngineResult<ModuleHandle> {
            self.next += 1;
            self.loaded.insert(self.next);
            Ok(ModuleHandle(self.next))
        }

        fn lookup(&self, handle: ModuleHandle, symbol: &str) -> EngineResult<KernelRef> {
            if symbol == "missing" {
                return Err(EngineError::SymbolNotFound(symbol.to_string()));
            }
            Ok(KernelRef {
                module: handle,
                symbol: symbol.to_string(),
            })
        }

        fn run(&mut self, _kernel: &KernelRef, config: &RunConfig) -> EngineResult<Counts> {
            let mut counts = Counts::new();
            counts.insert("0", u64::from(config.shots));
            Ok(counts)
        }

        fn remove_module(&mut self, handle: ModuleHandle) -> EngineResult<()> {
            if self.loaded.remove(&handle.0) {
                Ok(())
            } else {
                Err(EngineError::ModuleNotLoaded(handle))
            }
        }

        fn loaded_modules(&self) -> usize {
            self.loaded.len()
        }
    }

    #[test]
    fn test_module_unloaded_after_run() {
        let mut engine = RecordingEngine::default();
        {
            let mut loaded = LoadedModule::load(&mut engine, &Module::default()).unwrap();
            let kernel = loaded.lookup("k").unwrap();
            let counts = loaded
                .run(
                    &kernel,
                    &RunConfig {
                        num_qubits: 1,
                        shots: 10,
                    },
                )
                .unwrap();
            assert_eq!(counts.total(), 10);
        }
        assert_eq!(engine.loaded_modules(), 0);
    }

    #[test]
    fn test_module_unloaded_on_error_path() {
        fn resolve(engine: &mut dyn ExecutionEngine) -> EngineResult<KernelRef> {
            let loaded = LoadedModule::load(engine, &Module::default())?;
            loaded.lookup("missing")
        }

        let mut engine = RecordingEngine::default();
        assert!(matches!(
            resolve(&mut engine),
            Err(EngineError::SymbolNotFound(_))
        ));
        assert_eq!(engine.loaded_modules(), 0);
    }
}
