//! Program execution: payload decoding and kernel runs on the shared engine.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, instrument, warn};

use qmock_adapter_sim::SimulatorEngine;
use qmock_hal::{ExecutionEngine, LoadedModule, RunConfig};
use qmock_qir::{decode_module, lower};

use crate::config::ExecutorConfig;
use crate::error::{Error, Result};
use crate::metrics::Metrics;

/// Runs submitted programs on a single engine.
///
/// The engine is not reentrant; runs are serialized by a mutex. Callers on
/// an async runtime should invoke this from a blocking worker.
#[derive(Clone)]
pub struct ProgramExecutor {
    engine: Arc<Mutex<Box<dyn ExecutionEngine>>>,
    metrics: Metrics,
}

impl ProgramExecutor {
    /// Wrap an engine.
    pub fn new(engine: Box<dyn ExecutionEngine>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            metrics: Metrics::new(),
        }
    }

    /// Executor backed by the statevector simulator.
    pub fn simulator(config: &ExecutorConfig) -> Self {
        let engine = match config.seed {
            Some(seed) => SimulatorEngine::seeded(config.max_qubits, seed),
            None => SimulatorEngine::with_max_qubits(config.max_qubits),
        };
        Self::new(Box::new(engine))
    }

    /// Number of modules currently loaded in the engine.
    pub fn loaded_modules(&self) -> usize {
        self.engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loaded_modules()
    }

    /// Execute one base64-encoded program and return its histogram as JSON.
    #[instrument(skip(self, program), fields(program_bytes = program.len()))]
    pub fn execute(&self, program: &str, shots: u32) -> Result<String> {
        let start = Instant::now();
        let result = self.run_program(program, shots);

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        self.metrics
            .record_program(outcome, start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    /// Execute a job's programs in order, stopping at the first failure.
    pub fn execute_all(&self, programs: &[String], shots: &[u32]) -> Result<Vec<String>> {
        programs
            .iter()
            .zip(shots)
            .enumerate()
            .map(|(index, (program, &shots))| {
                self.execute(program, shots).inspect_err(|e| {
                    warn!(index, "Program failed, aborting job: {e}");
                })
            })
            .collect()
    }

    fn run_program(&self, program: &str, shots: u32) -> Result<String> {
        let bytes = STANDARD
            .decode(program)
            .map_err(|e| Error::MalformedProgram(format!("invalid base64: {e}")))?;

        let module = decode_module(&bytes)?;
        if !module.has_entry_point() {
            return Err(Error::MalformedProgram(
                "module has no entry_point attribute".to_string(),
            ));
        }

        let function = module.kernel().ok_or(Error::NoKernelFound)?;
        let num_qubits = match module.required_qubits(function)? {
            Some(n) => n,
            None => {
                let inferred = lower(function)?.inferred_qubits();
                warn!(
                    kernel = %function.name,
                    inferred,
                    "Kernel does not declare requiredQubits, inferring from qubit addresses"
                );
                inferred
            }
        };

        info!(kernel = %function.name, num_qubits, shots, "Executing kernel");

        let mut engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        let counts = {
            let mut loaded = LoadedModule::load(&mut **engine, &module)?;
            let kernel = loaded.lookup(&function.name)?;
            loaded.run(&kernel, &RunConfig { num_qubits, shots })?
        };
        drop(engine);

        debug!(distinct = counts.len(), "Kernel finished");
        counts
            .to_json()
            .map_err(|e| Error::Internal(format!("failed to serialize counts: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmock_hal::Counts;

    const BELL: &str = r#"
define void @bell() #0 {
  call void @__quantum__qis__h__body(ptr null)
  call void @__quantum__qis__cnot__body(ptr null, ptr inttoptr (i64 1 to ptr))
  call void @__quantum__qis__mz__body(ptr null, ptr null)
  call void @__quantum__qis__mz__body(ptr inttoptr (i64 1 to ptr), ptr inttoptr (i64 1 to ptr))
  ret void
}
attributes #0 = { "entry_point" "requiredQubits"="2" }
"#;

    fn executor() -> ProgramExecutor {
        ProgramExecutor::simulator(&ExecutorConfig {
            max_qubits: 10,
            seed: Some(17),
        })
    }

    fn encode(source: &str) -> String {
        STANDARD.encode(source)
    }

    #[test]
    fn test_execute_bell() {
        let executor = executor();
        let json = executor.execute(&encode(BELL), 100).unwrap();
        let counts = Counts::from_json(&json).unwrap();
        assert_eq!(counts.total(), 100);
        assert_eq!(counts.get("00") + counts.get("11"), 100);
        assert_eq!(executor.loaded_modules(), 0);
    }

    #[test]
    fn test_invalid_base64() {
        let result = executor().execute("not base64!", 10);
        assert!(matches!(result, Err(Error::MalformedProgram(_))));
    }

    #[test]
    fn test_missing_entry_point() {
        let source = BELL.replace("\"entry_point\" ", "");
        let result = executor().execute(&encode(&source), 10);
        assert!(matches!(result, Err(Error::MalformedProgram(_))));
    }

    #[test]
    fn test_inline_entry_point_attributes() {
        let source = r#"
define void @k() "entry_point" "requiredQubits"="1" {
  call void @__quantum__qis__x__body(ptr null)
  call void @__quantum__qis__mz__body(ptr null, ptr null)
  ret void
}
"#;
        let json = executor().execute(&encode(source), 8).unwrap();
        let counts = Counts::from_json(&json).unwrap();
        assert_eq!(counts.get("1"), 8);
    }

    #[test]
    fn test_adaptive_feedback_program() {
        let source = r#"
define void @feedback() #0 {
entry:
  call void @__quantum__qis__h__body(ptr null)
  call void @__quantum__qis__mz__body(ptr null, ptr null)
  %0 = call i1 @__quantum__qis__read_result__body(ptr null)
  br i1 %0, label %then, label %continue
then:
  call void @__quantum__qis__x__body(ptr inttoptr (i64 1 to ptr))
  br label %continue
continue:
  call void @__quantum__qis__mresetz__body(ptr inttoptr (i64 1 to ptr), ptr inttoptr (i64 1 to ptr))
  ret void
}
attributes #0 = { "entry_point" "qir_profiles"="adaptive_profile" "requiredQubits"="2" }
"#;
        let executor = executor();
        let json = executor.execute(&encode(source), 200).unwrap();
        let counts = Counts::from_json(&json).unwrap();
        assert_eq!(counts.get("00") + counts.get("11"), 200);
        assert_eq!(executor.loaded_modules(), 0);
    }

    #[test]
    fn test_no_kernel() {
        let source = "declare void @f()\nattributes #0 = { \"entry_point\" }\n";
        let result = executor().execute(&encode(source), 10);
        assert!(matches!(result, Err(Error::NoKernelFound)));
    }

    #[test]
    fn test_inferred_qubits() {
        let source = BELL.replace(" \"requiredQubits\"=\"2\"", "");
        let json = executor().execute(&encode(&source), 10).unwrap();
        assert_eq!(Counts::from_json(&json).unwrap().total(), 10);
    }

    #[test]
    fn test_engine_error_unloads_module() {
        let source = BELL.replace("\"requiredQubits\"=\"2\"", "\"requiredQubits\"=\"12\"");
        let executor = executor();
        let result = executor.execute(&encode(&source), 10);
        assert!(matches!(result, Err(Error::Engine(_))));
        assert_eq!(executor.loaded_modules(), 0);
    }

    #[test]
    fn test_execute_all_aborts_on_failure() {
        let executor = executor();
        let programs = vec![encode(BELL), "%%%".to_string(), encode(BELL)];
        let result = executor.execute_all(&programs, &[10, 10, 10]);
        assert!(matches!(result, Err(Error::MalformedProgram(_))));

        let results = executor
            .execute_all(&[encode(BELL), encode(BELL)], &[5, 7])
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(Counts::from_json(&results[1]).unwrap().total(), 7);
    }
}
