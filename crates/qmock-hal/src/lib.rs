//! qmock Hardware Abstraction Layer
//!
//! Shared vocabulary between the qmock server, its execution engines and
//! clients:
//! - the job wire contract ([`JobRequest`], [`JobStatus`], [`JobId`])
//! - measurement histograms ([`Counts`])
//! - the [`ExecutionEngine`] trait and the scoped [`LoadedModule`] guard
//!
//! # Example: Reading a Completed Job
//!
//! ```rust
//! use qmock_hal::{Counts, JobStatus};
//!
//! let body = r#"[{"status":"Completed","result":["{\"00\":6,\"11\":4}"]}]"#;
//! let statuses: Vec<JobStatus> = serde_json::from_str(body).unwrap();
//!
//! let JobStatus::Completed { result } = &statuses[0] else {
//!     panic!("job not complete");
//! };
//! let counts = Counts::from_json(&result[0]).unwrap();
//! assert_eq!(counts.total(), 10);
//! assert_eq!(counts.most_frequent(), Some(("00", 6)));
//! ```

pub mod engine;
pub mod error;
pub mod job;
pub mod result;

pub use engine::{ExecutionEngine, KernelRef, LoadedModule, ModuleHandle, RunConfig};
pub use error::{EngineError, EngineResult};
pub use job::{JobId, JobRequest, JobStatus, LANGUAGE_QIR_BITCODE};
pub use result::Counts;
