//! Client for the mock QPU job API.
//!
//! Builds job payloads from compiled kernels, discovers credentials, submits
//! jobs and polls them to completion.
//!
//! # Example
//!
//! ```rust,no_run
//! use qmock_client::{ClientConfig, KernelCode, QmockClient};
//!
//! # async fn example() -> qmock_client::ClientResult<()> {
//! let config = ClientConfig::default().with_base_url("http://localhost:8100/jobs");
//! let client = QmockClient::new(config)?;
//! let counts = client.run(&[KernelCode::new("bell", "<base64>")], 1000).await?;
//! println!("{:?}", counts[0].most_frequent());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod credentials;
pub mod error;

pub use client::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_MACHINE, KernelCode, QmockClient};
pub use credentials::Credentials;
pub use error::{ClientError, ClientResult};
