//! Server configuration.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. a YAML file (`--config`)
//! 3. `QMOCK_*` environment variables, including those from a `.env` file
//! 4. command-line flags

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::telemetry::{LogFormat, Telemetry};

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Program execution settings
    pub executor: ExecutorConfig,

    /// Job lifecycle settings
    pub jobs: JobsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// OpenTelemetry configuration
    pub tracing: TracingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8100")
    pub address: String,
}

/// Program execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Largest register the simulator accepts
    pub max_qubits: u32,

    /// Fixed RNG seed for reproducible sampling
    pub seed: Option<u64>,
}

/// Job lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Polls answered with `Running` before a job is reported complete
    pub poll_threshold: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log filter: a level such as "info", or per-target directives such
    /// as "info,qmock_server=debug"
    pub level: String,

    /// Log format: "console" or "json"
    pub format: String,
}

/// Distributed tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// OTLP endpoint (e.g., "<http://localhost:4317>"); export is off when unset
    pub otlp_endpoint: Option<String>,

    /// Service name for traces
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8100".to_string(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_qubits: qmock_adapter_sim::DEFAULT_MAX_QUBITS,
            seed: None,
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self { poll_threshold: 3 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "console".to_string(),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: "qmock-server".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&contents)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml_ng::from_str(contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Load .env file if it exists
    /// 2. Load from file if provided
    /// 3. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = if let Some(path) = config_file {
            Self::from_file(path)?
        } else {
            Config::default()
        };

        let config = config.merge_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Merge environment variables into this configuration.
    ///
    /// Only variables that are set override the current values. A set but
    /// unparsable numeric variable is an error.
    fn merge_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = std::env::var("QMOCK_ADDRESS") {
            self.server.address = v;
        }
        if let Ok(v) = std::env::var("QMOCK_MAX_QUBITS") {
            self.executor.max_qubits = parse_env("QMOCK_MAX_QUBITS", &v)?;
        }
        if let Ok(v) = std::env::var("QMOCK_SEED") {
            self.executor.seed = Some(parse_env("QMOCK_SEED", &v)?);
        }
        if let Ok(v) = std::env::var("QMOCK_POLL_THRESHOLD") {
            self.jobs.poll_threshold = parse_env("QMOCK_POLL_THRESHOLD", &v)?;
        }
        if let Ok(v) = std::env::var("QMOCK_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("QMOCK_LOG_FORMAT") {
            self.logging.format = v;
        }
        if let Ok(v) = std::env::var("QMOCK_OTLP_ENDPOINT") {
            self.tracing.otlp_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("QMOCK_SERVICE_NAME") {
            self.tracing.service_name = v;
        }
        Ok(self)
    }

    /// Override the listening port, keeping the bind host.
    pub fn with_port(mut self, port: u16) -> Result<Self, ConfigError> {
        let mut addr = self.address()?;
        addr.set_port(port);
        self.server.address = addr.to_string();
        Ok(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.address()?;

        if self.executor.max_qubits == 0 {
            return Err(ConfigError::Invalid(
                "executor.max_qubits must be greater than 0".to_string(),
            ));
        }
        // The statevector is indexed by usize.
        if self.executor.max_qubits >= usize::BITS {
            return Err(ConfigError::Invalid(format!(
                "executor.max_qubits must be below {}",
                usize::BITS
            )));
        }

        if self.jobs.poll_threshold == 0 {
            return Err(ConfigError::Invalid(
                "jobs.poll_threshold must be greater than 0".to_string(),
            ));
        }

        EnvFilter::try_new(&self.logging.level).map_err(|e| {
            ConfigError::Invalid(format!("Invalid log filter '{}': {e}", self.logging.level))
        })?;
        self.logging
            .format
            .parse::<LogFormat>()
            .map_err(ConfigError::Invalid)?;

        Ok(())
    }

    /// Get the parsed server address.
    pub fn address(&self) -> Result<SocketAddr, ConfigError> {
        self.server.address.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid server address: {}", self.server.address))
        })
    }

    /// Telemetry settings derived from this configuration.
    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            filter: self.logging.level.clone(),
            format: self.logging.format.parse().unwrap_or_default(),
            service_name: self.tracing.service_name.clone(),
            otlp_endpoint: self.tracing.otlp_endpoint.clone(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("Invalid value for {name}: {value}")))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.address, "0.0.0.0:8100");
        assert_eq!(config.executor.max_qubits, 20);
        assert_eq!(config.jobs.poll_threshold, 3);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("jobs:\n  poll_threshold: 1\nexecutor:\n  seed: 7\n").unwrap();
        assert_eq!(config.jobs.poll_threshold, 1);
        assert_eq!(config.executor.seed, Some(7));
        assert_eq!(config.executor.max_qubits, 20);
        assert_eq!(config.server.address, "0.0.0.0:8100");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  address: \"127.0.0.1:9000\"\nlogging:\n  format: json").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.address().unwrap().port(), 9000);
        assert_eq!(config.telemetry().format, LogFormat::Json);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/qmock.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.jobs.poll_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.executor.max_qubits = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "qmock_server=loud".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_per_target_log_filter() {
        let mut config = Config::default();
        config.logging.level = "warn,qmock_server=debug,tower_http=trace".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.telemetry().filter, config.logging.level);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Config::from_yaml("jobs: [unclosed"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_with_port() {
        let config = Config::default().with_port(8200).unwrap();
        assert_eq!(config.server.address, "0.0.0.0:8200");
    }
}
