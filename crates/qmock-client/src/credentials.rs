//! Credential discovery.
//!
//! Sources are tried in order:
//!
//! 1. `QMOCK_CREDENTIALS`, holding the API key itself
//! 2. a credentials file named by the caller
//! 3. `~/.qudora_config`
//!
//! Files hold one `key : value` pair per line. `key` and `refresh` are
//! required, `time` is optional, and anything else is rejected.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Environment variable holding the API key directly.
pub const CREDENTIALS_ENV: &str = "QMOCK_CREDENTIALS";

/// Credentials file name looked up in the home directory.
pub const DEFAULT_CREDENTIALS_FILE: &str = ".qudora_config";

/// API credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token sent with every request.
    pub key: String,
    pub refresh: Option<String>,
    /// When the tokens were last issued, as written by the issuer.
    pub time: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &"[REDACTED]")
            .field("refresh", &self.refresh.as_ref().map(|_| "[REDACTED]"))
            .field("time", &self.time)
            .finish()
    }
}

impl Credentials {
    /// Credentials made of a bare API key.
    pub fn from_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            refresh: None,
            time: None,
        }
    }

    /// Parse the contents of a credentials file. `path` is used in errors.
    pub fn parse(contents: &str, path: &Path) -> ClientResult<Self> {
        let invalid = |message: String| ClientError::InvalidCredentials {
            path: path.to_path_buf(),
            message,
        };

        let mut key = None;
        let mut refresh = None;
        let mut time = None;

        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let (name, value) = line.split_once(':').ok_or_else(|| {
                invalid("pairs must be in `<key> : <value>` format, one per line".to_string())
            })?;
            let value = value.trim().to_string();
            match name.trim() {
                "key" => key = Some(value),
                "refresh" => refresh = Some(value),
                "time" => time = Some(value),
                other => return Err(invalid(format!("Unknown key: {other}"))),
            }
        }

        let key = key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| invalid("empty API key".to_string()))?;
        let refresh = refresh
            .filter(|r| !r.is_empty())
            .ok_or_else(|| invalid("empty refresh key".to_string()))?;

        Ok(Self {
            key,
            refresh: Some(refresh),
            time: time.filter(|t| !t.is_empty()),
        })
    }

    /// Read and parse a credentials file.
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ClientError::CredentialsIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// Find credentials from the environment, `user_file`, or the home directory.
    pub fn discover(user_file: Option<&Path>) -> ClientResult<Self> {
        Self::discover_from(
            std::env::var(CREDENTIALS_ENV).ok(),
            user_file,
            dirs::home_dir().map(|home| home.join(DEFAULT_CREDENTIALS_FILE)),
        )
    }

    fn discover_from(
        env_key: Option<String>,
        user_file: Option<&Path>,
        default_file: Option<PathBuf>,
    ) -> ClientResult<Self> {
        if let Some(key) = env_key.filter(|k| !k.is_empty()) {
            debug!("Using credentials from {CREDENTIALS_ENV}");
            return Ok(Self::from_key(key));
        }

        if let Some(path) = user_file {
            debug!(path = %path.display(), "Using user-specified credentials file");
            return Self::from_file(path);
        }

        let path = default_file.unwrap_or_else(|| PathBuf::from("~").join(DEFAULT_CREDENTIALS_FILE));
        if path.is_file() {
            debug!(path = %path.display(), "Using default credentials file");
            Self::from_file(&path)
        } else {
            Err(ClientError::MissingCredentials(path))
        }
    }
}
