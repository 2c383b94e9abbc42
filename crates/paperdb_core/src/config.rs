//! Store configuration.

use crate::error::{CoreError, CoreResult};
use paperdb_storage::ConnectionConfig;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the database file path.
pub const ENV_PATH: &str = "PAPER_DB_PATH";
/// Environment variable holding the cipher secret for a new database.
pub const ENV_KEY: &str = "PAPER_DB_KEY";
/// Environment variable holding the cipher salt for a new database.
pub const ENV_SALT: &str = "PAPER_DB_SALT";
/// Environment variable holding the busy timeout in milliseconds.
pub const ENV_BUSY_TIMEOUT_MS: &str = "PAPER_DB_BUSY_TIMEOUT_MS";

/// Configuration for opening a store.
#[derive(Clone)]
pub struct Config {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,

    /// How long a statement waits on a locked database.
    pub busy_timeout: Duration,

    /// Whether to insert seed rows into newly created tables.
    pub seed_defaults: bool,

    /// Cipher secret written to the settings row when it is first created.
    pub cipher_key: Option<String>,

    /// Cipher salt written to the settings row when it is first created.
    pub cipher_salt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_secs(5),
            seed_defaults: true,
            cipher_key: None,
            cipher_salt: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("busy_timeout", &self.busy_timeout)
            .field("seed_defaults", &self.seed_defaults)
            .field("cipher_key", &self.cipher_key.as_ref().map(|_| "[REDACTED]"))
            .field("cipher_salt", &self.cipher_salt.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `PAPER_DB_PATH`, `PAPER_DB_KEY`, `PAPER_DB_SALT` and
    /// `PAPER_DB_BUSY_TIMEOUT_MS`. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the busy timeout is not a whole number.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CoreResult<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_PATH).filter(|p| !p.is_empty()) {
            config.path = Some(PathBuf::from(path));
        }
        config.cipher_key = lookup(ENV_KEY).filter(|k| !k.is_empty());
        config.cipher_salt = lookup(ENV_SALT).filter(|s| !s.is_empty());
        if let Some(ms) = lookup(ENV_BUSY_TIMEOUT_MS) {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                CoreError::invalid_operation(format!("{ENV_BUSY_TIMEOUT_MS} is not a number: {ms:?}"))
            })?;
            config.busy_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Sets the database file.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Uses a private in-memory database.
    #[must_use]
    pub fn in_memory(mut self) -> Self {
        self.path = None;
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether seed rows are inserted into new tables.
    #[must_use]
    pub const fn seed_defaults(mut self, value: bool) -> Self {
        self.seed_defaults = value;
        self
    }

    /// Sets the cipher secret and salt used when the settings row is created.
    #[must_use]
    pub fn cipher(mut self, key: impl Into<String>, salt: impl Into<String>) -> Self {
        self.cipher_key = Some(key.into());
        self.cipher_salt = Some(salt.into());
        self
    }

    pub(crate) fn connection(&self) -> ConnectionConfig {
        ConnectionConfig::default().busy_timeout(self.busy_timeout)
    }
}
