use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use log::debug;
use recsync_runtime::{
    BASIC_AUTH_PASSWORD_ENV, BASIC_AUTH_USER_ENV, DEFAULT_BASE_DELAY_MS, DEFAULT_CONCURRENCY, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT_MS, ENDPOINT_ENV, TOKEN_ENV,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{error::ConfigurationError, retry::RetryPolicy};

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One configuration layer. Unset fields defer to lower layers.
///
/// The same shape is read from the JSON config file, the environment and
/// command-line flags, then folded with [`ConfigOverrides::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub batch_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub timeout_millis: Option<u64>,
    pub base_delay_millis: Option<u64>,
    pub max_delay_millis: Option<u64>,
    pub run_timeout_millis: Option<u64>,
    pub token: Option<String>,
    pub basic_auth_user: Option<String>,
    pub basic_auth_password: Option<String>,
}

impl ConfigOverrides {
    /// Fields set in `higher` replace ours.
    pub fn merge(self, higher: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            endpoint: higher.endpoint.or(self.endpoint),
            batch_size: higher.batch_size.or(self.batch_size),
            concurrency: higher.concurrency.or(self.concurrency),
            max_retries: higher.max_retries.or(self.max_retries),
            timeout_millis: higher.timeout_millis.or(self.timeout_millis),
            base_delay_millis: higher.base_delay_millis.or(self.base_delay_millis),
            max_delay_millis: higher.max_delay_millis.or(self.max_delay_millis),
            run_timeout_millis: higher.run_timeout_millis.or(self.run_timeout_millis),
            token: higher.token.or(self.token),
            basic_auth_user: higher.basic_auth_user.or(self.basic_auth_user),
            basic_auth_password: higher.basic_auth_password.or(self.basic_auth_password),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing file is an empty layer.
    pub fn load_if_exists(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            debug!("[config] no config file at {}", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Endpoint and credentials from the `RECSYNC_*` variables.
    pub fn from_env() -> Self {
        let non_empty = |var: &str| std::env::var(var).ok().filter(|v| !v.trim().is_empty());
        Self {
            endpoint: non_empty(ENDPOINT_ENV),
            token: non_empty(TOKEN_ENV),
            basic_auth_user: non_empty(BASIC_AUTH_USER_ENV),
            basic_auth_password: non_empty(BASIC_AUTH_PASSWORD_ENV),
            ..Self::default()
        }
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub endpoint: String,
    /// Records per batch (`B`).
    pub batch_size: usize,
    /// Batches in flight at once (`C`).
    pub concurrency: usize,
    /// Attempts per batch (`R`), counting the first.
    pub max_retries: u32,
    /// Per-attempt deadline.
    pub timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Cancels the whole run when it elapses.
    pub run_timeout: Option<Duration>,
    /// Sent as `Authorization: Bearer`.
    pub token: Option<String>,
    /// Sent as `Authorization: Basic`. Exclusive with `token`.
    pub basic_auth: Option<BasicAuth>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

impl SyncConfig {
    /// Defaults for everything except the two required settings. Unvalidated.
    pub fn new(endpoint: impl Into<String>, batch_size: usize) -> Self {
        Self {
            endpoint: endpoint.into(),
            batch_size,
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            run_timeout: None,
            token: None,
            basic_auth: None,
        }
    }

    /// Apply defaults to the merged layers and validate.
    pub fn resolve(layers: ConfigOverrides) -> Result<Self, ConfigurationError> {
        let endpoint = layers.endpoint.ok_or(ConfigurationError::MissingEndpoint)?;
        let batch_size = layers
            .batch_size
            .ok_or(ConfigurationError::MissingBatchSize)?;

        let mut config = Self::new(endpoint, batch_size);
        if let Some(c) = layers.concurrency {
            config.concurrency = c;
        }
        if let Some(r) = layers.max_retries {
            config.max_retries = r;
        }
        if let Some(ms) = layers.timeout_millis {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = layers.base_delay_millis {
            config.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = layers.max_delay_millis {
            config.max_delay = Duration::from_millis(ms);
        }
        config.run_timeout = layers.run_timeout_millis.map(Duration::from_millis);
        config.token = layers.token;
        config.basic_auth = match (layers.basic_auth_user, layers.basic_auth_password) {
            (Some(user), password) => Some(BasicAuth {
                user,
                password: password.unwrap_or_default(),
            }),
            (None, Some(_)) => return Err(ConfigurationError::PasswordWithoutUser),
            (None, None) => None,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.batch_size == 0 {
            return Err(ConfigurationError::InvalidBatchSize(self.batch_size));
        }
        if self.concurrency == 0 {
            return Err(ConfigurationError::InvalidConcurrency(self.concurrency));
        }

        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigurationError::MissingEndpoint);
        }
        let has_host = ["http://", "https://"]
            .iter()
            .filter_map(|scheme| endpoint.strip_prefix(scheme))
            .any(|rest| !rest.is_empty() && !rest.starts_with('/'));
        if !has_host {
            return Err(ConfigurationError::InvalidEndpoint(self.endpoint.clone()));
        }

        if self.timeout.is_zero() {
            return Err(ConfigurationError::ZeroDuration {
                name: "timeout_millis",
            });
        }
        if self.run_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigurationError::ZeroDuration {
                name: "run_timeout_millis",
            });
        }
        if self.token.is_some() && self.basic_auth.is_some() {
            return Err(ConfigurationError::ConflictingAuth);
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigurationError::InvertedDelays {
                base_ms: self.base_delay.as_millis() as u64,
                max_ms: self.max_delay.as_millis() as u64,
            });
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.base_delay, self.max_delay)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
