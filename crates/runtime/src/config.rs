use std::path::PathBuf;

pub const PROGRAM_NAME: &str = "recsync";
pub const PROGRAM_LOG_LEVEL: &str = "RECSYNC_LOG_LEVEL";
pub const ENDPOINT_ENV: &str = "RECSYNC_ENDPOINT";
pub const TOKEN_ENV: &str = "RECSYNC_TOKEN";
pub const BASIC_AUTH_USER_ENV: &str = "RECSYNC_BASIC_AUTH_USER";
pub const BASIC_AUTH_PASSWORD_ENV: &str = "RECSYNC_BASIC_AUTH_PASSWORD";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Records in flight at once when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 1;
/// Attempts per batch, counting the first one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Per-attempt deadline.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

pub fn xdg_or_home(xdg_var: &str, home_suffix: &str) -> PathBuf {
    if let Some(dir) = std::env::var_os(xdg_var)
        && !dir.is_empty()
    {
        PathBuf::from(dir)
    } else {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(home_suffix)
    }
}

pub fn recsync_config_dir() -> PathBuf {
    xdg_or_home("XDG_CONFIG_HOME", ".config").join(PROGRAM_NAME)
}

/// Config file consulted when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    recsync_config_dir().join(CONFIG_FILE_NAME)
}

/// Value sent in the `User-Agent` header.
pub fn user_agent() -> String {
    format!("{}/{}", PROGRAM_NAME, env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
