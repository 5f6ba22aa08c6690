mod config;
pub mod history;
pub mod logging;

pub use config::{
    BASIC_AUTH_PASSWORD_ENV, BASIC_AUTH_USER_ENV, CONFIG_FILE_NAME, DEFAULT_BASE_DELAY_MS, DEFAULT_CONCURRENCY, DEFAULT_MAX_DELAY_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS, ENDPOINT_ENV, PROGRAM_LOG_LEVEL, PROGRAM_NAME,
    TOKEN_ENV, default_config_path, recsync_config_dir, user_agent, xdg_or_home,
};

pub use logging::init;
