use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    /// Full REST endpoint, e.g. `https://lms.example.edu/webservice/rest/server.php`.
    pub lms_url: String,
    pub admin_chat_id: i64,
    pub database_url: String,
    pub display_utc_offset_hours: i32,
    pub request_timeout_secs: u64,
    pub max_concurrent_requests: usize,
    pub session_ttl_secs: u64,
    pub poll_timeout_secs: u64,
    pub token_help_url: Option<String>,
    pub credential_encryption_key: Option<String>,
    pub log_dir: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialBotConfig {
    #[serde(alias = "tel_api_token")]
    telegram_bot_token: Option<String>,
    telegram_api_url: Option<String>,
    #[serde(alias = "request_url")]
    lms_url: Option<String>,
    #[serde(alias = "admin_id")]
    admin_chat_id: Option<i64>,
    database_url: Option<String>,
    display_utc_offset_hours: Option<i32>,
    request_timeout_secs: Option<u64>,
    max_concurrent_requests: Option<usize>,
    session_ttl_secs: Option<u64>,
    poll_timeout_secs: Option<u64>,
    token_help_url: Option<String>,
    credential_encryption_key: Option<String>,
    log_dir: Option<String>,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_database_url() -> String {
    "sqlite://users.db".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

const DEFAULT_DISPLAY_UTC_OFFSET_HOURS: i32 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;
const DEFAULT_SESSION_TTL_SECS: u64 = 15 * 60;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Drops variables set to an empty or all-whitespace value so they fall through to
/// the file or the defaults.
fn non_blank<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter().filter_map(|(key, value)| {
        let value = value.trim();
        (!value.is_empty()).then(|| (key, value.to_string()))
    })
}

impl PartialBotConfig {
    /// Deserializes the variables the way `envy::from_env` does; tests pass their own pairs.
    fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter::<_, PartialBotConfig>(non_blank(vars))?)
    }

    fn from_file(path_str: &str) -> Result<Self, ConfigError> {
        let path = Path::new(path_str);
        if !path.exists() {
            return Ok(PartialBotConfig::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_str.to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path_str.to_string(),
            source,
        })
    }
}

impl BotConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path) => PartialBotConfig::from_file(path)?,
            None => PartialBotConfig::default(),
        };

        // 2. Load from environment variables
        let env_config = PartialBotConfig::from_vars(std::env::vars())?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn merge(env: PartialBotConfig, file: PartialBotConfig) -> Result<Self, ConfigError> {
        let config = BotConfig {
            telegram_bot_token: env
                .telegram_bot_token
                .or(file.telegram_bot_token)
                .ok_or(ConfigError::Missing("TEL_API_TOKEN"))?,
            telegram_api_url: env
                .telegram_api_url
                .or(file.telegram_api_url)
                .unwrap_or_else(default_telegram_api_url),
            lms_url: env
                .lms_url
                .or(file.lms_url)
                .ok_or(ConfigError::Missing("REQUEST_URL"))?,
            admin_chat_id: env
                .admin_chat_id
                .or(file.admin_chat_id)
                .ok_or(ConfigError::Missing("ADMIN_ID"))?,
            database_url: env
                .database_url
                .or(file.database_url)
                .unwrap_or_else(default_database_url),
            display_utc_offset_hours: env
                .display_utc_offset_hours
                .or(file.display_utc_offset_hours)
                .unwrap_or(DEFAULT_DISPLAY_UTC_OFFSET_HOURS),
            request_timeout_secs: env
                .request_timeout_secs
                .or(file.request_timeout_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_concurrent_requests: env
                .max_concurrent_requests
                .or(file.max_concurrent_requests)
                .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS),
            session_ttl_secs: env
                .session_ttl_secs
                .or(file.session_ttl_secs)
                .unwrap_or(DEFAULT_SESSION_TTL_SECS),
            poll_timeout_secs: env
                .poll_timeout_secs
                .or(file.poll_timeout_secs)
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            token_help_url: env.token_help_url.or(file.token_help_url),
            credential_encryption_key: env
                .credential_encryption_key
                .or(file.credential_encryption_key),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(-12..=14).contains(&self.display_utc_offset_hours) {
            return Err(ConfigError::Invalid {
                key: "DISPLAY_UTC_OFFSET_HOURS",
                message: format!(
                    "{} is outside of -12..=14",
                    self.display_utc_offset_hours
                ),
            });
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_CONCURRENT_REQUESTS",
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "REQUEST_TIMEOUT_SECS",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn display_offset(&self) -> FixedOffset {
        // validate() keeps the hour count inside the range FixedOffset accepts
        FixedOffset::east_opt(self.display_utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn is_admin(&self, chat_id: i64) -> bool {
        chat_id == self.admin_chat_id
    }
}
