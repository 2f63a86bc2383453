use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub crm: CrmConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub base_url: String,
    pub api_key: SecretString,
    /// Name of the order custom field carrying the opaque access code.
    /// Deployments occasionally rename it, hence configurable.
    pub bot_code_field: String,
    /// Name of the order custom field the chat-user id is stamped into.
    pub chat_id_field: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub throttle_window_ms: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub redis_url: String,
    pub session_ttl_secs: u64,
    pub orders_cache_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub crm_base_url: Option<String>,
    pub crm_api_key: Option<String>,
    pub bot_code_field: Option<String>,
    pub redis_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            crm: CrmConfig {
                base_url: String::new(),
                api_key: String::new().into(),
                bot_code_field: "bot_code".to_string(),
                chat_id_field: "telegram_id".to_string(),
                timeout_secs: 20,
                max_attempts: 3,
                retry_base_delay_ms: 500,
                throttle_window_ms: 1_000,
            },
            session: SessionConfig {
                redis_url: "redis://localhost:6379/0".to_string(),
                session_ttl_secs: 86_400,
                orders_cache_ttl_secs: 60,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    crm: Option<CrmPatch>,
    session: Option<SessionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    bot_code_field: Option<String>,
    chat_id_field: Option<String>,
    timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    throttle_window_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    redis_url: Option<String>,
    session_ttl_secs: Option<u64>,
    orders_cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("parcelbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(crm) = patch.crm {
            if let Some(base_url) = crm.base_url {
                self.crm.base_url = base_url;
            }
            if let Some(api_key_value) = crm.api_key {
                self.crm.api_key = api_key_value.into();
            }
            if let Some(bot_code_field) = crm.bot_code_field {
                self.crm.bot_code_field = bot_code_field;
            }
            if let Some(chat_id_field) = crm.chat_id_field {
                self.crm.chat_id_field = chat_id_field;
            }
            if let Some(timeout_secs) = crm.timeout_secs {
                self.crm.timeout_secs = timeout_secs;
            }
            if let Some(max_attempts) = crm.max_attempts {
                self.crm.max_attempts = max_attempts;
            }
            if let Some(retry_base_delay_ms) = crm.retry_base_delay_ms {
                self.crm.retry_base_delay_ms = retry_base_delay_ms;
            }
            if let Some(throttle_window_ms) = crm.throttle_window_ms {
                self.crm.throttle_window_ms = throttle_window_ms;
            }
        }

        if let Some(session) = patch.session {
            if let Some(redis_url) = session.redis_url {
                self.session.redis_url = redis_url;
            }
            if let Some(session_ttl_secs) = session.session_ttl_secs {
                self.session.session_ttl_secs = session_ttl_secs;
            }
            if let Some(orders_cache_ttl_secs) = session.orders_cache_ttl_secs {
                self.session.orders_cache_ttl_secs = orders_cache_ttl_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PARCELBOT_CRM_BASE_URL") {
            self.crm.base_url = value;
        }
        if let Some(value) = read_env("PARCELBOT_CRM_API_KEY") {
            self.crm.api_key = value.into();
        }
        if let Some(value) = read_env("PARCELBOT_CRM_BOT_CODE_FIELD") {
            self.crm.bot_code_field = value;
        }
        if let Some(value) = read_env("PARCELBOT_CRM_CHAT_ID_FIELD") {
            self.crm.chat_id_field = value;
        }
        if let Some(value) = read_env("PARCELBOT_CRM_TIMEOUT_SECS") {
            self.crm.timeout_secs = parse_u64("PARCELBOT_CRM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PARCELBOT_CRM_MAX_ATTEMPTS") {
            self.crm.max_attempts = parse_u32("PARCELBOT_CRM_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("PARCELBOT_CRM_RETRY_BASE_DELAY_MS") {
            self.crm.retry_base_delay_ms = parse_u64("PARCELBOT_CRM_RETRY_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("PARCELBOT_CRM_THROTTLE_WINDOW_MS") {
            self.crm.throttle_window_ms = parse_u64("PARCELBOT_CRM_THROTTLE_WINDOW_MS", &value)?;
        }

        if let Some(value) = read_env("PARCELBOT_REDIS_URL") {
            self.session.redis_url = value;
        }
        if let Some(value) = read_env("PARCELBOT_SESSION_TTL_SECS") {
            self.session.session_ttl_secs = parse_u64("PARCELBOT_SESSION_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("PARCELBOT_ORDERS_CACHE_TTL_SECS") {
            self.session.orders_cache_ttl_secs =
                parse_u64("PARCELBOT_ORDERS_CACHE_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("PARCELBOT_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("PARCELBOT_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(crm_base_url) = overrides.crm_base_url {
            self.crm.base_url = crm_base_url;
        }
        if let Some(crm_api_key) = overrides.crm_api_key {
            self.crm.api_key = crm_api_key.into();
        }
        if let Some(bot_code_field) = overrides.bot_code_field {
            self.crm.bot_code_field = bot_code_field;
        }
        if let Some(redis_url) = overrides.redis_url {
            self.session.redis_url = redis_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_crm(&self.crm)?;
        validate_session(&self.session)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("parcelbot.toml"), PathBuf::from("config/parcelbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    let base_url = crm.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Validation(
            "crm.base_url is required (the CRM instance URL, e.g. `https://acme.retailcrm.ru`)"
                .to_string(),
        ));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "crm.base_url must be an http(s) URL".to_string(),
        ));
    }

    if crm.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation("crm.api_key is required".to_string()));
    }

    if crm.bot_code_field.trim().is_empty() {
        return Err(ConfigError::Validation("crm.bot_code_field must not be empty".to_string()));
    }
    if crm.chat_id_field.trim().is_empty() {
        return Err(ConfigError::Validation("crm.chat_id_field must not be empty".to_string()));
    }

    if crm.timeout_secs == 0 || crm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "crm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if crm.max_attempts == 0 || crm.max_attempts > 10 {
        return Err(ConfigError::Validation(
            "crm.max_attempts must be in range 1..=10".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if !session.redis_url.starts_with("redis://") && !session.redis_url.starts_with("rediss://") {
        return Err(ConfigError::Validation(
            "session.redis_url must be a redis URL (`redis://...` or `rediss://...`)".to_string(),
        ));
    }

    if session.session_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.session_ttl_secs must be greater than zero".to_string(),
        ));
    }
    if session.orders_cache_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.orders_cache_ttl_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}
