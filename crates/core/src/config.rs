use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub wit: WitConfig,
    pub wolfram: WolframConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    /// Bot or user token used for the Web API and, without an app token, for RTM.
    pub access_token: SecretString,
    /// App-level token; when present the bot connects over Socket Mode.
    pub app_token: Option<SecretString>,
    pub api_base_url: String,
    /// Upper bound for the delay between reconnect attempts.
    pub reconnect_max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct WitConfig {
    pub access_token: SecretString,
    pub base_url: String,
    pub api_version: String,
}

#[derive(Clone, Debug)]
pub struct WolframConfig {
    pub app_id: SecretString,
    pub base_url: String,
    pub units: WolframUnits,
    pub timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub http_timeout_secs: u64,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WolframUnits {
    Metric,
    Imperial,
}

impl WolframUnits {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Explicit config file; it must exist. Without one, `witty.toml` and
    /// `config/witty.toml` are tried and may both be absent.
    pub config_path: Option<PathBuf>,
}

impl LoadOptions {
    /// Takes the config file path from `WITTY_CONFIG` when it is set.
    pub fn from_env() -> Self {
        Self { config_path: read_env("WITTY_CONFIG").map(PathBuf::from) }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                access_token: String::new().into(),
                app_token: None,
                api_base_url: "https://slack.com/api".to_string(),
                reconnect_max_delay_ms: 5_000,
            },
            wit: WitConfig {
                access_token: String::new().into(),
                base_url: "https://api.wit.ai".to_string(),
                api_version: "20200513".to_string(),
            },
            wolfram: WolframConfig {
                app_id: String::new().into(),
                base_url: "https://api.wolframalpha.com".to_string(),
                units: WolframUnits::Metric,
                timeout_ms: 1000,
            },
            runtime: RuntimeConfig { http_timeout_secs: 15, graceful_shutdown_secs: 10 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for WolframUnits {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" | "nonmetric" => Ok(Self::Imperial),
            other => Err(ConfigError::Validation(format!(
                "unsupported wolfram units `{other}` (expected metric|imperial)"
            ))),
        }
    }
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
        if let Some(path) = resolve_config_path(options.config_path.as_deref())? {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(access_token) = slack.access_token {
                self.slack.access_token = secret_value(access_token);
            }
            if let Some(app_token) = slack.app_token {
                self.slack.app_token = Some(secret_value(app_token));
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(reconnect_max_delay_ms) = slack.reconnect_max_delay_ms {
                self.slack.reconnect_max_delay_ms = reconnect_max_delay_ms;
            }
        }

        if let Some(wit) = patch.wit {
            if let Some(access_token) = wit.access_token {
                self.wit.access_token = secret_value(access_token);
            }
            if let Some(base_url) = wit.base_url {
                self.wit.base_url = base_url;
            }
            if let Some(api_version) = wit.api_version {
                self.wit.api_version = api_version;
            }
        }

        if let Some(wolfram) = patch.wolfram {
            if let Some(app_id) = wolfram.app_id {
                self.wolfram.app_id = secret_value(app_id);
            }
            if let Some(base_url) = wolfram.base_url {
                self.wolfram.base_url = base_url;
            }
            if let Some(units) = wolfram.units {
                self.wolfram.units = units;
            }
            if let Some(timeout_ms) = wolfram.timeout_ms {
                self.wolfram.timeout_ms = timeout_ms;
            }
        }

        if let Some(runtime) = patch.runtime {
            if let Some(http_timeout_secs) = runtime.http_timeout_secs {
                self.runtime.http_timeout_secs = http_timeout_secs;
            }
            if let Some(graceful_shutdown_secs) = runtime.graceful_shutdown_secs {
                self.runtime.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_env("SLACK_ACCESS_TOKEN") {
            self.slack.access_token = secret_value(value);
        }
        if let Some(value) = read_env("SLACK_APP_TOKEN") {
            self.slack.app_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("WITTY_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("WITTY_SLACK_RECONNECT_MAX_DELAY_MS") {
            self.slack.reconnect_max_delay_ms =
                parse_u64("WITTY_SLACK_RECONNECT_MAX_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("WIT_AI_ACCESS_TOKEN") {
            self.wit.access_token = secret_value(value);
        }
        if let Some(value) = read_env("WITTY_WIT_BASE_URL") {
            self.wit.base_url = value;
        }
        if let Some(value) = read_env("WITTY_WIT_API_VERSION") {
            self.wit.api_version = value;
        }

        if let Some(value) = read_env("WOLFRAM_APP_ID") {
            self.wolfram.app_id = secret_value(value);
        }
        if let Some(value) = read_env("WITTY_WOLFRAM_BASE_URL") {
            self.wolfram.base_url = value;
        }
        if let Some(value) = read_env("WITTY_WOLFRAM_UNITS") {
            self.wolfram.units = value.parse()?;
        }
        if let Some(value) = read_env("WITTY_WOLFRAM_TIMEOUT_MS") {
            self.wolfram.timeout_ms = parse_u64("WITTY_WOLFRAM_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("WITTY_HTTP_TIMEOUT_SECS") {
            self.runtime.http_timeout_secs = parse_u64("WITTY_HTTP_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("WITTY_GRACEFUL_SHUTDOWN_SECS") {
            self.runtime.graceful_shutdown_secs =
                parse_u64("WITTY_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("WITTY_LOGGING_LEVEL").or_else(|| read_env("WITTY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("WITTY_LOGGING_FORMAT").or_else(|| read_env("WITTY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_wit(&self.wit)?;
        validate_wolfram(&self.wolfram)?;
        validate_runtime(&self.runtime)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit_path {
        if !path.exists() {
            return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
        }
        return Ok(Some(path.to_path_buf()));
    }

    Ok([PathBuf::from("witty.toml"), PathBuf::from("config/witty.toml")]
        .into_iter()
        .find(|path| path.exists()))
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let access_token = slack.access_token.expose_secret();
    if access_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.access_token is required (SLACK_ACCESS_TOKEN). Get it from https://api.slack.com/apps > Your App > OAuth & Permissions".to_string()
        ));
    }
    if !access_token.starts_with("xoxb-") && !access_token.starts_with("xoxp-") {
        let hint = if access_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.access_token must start with `xoxb-` or `xoxp-`{hint}"
        )));
    }

    if let Some(app_token) = &slack.app_token {
        let app_token = app_token.expose_secret();
        if !app_token.starts_with("xapp-") {
            let hint = if app_token.starts_with("xoxb-") {
                " (hint: you may have used the bot token instead of the app token)"
            } else {
                ""
            };
            return Err(ConfigError::Validation(format!(
                "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens"
            )));
        }
    }

    if slack.reconnect_max_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "slack.reconnect_max_delay_ms must be greater than zero".to_string(),
        ));
    }

    validate_url("slack.api_base_url", &slack.api_base_url)
}

fn validate_wit(wit: &WitConfig) -> Result<(), ConfigError> {
    if wit.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "wit.access_token is required (WIT_AI_ACCESS_TOKEN). Get it from https://wit.ai > Your App > Settings".to_string(),
        ));
    }
    if wit.api_version.trim().is_empty() {
        return Err(ConfigError::Validation("wit.api_version must not be empty".to_string()));
    }

    validate_url("wit.base_url", &wit.base_url)
}

fn validate_wolfram(wolfram: &WolframConfig) -> Result<(), ConfigError> {
    if wolfram.app_id.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "wolfram.app_id is required (WOLFRAM_APP_ID). Get it from https://developer.wolframalpha.com".to_string(),
        ));
    }
    if wolfram.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "wolfram.timeout_ms must be greater than zero".to_string(),
        ));
    }

    validate_url("wolfram.base_url", &wolfram.base_url)
}

fn validate_runtime(runtime: &RuntimeConfig) -> Result<(), ConfigError> {
    if runtime.http_timeout_secs == 0 || runtime.http_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "runtime.http_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if runtime.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "runtime.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    wit: Option<WitPatch>,
    wolfram: Option<WolframPatch>,
    runtime: Option<RuntimePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    access_token: Option<String>,
    app_token: Option<String>,
    api_base_url: Option<String>,
    reconnect_max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WitPatch {
    access_token: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WolframPatch {
    app_id: Option<String>,
    base_url: Option<String>,
    units: Option<WolframUnits>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RuntimePatch {
    http_timeout_secs: Option<u64>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
