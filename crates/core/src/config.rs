use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub chat: ChatConfig,
    pub qna: QnaConfig,
    pub calendar: CalendarConfig,
    pub catalog: CatalogConfig,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub session_dir: String,
    pub max_reconnects: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct QnaConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub availability_webhook_url: String,
    pub booking_webhook_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub mode: CatalogMode,
    pub source_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub transcript_window: usize,
    pub contact_from_sender: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogMode {
    Static,
    Dynamic,
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
    pub qna_enabled: Option<bool>,
    pub qna_webhook_url: Option<String>,
    pub availability_webhook_url: Option<String>,
    pub booking_webhook_url: Option<String>,
    pub catalog_mode: Option<CatalogMode>,
    pub catalog_source_url: Option<String>,
    pub contact_from_sender: Option<bool>,
    pub idle_timeout_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
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
            chat: ChatConfig {
                session_dir: ".citabot-session".to_string(),
                max_reconnects: 5,
                reconnect_base_delay_ms: 250,
                reconnect_max_delay_ms: 5_000,
            },
            qna: QnaConfig { enabled: false, webhook_url: None, timeout_secs: 30 },
            calendar: CalendarConfig {
                availability_webhook_url: String::new(),
                booking_webhook_url: String::new(),
                timeout_secs: 30,
            },
            catalog: CatalogConfig { mode: CatalogMode::Static, source_url: None },
            conversation: ConversationConfig {
                idle_timeout_secs: 3_600,
                sweep_interval_secs: 3_600,
                transcript_window: 10,
                contact_from_sender: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for CatalogMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(ConfigError::Validation(format!(
                "unsupported catalog mode `{other}` (expected static|dynamic)"
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
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("citabot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(chat) = patch.chat {
            if let Some(session_dir) = chat.session_dir {
                self.chat.session_dir = session_dir;
            }
            if let Some(max_reconnects) = chat.max_reconnects {
                self.chat.max_reconnects = max_reconnects;
            }
            if let Some(base) = chat.reconnect_base_delay_ms {
                self.chat.reconnect_base_delay_ms = base;
            }
            if let Some(max) = chat.reconnect_max_delay_ms {
                self.chat.reconnect_max_delay_ms = max;
            }
        }

        if let Some(qna) = patch.qna {
            if let Some(enabled) = qna.enabled {
                self.qna.enabled = enabled;
            }
            if let Some(webhook_url) = qna.webhook_url {
                self.qna.webhook_url = Some(webhook_url);
            }
            if let Some(timeout_secs) = qna.timeout_secs {
                self.qna.timeout_secs = timeout_secs;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(url) = calendar.availability_webhook_url {
                self.calendar.availability_webhook_url = url;
            }
            if let Some(url) = calendar.booking_webhook_url {
                self.calendar.booking_webhook_url = url;
            }
            if let Some(timeout_secs) = calendar.timeout_secs {
                self.calendar.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(mode) = catalog.mode {
                self.catalog.mode = mode;
            }
            if let Some(source_url) = catalog.source_url {
                self.catalog.source_url = Some(source_url);
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(idle_timeout_secs) = conversation.idle_timeout_secs {
                self.conversation.idle_timeout_secs = idle_timeout_secs;
            }
            if let Some(sweep_interval_secs) = conversation.sweep_interval_secs {
                self.conversation.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(transcript_window) = conversation.transcript_window {
                self.conversation.transcript_window = transcript_window;
            }
            if let Some(contact_from_sender) = conversation.contact_from_sender {
                self.conversation.contact_from_sender = contact_from_sender;
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
        if let Some(value) = read_env("CITABOT_QNA_ENABLED") {
            self.qna.enabled = parse_bool("CITABOT_QNA_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CITABOT_QNA_WEBHOOK_URL") {
            self.qna.webhook_url = Some(value);
        }
        if let Some(value) = read_env("CITABOT_AVAILABILITY_WEBHOOK_URL") {
            self.calendar.availability_webhook_url = value;
        }
        if let Some(value) = read_env("CITABOT_BOOKING_WEBHOOK_URL") {
            self.calendar.booking_webhook_url = value;
        }
        if let Some(value) = read_env("CITABOT_CATALOG_MODE") {
            self.catalog.mode = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "CITABOT_CATALOG_MODE".to_string(),
                value,
            })?;
        }
        if let Some(value) = read_env("CITABOT_CATALOG_SOURCE_URL") {
            self.catalog.source_url = Some(value);
        }
        if let Some(value) = read_env("CITABOT_CONTACT_FROM_SENDER") {
            self.conversation.contact_from_sender =
                parse_bool("CITABOT_CONTACT_FROM_SENDER", &value)?;
        }
        if let Some(value) = read_env("CITABOT_IDLE_TIMEOUT_SECS") {
            self.conversation.idle_timeout_secs =
                parse_u64("CITABOT_IDLE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CITABOT_SWEEP_INTERVAL_SECS") {
            self.conversation.sweep_interval_secs =
                parse_u64("CITABOT_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("CITABOT_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("CITABOT_LOG_FORMAT") {
            self.logging.format = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "CITABOT_LOG_FORMAT".to_string(),
                value,
            })?;
        }
        if let Some(value) = read_env("CITABOT_SESSION_DIR") {
            self.chat.session_dir = value;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(enabled) = overrides.qna_enabled {
            self.qna.enabled = enabled;
        }
        if let Some(url) = overrides.qna_webhook_url {
            self.qna.webhook_url = Some(url);
        }
        if let Some(url) = overrides.availability_webhook_url {
            self.calendar.availability_webhook_url = url;
        }
        if let Some(url) = overrides.booking_webhook_url {
            self.calendar.booking_webhook_url = url;
        }
        if let Some(mode) = overrides.catalog_mode {
            self.catalog.mode = mode;
        }
        if let Some(url) = overrides.catalog_source_url {
            self.catalog.source_url = Some(url);
        }
        if let Some(contact_from_sender) = overrides.contact_from_sender {
            self.conversation.contact_from_sender = contact_from_sender;
        }
        if let Some(idle_timeout_secs) = overrides.idle_timeout_secs {
            self.conversation.idle_timeout_secs = idle_timeout_secs;
        }
        if let Some(sweep_interval_secs) = overrides.sweep_interval_secs {
            self.conversation.sweep_interval_secs = sweep_interval_secs;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_webhook_url("calendar.availability_webhook_url", &self.calendar.availability_webhook_url)?;
        require_webhook_url("calendar.booking_webhook_url", &self.calendar.booking_webhook_url)?;

        if self.qna.enabled {
            let url = self.qna.webhook_url.as_deref().unwrap_or("");
            require_webhook_url("qna.webhook_url", url)?;
        }

        if self.catalog.mode == CatalogMode::Dynamic {
            let url = self.catalog.source_url.as_deref().unwrap_or("");
            require_webhook_url("catalog.source_url", url)?;
        }

        if self.conversation.transcript_window == 0 {
            return Err(ConfigError::Validation(
                "conversation.transcript_window must be at least 1".to_string(),
            ));
        }
        if self.conversation.idle_timeout_secs == 0 || self.conversation.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "conversation idle timeout and sweep interval must be positive".to_string(),
            ));
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "unsupported logging.level `{}` (expected trace|debug|info|warn|error)",
                self.logging.level
            )));
        }

        Ok(())
    }
}

fn require_webhook_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(ConfigError::Validation(format!("{key} must be an http(s) URL, got `{value}`")))
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        return None;
    }
    let default = PathBuf::from("citabot.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    chat: Option<ChatPatch>,
    qna: Option<QnaPatch>,
    calendar: Option<CalendarPatch>,
    catalog: Option<CatalogPatch>,
    conversation: Option<ConversationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    session_dir: Option<String>,
    max_reconnects: Option<u32>,
    reconnect_base_delay_ms: Option<u64>,
    reconnect_max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QnaPatch {
    enabled: Option<bool>,
    webhook_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    availability_webhook_url: Option<String>,
    booking_webhook_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    mode: Option<CatalogMode>,
    source_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    idle_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    transcript_window: Option<usize>,
    contact_from_sender: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
