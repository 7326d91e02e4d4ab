//! Configuration management

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::application::errors::ConfigError;

pub const DEFAULT_TIMEZONE: &str = "Asia/Taipei";
pub const DEFAULT_SAVE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub runtime: RuntimeConfig,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Process environment: where state lives and how often tasks run
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub timezone: String,
    pub save_interval_secs: u64,
    pub check_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DiscordConfig {
    pub api_base: String,
    pub gateway_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "lucky-draw-bot".to_string(),
            token: None,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            timezone: DEFAULT_TIMEZONE.to_string(),
            save_interval_secs: DEFAULT_SAVE_INTERVAL_SECS,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: "https://discord.com/api/v10".to_string(),
            gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn load_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay process environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlay variables from `lookup`; empty values are ignored
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("DISCORD_BOT_TOKEN") {
            self.bot.token = Some(token.trim().to_string());
        }
        if let Some(dir) = get("DATA_DIR") {
            self.runtime.data_dir = PathBuf::from(dir);
        }
        if let Some(tz) = get("TIMEZONE") {
            self.runtime.timezone = tz.trim().to_string();
        }
        if let Some(secs) = get("SAVE_INTERVAL") {
            self.runtime.save_interval_secs = parse_secs("SAVE_INTERVAL", &secs)?;
        }
        if let Some(secs) = get("CHECK_INTERVAL") {
            self.runtime.check_interval_secs = parse_secs("CHECK_INTERVAL", &secs)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;
        if self.runtime.save_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("save-interval-secs must be > 0".into()));
        }
        if self.runtime.check_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("check-interval-secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.runtime
            .timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidValue(format!("unknown timezone: {}", self.runtime.timezone)))
    }

    pub fn token(&self) -> Result<&str, ConfigError> {
        self.bot
            .token
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("DISCORD_BOT_TOKEN".to_string()))
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.runtime.save_interval_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.runtime.check_interval_secs)
    }
}

/// Log filter from `RUST_LOG` directives; `info` when unset, blank or
/// unparsable
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

fn parse_secs(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{} must be a number of seconds, got {:?}", key, value)))
}
