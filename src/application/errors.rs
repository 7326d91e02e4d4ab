//! Application layer errors

use std::path::PathBuf;
use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Gateway closed: {0}")]
    GatewayClosed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command execution errors. The display text is shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("❌ 持續時間必須至少1分鐘！")]
    DurationTooShort,

    #[error("❌ 持續時間不能超過7天（10080分鐘）！")]
    DurationTooLong,

    #[error("❌ 得獎者數量必須至少1人！")]
    TooFewWinners,

    #[error("❌ 得獎者數量不能超過100人！")]
    TooManyWinners,

    #[error("❌ 找不到此抽獎ID！")]
    DrawNotFound(u64),

    #[error("❌ 此抽獎已經結束！")]
    DrawAlreadyEnded(u64),

    #[error("❌ 缺少參數：{0}")]
    MissingOption(String),

    #[error("❌ 參數格式錯誤：{0}")]
    InvalidOption(String),

    #[error("❌ 你沒有權限使用此指令！")]
    PermissionDenied,

    #[error("❌ 未知的指令：{0}")]
    NotFound(String),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Runtime environment contract violations
#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("refusing to run as privileged user (uid {0})")]
    PrivilegedIdentity(u32),

    #[error("cannot create data directory {path}: {source}")]
    DataDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data directory {path} is not writable: {source}")]
    DataDirNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
