use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::errors::StorageError;
use crate::domain::entities::DrawLedger;

/// Size and age of one persisted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

/// Where and how the draws are persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStatus {
    pub location: String,
    pub primary: Option<FileStatus>,
    pub backup: Option<FileStatus>,
}

/// Store trait - abstraction for draw persistence
#[async_trait]
pub trait Store: Send + Sync {
    /// Load the last saved ledger; `None` when nothing was saved yet
    async fn load(&self) -> Result<Option<DrawLedger>, StorageError>;

    /// Persist the whole ledger
    async fn save(&self, ledger: &DrawLedger) -> Result<(), StorageError>;

    async fn status(&self) -> Result<StoreStatus, StorageError>;
}
