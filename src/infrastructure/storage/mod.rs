//! File-based storage implementation
//!
//! The ledger is written as one JSON document inside the data directory.
//! Every save goes to a temporary file first; the previous snapshot is kept
//! as a backup and used when the primary file cannot be read.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::entities::{DrawLedger, LuckyDraw};
use crate::domain::traits::{FileStatus, Store, StoreStatus};

pub const DRAWS_FILE: &str = "lucky_draws.json";
pub const BACKUP_FILE: &str = "lucky_draws.backup.json";
pub const TEMP_FILE: &str = "lucky_draws.tmp";

/// On-disk layout of the whole ledger
#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    last_draw_id: u64,
    #[serde(default)]
    draws: BTreeMap<String, DrawRecord>,
}

/// On-disk layout of one draw. Optional fields cover files written by
/// older versions.
#[derive(Debug, Serialize, Deserialize)]
struct DrawRecord {
    id: u64,
    prize: String,
    end_time: String,
    #[serde(default)]
    participants: Vec<u64>,
    channel_id: u64,
    creator_id: u64,
    creator_name: String,
    active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ended_at: Option<String>,
    #[serde(default)]
    winners_count: Option<u32>,
    #[serde(default)]
    winner_ids: Option<Vec<u64>>,
    #[serde(default)]
    winner_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_id: Option<u64>,
}

impl DrawRecord {
    fn from_draw(draw: &LuckyDraw, tz: Tz) -> Self {
        Self {
            id: draw.id,
            prize: draw.prize.clone(),
            end_time: format_time(draw.end_time, tz),
            participants: draw.participants.iter().copied().collect(),
            channel_id: draw.channel_id,
            creator_id: draw.creator_id,
            creator_name: draw.creator_name.clone(),
            active: draw.active,
            created_at: Some(format_time(draw.created_at, tz)),
            ended_at: draw.ended_at.map(|t| format_time(t, tz)),
            winners_count: Some(draw.winners_count),
            winner_ids: Some(draw.winner_ids.clone()),
            winner_id: draw.winner_id(),
            message_id: draw.message_id,
        }
    }

    fn into_draw(self, tz: Tz) -> Result<LuckyDraw, StorageError> {
        let id = self.id;
        let time = |field: &str, value: &str| {
            parse_time(value, tz).ok_or_else(|| StorageError::InvalidRecord {
                id: id.to_string(),
                reason: format!("bad {}: {:?}", field, value),
            })
        };

        let end_time = time("end_time", &self.end_time)?;
        let created_at = match self.created_at.as_deref() {
            Some(v) => time("created_at", v)?,
            None => end_time,
        };
        let ended_at = match self.ended_at.as_deref() {
            Some(v) => Some(time("ended_at", v)?),
            None => None,
        };
        let winner_ids = self
            .winner_ids
            .unwrap_or_else(|| self.winner_id.into_iter().collect());

        Ok(LuckyDraw {
            id,
            prize: self.prize,
            end_time,
            participants: self.participants.into_iter().collect(),
            channel_id: self.channel_id,
            creator_id: self.creator_id,
            creator_name: self.creator_name,
            active: self.active,
            created_at,
            ended_at,
            winners_count: self.winners_count.unwrap_or(1),
            winner_ids,
            message_id: self.message_id,
        })
    }
}

/// ISO-8601 with the offset of the configured zone
pub fn format_time(t: DateTime<Utc>, tz: Tz) -> String {
    t.with_timezone(&tz).to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parse ISO-8601; timestamps without an offset are read in `tz`
pub fn parse_time(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

/// JSON file-based store
pub struct JsonStore {
    base_path: PathBuf,
    tz: Tz,
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(base_path: impl Into<PathBuf>, tz: Tz) -> Self {
        Self {
            base_path: base_path.into(),
            tz,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    pub fn primary_path(&self) -> PathBuf {
        self.base_path.join(DRAWS_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.base_path.join(BACKUP_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join(TEMP_FILE)
    }

    fn encode(&self, ledger: &DrawLedger) -> Result<String, StorageError> {
        let snapshot = SnapshotFile {
            last_draw_id: ledger.last_draw_id(),
            draws: ledger
                .iter()
                .map(|d| (d.id.to_string(), DrawRecord::from_draw(d, self.tz)))
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    fn decode(&self, content: &str) -> Result<DrawLedger, StorageError> {
        let snapshot: SnapshotFile = serde_json::from_str(content)?;
        let draws = snapshot
            .draws
            .into_values()
            .map(|r| r.into_draw(self.tz))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DrawLedger::from_parts(snapshot.last_draw_id, draws))
    }

    async fn read_ledger(&self, path: &Path) -> Result<DrawLedger, StorageError> {
        let content = tokio::fs::read_to_string(path).await?;
        self.decode(&content)
    }
}

async fn file_status(path: &Path) -> Result<Option<FileStatus>, StorageError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(FileStatus {
            size_bytes: meta.len(),
            modified: DateTime::<Utc>::from(meta.modified()?),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn load(&self) -> Result<Option<DrawLedger>, StorageError> {
        let primary = self.primary_path();
        let backup = self.backup_path();

        if !primary.exists() {
            if backup.exists() {
                // A save was interrupted between the two renames
                tracing::warn!("Primary data file missing, restoring {}", backup.display());
                tokio::fs::rename(&backup, &primary).await?;
            } else {
                tracing::info!("No saved draws found in {}", self.base_path.display());
                return Ok(None);
            }
        }

        match self.read_ledger(&primary).await {
            Ok(ledger) => {
                tracing::info!("Loaded {} draws", ledger.len());
                Ok(Some(ledger))
            }
            Err(e) => {
                tracing::error!("Failed to load {}: {}", primary.display(), e);
                if !backup.exists() {
                    return Err(e);
                }
                tracing::warn!("Trying backup file {}", backup.display());
                tokio::fs::rename(&backup, &primary).await?;
                let ledger = self.read_ledger(&primary).await.map_err(|e| {
                    tracing::error!("Backup file could not be loaded either: {}", e);
                    e
                })?;
                tracing::info!("Loaded {} draws from backup", ledger.len());
                Ok(Some(ledger))
            }
        }
    }

    async fn save(&self, ledger: &DrawLedger) -> Result<(), StorageError> {
        let content = self.encode(ledger)?;
        let _guard = self.write_lock.lock().await;

        let temp = self.temp_path();
        let primary = self.primary_path();
        tokio::fs::write(&temp, content.as_bytes()).await?;

        if primary.exists() {
            tokio::fs::rename(&primary, self.backup_path()).await?;
        }
        tokio::fs::rename(&temp, &primary).await?;

        tracing::info!("Saved {} draws", ledger.len());
        Ok(())
    }

    async fn status(&self) -> Result<StoreStatus, StorageError> {
        Ok(StoreStatus {
            location: self.base_path.display().to_string(),
            primary: file_status(&self.primary_path()).await?,
            backup: file_status(&self.backup_path()).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{NewDraw, User};
    use chrono_tz::Asia::Taipei;

    fn ledger_with(n: usize) -> DrawLedger {
        let mut ledger = DrawLedger::new();
        let now = Utc::now();
        for i in 0..n {
            let id = ledger
                .create(
                    NewDraw {
                        prize: format!("prize {}", i),
                        minutes: 30,
                        winners: 2,
                        channel_id: 7,
                        creator: User::new(1).with_username("host"),
                    },
                    now,
                )
                .unwrap()
                .id;
            ledger.get_mut(id).unwrap().join(100 + i as u64).unwrap();
        }
        ledger
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), Taipei);
        let ledger = ledger_with(2);

        store.save(&ledger).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.last_draw_id(), 2);
        let original = ledger.get(1).unwrap();
        let restored = loaded.get(1).unwrap();
        assert_eq!(restored.participants, original.participants);
        assert_eq!(restored.winners_count, 2);
        // Micro-second precision on disk
        assert_eq!(
            restored.end_time.timestamp_micros(),
            original.end_time.timestamp_micros()
        );
        assert!(!dir.path().join(TEMP_FILE).exists());
    }

    #[tokio::test]
    async fn empty_directory_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), Taipei);
        assert!(store.load().await.unwrap().is_none());
        let status = store.status().await.unwrap();
        assert!(status.primary.is_none());
        assert!(status.backup.is_none());
    }

    #[tokio::test]
    async fn second_save_rotates_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), Taipei);

        store.save(&ledger_with(1)).await.unwrap();
        assert!(!store.backup_path().exists());
        store.save(&ledger_with(3)).await.unwrap();

        let backup = std::fs::read_to_string(store.backup_path()).unwrap();
        let previous = store.decode(&backup).unwrap();
        assert_eq!(previous.len(), 1);

        let status = store.status().await.unwrap();
        assert!(status.primary.unwrap().size_bytes > 0);
        assert!(status.backup.is_some());
    }

    #[tokio::test]
    async fn corrupt_primary_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), Taipei);

        store.save(&ledger_with(2)).await.unwrap();
        store.save(&ledger_with(3)).await.unwrap();
        std::fs::write(store.primary_path(), "{ not json").unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(!store.backup_path().exists());
    }

    #[tokio::test]
    async fn missing_primary_promotes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), Taipei);

        store.save(&ledger_with(2)).await.unwrap();
        store.save(&ledger_with(3)).await.unwrap();
        // Interrupted between rotating the primary and moving the new file in
        std::fs::remove_file(store.primary_path()).unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.last_draw_id(), 2);
        assert!(store.primary_path().exists());
        assert!(!store.backup_path().exists());
    }

    #[tokio::test]
    async fn corrupt_primary_without_backup_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), Taipei);
        std::fs::write(store.primary_path(), "garbage").unwrap();
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn legacy_records_get_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), Taipei);
        let legacy = r#"{
          "last_draw_id": 4,
          "draws": {
            "3": {
              "id": 3,
              "prize": "舊獎品",
              "end_time": "2024-01-02T20:30:00",
              "participants": [11, 12],
              "channel_id": 5,
              "creator_id": 1,
              "creator_name": "host",
              "active": false,
              "created_at": "2024-01-02T20:00:00.123456+08:00",
              "winner_id": 12
            }
          }
        }"#;
        std::fs::write(store.primary_path(), legacy).unwrap();

        let ledger = store.load().await.unwrap().unwrap();
        assert_eq!(ledger.last_draw_id(), 4);
        let draw = ledger.get(3).unwrap();
        assert_eq!(draw.winner_ids, vec![12]);
        assert_eq!(draw.winners_count, 1);
        // Naive timestamps are read in the configured zone (UTC+8)
        assert_eq!(draw.end_time, Utc.with_ymd_and_hms(2024, 1, 2, 12, 30, 0).unwrap());
    }

    #[test]
    fn time_format_uses_zone_offset() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap();
        let s = format_time(t, Taipei);
        assert_eq!(s, "2024-05-01T12:00:00.000000+08:00");
        assert_eq!(parse_time(&s, Taipei), Some(t));
        assert_eq!(parse_time("yesterday", Taipei), None);
    }
}
