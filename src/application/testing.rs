//! In-memory doubles for unit tests

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::application::errors::{BotError, StorageError};
use crate::domain::entities::{Command, DrawLedger, Embed, Interaction, Reply};
use crate::domain::traits::{Bot, BotInfo, FileStatus, Store, StoreStatus};

/// Keeps the last saved ledger in memory
#[derive(Default)]
pub struct MemoryStore {
    pub saved: Mutex<Option<DrawLedger>>,
    pub saves: AtomicUsize,
    pub fail: AtomicBool,
    pub fail_load: AtomicBool,
}

impl MemoryStore {
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self) -> Result<Option<DrawLedger>, StorageError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(StorageError::Serialization("expected value at line 1".to_string()));
        }
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn save(&self, ledger: &DrawLedger) -> Result<(), StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.saved.lock().unwrap() = Some(ledger.clone());
        Ok(())
    }

    async fn status(&self) -> Result<StoreStatus, StorageError> {
        Ok(StoreStatus {
            location: "memory".to_string(),
            primary: self.saved.lock().unwrap().as_ref().map(|_| FileStatus {
                size_bytes: 1,
                modified: Utc::now(),
            }),
            backup: None,
        })
    }
}

/// Bot that records what it was asked to do
#[derive(Default)]
pub struct RecordingBot {
    pub registered: AtomicUsize,
    pub responses: Mutex<Vec<Reply>>,
    pub sent: Mutex<Vec<(u64, Reply)>>,
}

#[async_trait]
impl Bot for RecordingBot {
    async fn start(&self) -> Result<(), BotError> {
        Ok(())
    }

    async fn register_commands(&self, commands: &[Command]) -> Result<usize, BotError> {
        self.registered.fetch_add(commands.len(), Ordering::SeqCst);
        Ok(commands.len())
    }

    async fn respond(&self, _interaction: &Interaction, reply: &Reply) -> Result<Option<u64>, BotError> {
        self.responses.lock().unwrap().push(reply.clone());
        Ok(None)
    }

    async fn edit_response(&self, _interaction: &Interaction, _content: &str) -> Result<(), BotError> {
        Ok(())
    }

    async fn send_message(&self, channel_id: u64, reply: &Reply) -> Result<u64, BotError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((channel_id, reply.clone()));
        Ok(sent.len() as u64)
    }

    async fn edit_embed(&self, _channel_id: u64, _message_id: u64, _embed: &Embed) -> Result<(), BotError> {
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        BotInfo::default()
    }
}
