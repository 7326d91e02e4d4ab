use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;

use crate::application::errors::{CommandError, StorageError};
use crate::domain::entities::{DrawId, DrawLedger, DrawOutcome, JoinError, LuckyDraw, NewDraw, UserId};
use crate::domain::traits::{Store, StoreStatus};

/// Owns the draw ledger, tracks unsaved changes and persists them
pub struct DrawService {
    ledger: Mutex<DrawLedger>,
    dirty: AtomicBool,
    store: Arc<dyn Store>,
    rng: std::sync::Mutex<StdRng>,
}

impl DrawService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    pub fn with_rng(store: Arc<dyn Store>, rng: StdRng) -> Self {
        Self {
            ledger: Mutex::new(DrawLedger::new()),
            dirty: AtomicBool::new(false),
            store,
            rng: std::sync::Mutex::new(rng),
        }
    }

    /// Load persisted draws. A store failure leaves the ledger empty.
    pub async fn restore(&self) -> usize {
        match self.store.load().await {
            Ok(Some(loaded)) => {
                let count = loaded.len();
                *self.ledger.lock().await = loaded;
                count
            }
            Ok(None) => 0,
            Err(e) => {
                tracing::error!("Could not restore draws, starting empty: {}", e);
                0
            }
        }
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub async fn create(&self, req: NewDraw, now: DateTime<Utc>) -> Result<LuckyDraw, CommandError> {
        let draw = self.ledger.lock().await.create(req, now)?.clone();
        tracing::info!(draw_id = draw.id, prize = %draw.prize, "Draw created");
        self.mark_dirty();
        Ok(draw)
    }

    /// Remember which message announces the draw
    pub async fn attach_message(&self, id: DrawId, message_id: u64) {
        if let Some(draw) = self.ledger.lock().await.get_mut(id) {
            draw.message_id = Some(message_id);
            self.mark_dirty();
        }
    }

    /// Add a participant; returns the updated draw
    pub async fn join(&self, id: DrawId, user_id: UserId) -> Result<LuckyDraw, JoinError> {
        let mut ledger = self.ledger.lock().await;
        let draw = ledger.get_mut(id).ok_or(JoinError::Closed)?;
        draw.join(user_id)?;
        self.mark_dirty();
        Ok(draw.clone())
    }

    pub async fn get(&self, id: DrawId) -> Option<LuckyDraw> {
        self.ledger.lock().await.get(id).cloned()
    }

    pub async fn active(&self) -> Vec<LuckyDraw> {
        self.ledger.lock().await.active().into_iter().cloned().collect()
    }

    pub async fn history(&self, limit: usize) -> Vec<LuckyDraw> {
        self.ledger.lock().await.ended(limit).into_iter().cloned().collect()
    }

    pub async fn due(&self, now: DateTime<Utc>) -> Vec<DrawId> {
        self.ledger.lock().await.due(now)
    }

    /// Close a draw and pick its winners
    pub async fn finish(&self, id: DrawId, now: DateTime<Utc>) -> Result<(LuckyDraw, DrawOutcome), CommandError> {
        let mut ledger = self.ledger.lock().await;
        let outcome = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            ledger.finish(id, &mut *rng, now)?
        };
        self.mark_dirty();
        let draw = ledger.get(id).cloned().ok_or(CommandError::DrawNotFound(id))?;
        tracing::info!(draw_id = id, winners = outcome.winners.len(), "Draw ended");
        Ok((draw, outcome))
    }

    /// (total, active)
    pub async fn counts(&self) -> (usize, usize) {
        let ledger = self.ledger.lock().await;
        (ledger.len(), ledger.active_count())
    }

    pub async fn store_status(&self) -> Result<StoreStatus, StorageError> {
        self.store.status().await
    }

    pub async fn snapshot(&self) -> DrawLedger {
        self.ledger.lock().await.clone()
    }

    /// Save when something changed since the last save
    pub async fn save_if_dirty(&self) -> Result<bool, StorageError> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        self.persist().await.map(|_| true)
    }

    /// Save unconditionally
    pub async fn save_now(&self) -> Result<(), StorageError> {
        self.dirty.store(false, Ordering::SeqCst);
        self.persist().await
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let snapshot = self.snapshot().await;
        if let Err(e) = self.store.save(&snapshot).await {
            self.mark_dirty();
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::User;
    use crate::application::testing::MemoryStore;
    use chrono::Duration;

    fn req() -> NewDraw {
        NewDraw {
            prize: "Nitro".to_string(),
            minutes: 5,
            winners: 1,
            channel_id: 3,
            creator: User::new(1),
        }
    }

    fn service(store: Arc<MemoryStore>) -> DrawService {
        DrawService::with_rng(store, StdRng::seed_from_u64(11))
    }

    #[tokio::test]
    async fn changes_mark_dirty_and_save_once() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone());

        assert!(!svc.save_if_dirty().await.unwrap());
        let draw = svc.create(req(), Utc::now()).await.unwrap();
        assert!(svc.is_dirty());

        assert!(svc.save_if_dirty().await.unwrap());
        assert!(!svc.save_if_dirty().await.unwrap());
        assert_eq!(store.saves(), 1);

        svc.join(draw.id, 2).await.unwrap();
        assert!(svc.save_if_dirty().await.unwrap());
        assert_eq!(store.saves(), 2);
    }

    #[tokio::test]
    async fn failed_save_stays_dirty() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone());
        svc.create(req(), Utc::now()).await.unwrap();

        store.fail.store(true, Ordering::SeqCst);
        assert!(svc.save_if_dirty().await.is_err());
        assert!(svc.is_dirty());

        store.fail.store(false, Ordering::SeqCst);
        assert!(svc.save_if_dirty().await.unwrap());
    }

    #[tokio::test]
    async fn join_unknown_draw_is_closed() {
        let svc = service(Arc::new(MemoryStore::default()));
        assert_eq!(svc.join(42, 2).await.unwrap_err(), JoinError::Closed);
        assert!(!svc.is_dirty());
    }

    #[tokio::test]
    async fn restore_and_finish() {
        let store = Arc::new(MemoryStore::default());
        let first = service(store.clone());
        let now = Utc::now();
        let draw = first.create(req(), now).await.unwrap();
        first.join(draw.id, 5).await.unwrap();
        first.attach_message(draw.id, 777).await;
        first.save_now().await.unwrap();

        let second = service(store);
        assert_eq!(second.restore().await, 1);
        assert_eq!(second.get(draw.id).await.unwrap().message_id, Some(777));

        let later = now + Duration::minutes(6);
        assert_eq!(second.due(later).await, vec![draw.id]);
        let (ended, outcome) = second.finish(draw.id, later).await.unwrap();
        assert_eq!(outcome.winners, vec![5]);
        assert!(!ended.active);
        assert_eq!(second.counts().await, (1, 0));
        assert_eq!(second.history(5).await.len(), 1);
    }

    #[tokio::test]
    async fn unreadable_store_starts_empty() {
        let store = Arc::new(MemoryStore::default());
        let first = service(store.clone());
        first.create(req(), Utc::now()).await.unwrap();
        first.save_now().await.unwrap();

        store.fail_load.store(true, Ordering::SeqCst);
        let second = service(store);
        assert_eq!(second.restore().await, 0);
        assert_eq!(second.counts().await, (0, 0));
        assert!(!second.is_dirty());

        let draw = second.create(req(), Utc::now()).await.unwrap();
        assert_eq!(draw.id, 1);
    }
}
