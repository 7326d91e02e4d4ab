//! Background tasks: ending expired draws and auto-saving

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::services::{CommandService, DrawService};
use crate::domain::traits::Bot;

pub struct Scheduler<B: Bot> {
    commands: Arc<CommandService<B>>,
    draws: Arc<DrawService>,
    check_interval: Duration,
    save_interval: Duration,
    shutdown: CancellationToken,
}

impl<B: Bot + 'static> Scheduler<B> {
    pub fn new(
        commands: Arc<CommandService<B>>,
        draws: Arc<DrawService>,
        check_interval: Duration,
        save_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            commands,
            draws,
            check_interval,
            save_interval,
            shutdown,
        }
    }

    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            check_secs = self.check_interval.as_secs(),
            save_secs = self.save_interval.as_secs(),
            "Starting scheduler"
        );

        let mut check = interval(self.check_interval);
        check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut save = interval(self.save_interval);
        save.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = check.tick() => {
                    let ended = self.commands.end_due(Utc::now()).await;
                    if ended > 0 {
                        tracing::info!(ended, "Ended expired draws");
                    }
                }
                _ = save.tick() => {
                    if let Err(e) = self.draws.save_if_dirty().await {
                        tracing::error!("Auto-save failed: {}", e);
                    }
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::Renderer;
    use crate::application::testing::{MemoryStore, RecordingBot};
    use crate::domain::entities::{NewDraw, User};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[tokio::test(start_paused = true)]
    async fn ends_expired_draws_and_saves_only_changes() {
        let store = Arc::new(MemoryStore::default());
        let draws = Arc::new(DrawService::with_rng(store.clone(), StdRng::seed_from_u64(3)));
        let bot = Arc::new(RecordingBot::default());
        let commands = Arc::new(CommandService::new(
            bot.clone(),
            draws.clone(),
            Renderer::new(chrono_tz::Asia::Taipei),
        ));

        // Created five minutes ago with a one minute duration
        let req = NewDraw {
            prize: "Cap".to_string(),
            minutes: 1,
            winners: 1,
            channel_id: 9,
            creator: User::new(1),
        };
        draws.create(req, Utc::now() - chrono::Duration::minutes(5)).await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = Scheduler::new(
            commands,
            draws.clone(),
            Duration::from_secs(1),
            Duration::from_secs(5),
            shutdown.clone(),
        )
        .start();

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(bot.sent.lock().unwrap().len(), 1);
        assert_eq!(bot.sent.lock().unwrap()[0].0, 9);
        assert!(!draws.get(1).await.unwrap().active);
        assert!(!draws.is_dirty());
        let saves = store.saves();
        assert!(saves >= 1);

        // nothing changed, nothing written
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(store.saves(), saves);
        assert_eq!(bot.sent.lock().unwrap().len(), 1);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler stops on cancel")
            .unwrap();
    }
}
