//! Message dispatcher - Routes platform events to the command service

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::services::CommandService;
use crate::domain::entities::Interaction;
use crate::domain::traits::{Bot, BotInfo};

/// Events produced by a platform adapter
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// The session is established
    Ready(BotInfo),
    Interaction(Interaction),
    /// The adapter stopped producing events
    Closed,
}

/// Feeds adapter events to the command service one at a time
pub struct MessageDispatcher<B: Bot> {
    commands: Arc<CommandService<B>>,
}

impl<B: Bot> MessageDispatcher<B> {
    pub fn new(commands: Arc<CommandService<B>>) -> Self {
        Self { commands }
    }

    /// Run until the channel closes, the adapter reports `Closed`, or
    /// shutdown is requested
    pub async fn run(&self, mut events: mpsc::Receiver<BotEvent>, shutdown: CancellationToken) {
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown signal received, stopping dispatcher");
                    break;
                }
            };

            match event {
                Some(BotEvent::Ready(info)) => {
                    tracing::info!("{} is online", info.username);
                    match self.commands.register_commands().await {
                        Ok(count) => tracing::info!("Synced {} slash commands", count),
                        Err(e) => tracing::error!("Failed to sync commands: {}", e),
                    }
                }
                Some(BotEvent::Interaction(interaction)) => self.dispatch(&interaction).await,
                Some(BotEvent::Closed) | None => {
                    tracing::info!("Event source closed");
                    break;
                }
            }
        }
    }

    async fn dispatch(&self, interaction: &Interaction) {
        tracing::debug!(user = interaction.user.id, kind = ?interaction.kind, "Interaction received");
        if let Err(e) = self.commands.handle(interaction).await {
            tracing::error!(user = interaction.user.id, "Failed to handle interaction: {}", e);
        }
    }
}
