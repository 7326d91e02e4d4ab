use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::domain::entities::{Command, Embed, Interaction, Reply};

/// Bot trait - abstraction for messaging platform adapters
#[async_trait]
pub trait Bot: Send + Sync {
    /// Prepare the adapter before events are handled
    async fn start(&self) -> Result<(), BotError>;

    /// Publish the slash commands, returning how many the platform accepted
    async fn register_commands(&self, commands: &[Command]) -> Result<usize, BotError>;

    /// Answer an interaction.
    ///
    /// Returns the id of the posted message when the platform reports one.
    async fn respond(&self, interaction: &Interaction, reply: &Reply) -> Result<Option<u64>, BotError>;

    /// Replace the text of an earlier answer
    async fn edit_response(&self, interaction: &Interaction, content: &str) -> Result<(), BotError>;

    /// Post a message to a channel
    async fn send_message(&self, channel_id: u64, reply: &Reply) -> Result<u64, BotError>;

    /// Replace the embed of an existing message
    async fn edit_embed(&self, channel_id: u64, message_id: u64, embed: &Embed) -> Result<(), BotError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Bot information
#[derive(Debug, Clone, Default)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}
