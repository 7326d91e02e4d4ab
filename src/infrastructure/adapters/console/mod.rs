//! Console adapter for development/testing

use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::errors::BotError;
use crate::application::messaging::{BotEvent, MessageParser};
use crate::domain::entities::{Command, CommandRegistry, Embed, Interaction, Reply};
use crate::domain::traits::{Bot, BotInfo};

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
    next_message_id: AtomicU64,
}

impl ConsoleAdapter {
    pub fn new() -> Self {
        Self {
            info: BotInfo {
                id: "console".to_string(),
                name: "lucky-draw-bot".to_string(),
                username: "console".to_string(),
            },
            next_message_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Read stdin lines into interactions until EOF or shutdown
    pub fn spawn_input(
        parser: MessageParser,
        registry: CommandRegistry,
        events: mpsc::Sender<BotEvent>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                let line = tokio::select! {
                    line = lines.next_line() => line,
                    _ = shutdown.cancelled() => break,
                };
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                match parser.parse(&line, &registry) {
                    Ok(Some(interaction)) => {
                        if events.send(BotEvent::Interaction(interaction)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
            let _ = events.send(BotEvent::Closed).await;
        })
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-text rendering of an embed
pub fn render_embed(embed: &Embed) -> String {
    let mut out = format!("┃ {}", embed.title);
    if let Some(description) = &embed.description {
        for line in description.lines() {
            let _ = write!(out, "\n┃ {}", line);
        }
    }
    for field in &embed.fields {
        let _ = write!(out, "\n┃ {}: {}", field.name, field.value.replace('\n', " / "));
    }
    if let Some(footer) = &embed.footer {
        let _ = write!(out, "\n┃ ({})", footer);
    }
    out
}

/// Plain-text rendering of a reply
pub fn render_reply(reply: &Reply) -> String {
    let mut parts = Vec::new();
    if let Some(content) = &reply.content {
        parts.push(content.clone());
    }
    if let Some(embed) = &reply.embed {
        parts.push(render_embed(embed));
    }
    if !reply.buttons.is_empty() {
        let row: Vec<String> = reply
            .buttons
            .iter()
            .map(|b| match &b.emoji {
                Some(emoji) => format!("{} {} <{}>", emoji, b.label, b.custom_id),
                None => format!("{} <{}>", b.label, b.custom_id),
            })
            .collect();
        parts.push(format!("  [Buttons] {}", row.join(" | ")));
    }
    parts.join("\n")
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");
        Ok(())
    }

    async fn register_commands(&self, commands: &[Command]) -> Result<usize, BotError> {
        for command in commands {
            let options: Vec<&str> = command.options.iter().map(|o| o.name.as_str()).collect();
            println!("  /{} {}  - {}", command.name, options.join(" "), command.description);
        }
        Ok(commands.len())
    }

    async fn respond(&self, interaction: &Interaction, reply: &Reply) -> Result<Option<u64>, BotError> {
        let tag = if reply.ephemeral {
            format!("[BOT → {}]", interaction.user.display_name())
        } else {
            "[BOT]".to_string()
        };
        println!("{} {}", tag, render_reply(reply));
        if reply.ephemeral {
            Ok(None)
        } else {
            Ok(Some(self.next_id()))
        }
    }

    async fn edit_response(&self, _interaction: &Interaction, content: &str) -> Result<(), BotError> {
        println!("[BOT edit] {}", content);
        Ok(())
    }

    async fn send_message(&self, channel_id: u64, reply: &Reply) -> Result<u64, BotError> {
        let id = self.next_id();
        println!("[BOT #{} msg {}] {}", channel_id, id, render_reply(reply));
        Ok(id)
    }

    async fn edit_embed(&self, _channel_id: u64, message_id: u64, embed: &Embed) -> Result<(), BotError> {
        println!("[BOT edit msg {}]\n{}", message_id, render_embed(embed));
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Button, Color};

    #[test]
    fn reply_renders_every_part() {
        let reply = Reply::text("🎉 新抽獎開始！ @everyone")
            .with_embed(Embed::new("🎉 抽獎活動", Color::Gold).field("🎁 獎品", "Steam", true))
            .with_button(Button::new("參加", "lucky_draw:join:1").with_emoji("🎉"));
        let text = render_reply(&reply);

        assert!(text.starts_with("🎉 新抽獎開始！"));
        assert!(text.contains("┃ 🎁 獎品: Steam"));
        assert!(text.contains("🎉 參加 <lucky_draw:join:1>"));
    }

    #[tokio::test]
    async fn message_ids_increase() {
        let bot = ConsoleAdapter::new();
        let first = bot.send_message(1, &Reply::text("a")).await.unwrap();
        let second = bot.send_message(1, &Reply::text("b")).await.unwrap();
        assert!(second > first);
    }
}
