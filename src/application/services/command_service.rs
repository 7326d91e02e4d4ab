use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::errors::{BotError, CommandError};
use crate::application::services::render::{parse_join_custom_id, Renderer};
use crate::application::services::DrawService;
use crate::domain::entities::{
    Command, CommandRegistry, DrawId, DrawOutcome, Interaction, InteractionKind, NewDraw, OptionKind, Reply,
};
use crate::domain::traits::Bot;

pub const CMD_CREATE: &str = "抽獎";
pub const CMD_LIST: &str = "抽獎列表";
pub const CMD_FORCE_END: &str = "強制結束";
pub const CMD_HISTORY: &str = "抽獎紀錄";
pub const CMD_BACKUP: &str = "備份狀態";
pub const CMD_HELP: &str = "幫助";

pub const DEFAULT_HISTORY_LIMIT: i64 = 5;
pub const MAX_HISTORY_LIMIT: i64 = 20;

/// The slash commands this bot offers
pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(
        Command::new(CMD_CREATE, "創建一個新的抽獎活動")
            .with_option("prize", OptionKind::String, true, "要抽出的獎品名稱（例如：Steam點數1000元）")
            .with_option(
                "minutes",
                OptionKind::Integer,
                true,
                "抽獎持續時間，以分鐘為單位（最少1分鐘，最多10080分鐘=7天）",
            )
            .with_option("winners", OptionKind::Integer, false, "要抽出的得獎者數量（預設1人，最多100人）"),
    );
    registry.register(Command::new(CMD_LIST, "顯示所有進行中的抽獎活動"));
    registry.register(
        Command::new(CMD_FORCE_END, "強制結束指定的抽獎（需要管理員權限）")
            .with_option("draw_id", OptionKind::Integer, true, "要結束的抽獎ID（可從 /抽獎列表 查看）")
            .admin_only(),
    );
    registry.register(
        Command::new(CMD_HISTORY, "查看最近的抽獎結果")
            .with_option("limit", OptionKind::Integer, false, "要顯示的紀錄數量（預設5筆，最多20筆）"),
    );
    registry.register(Command::new(CMD_BACKUP, "查看資料備份狀態（管理員專用）").admin_only());
    registry.register(Command::new(CMD_HELP, "顯示機器人使用說明"));
    registry
}

/// Service for executing slash commands and button presses
pub struct CommandService<B: Bot> {
    bot: Arc<B>,
    draws: Arc<DrawService>,
    render: Renderer,
    registry: CommandRegistry,
}

impl<B: Bot> CommandService<B> {
    pub fn new(bot: Arc<B>, draws: Arc<DrawService>, render: Renderer) -> Self {
        Self {
            bot,
            draws,
            render,
            registry: default_registry(),
        }
    }

    /// Publish the command list to the platform
    pub async fn register_commands(&self) -> Result<usize, BotError> {
        let commands: Vec<Command> = self.registry.all().cloned().collect();
        self.bot.register_commands(&commands).await
    }

    /// Handle one interaction. Validation errors are answered to the user
    /// privately; transport errors are returned.
    pub async fn handle(&self, interaction: &Interaction) -> Result<(), BotError> {
        let result = match &interaction.kind {
            InteractionKind::Button { custom_id } => match parse_join_custom_id(custom_id) {
                Some(id) => self.join(interaction, id).await,
                None => {
                    tracing::debug!("Ignoring unknown button {}", custom_id);
                    return Ok(());
                }
            },
            InteractionKind::Command { name, .. } => self.run_command(interaction, name).await,
        };

        match result {
            Err(BotError::Command(e)) => {
                tracing::debug!("Command rejected: {}", e);
                self.bot
                    .respond(interaction, &Reply::text(e.to_string()).ephemeral())
                    .await
                    .map(|_| ())
            }
            other => other,
        }
    }

    async fn run_command(&self, interaction: &Interaction, name: &str) -> Result<(), BotError> {
        let command = self
            .registry
            .find(name)
            .ok_or_else(|| CommandError::NotFound(name.to_string()))?;
        if command.admin_only && !interaction.is_admin {
            return Err(CommandError::PermissionDenied.into());
        }

        match command.name.as_str() {
            CMD_CREATE => self.create_draw(interaction).await,
            CMD_LIST => self.list_draws(interaction).await,
            CMD_FORCE_END => self.force_end(interaction).await,
            CMD_HISTORY => self.history(interaction).await,
            CMD_BACKUP => self.backup_status(interaction).await,
            CMD_HELP => self.help(interaction).await,
            other => Err(CommandError::NotFound(other.to_string()).into()),
        }
    }

    async fn create_draw(&self, interaction: &Interaction) -> Result<(), BotError> {
        let prize = interaction.required_string("prize")?;
        let minutes = interaction.required_int("minutes")?;
        let winners = interaction.int_option("winners")?.unwrap_or(1);
        let now = Utc::now();

        let draw = self
            .draws
            .create(
                NewDraw {
                    prize,
                    minutes,
                    winners,
                    channel_id: interaction.channel_id,
                    creator: interaction.user.clone(),
                },
                now,
            )
            .await?;

        let reply = Reply::text("@everyone 新的抽獎活動開始了！點擊下方按鈕參加！")
            .with_embed(self.render.draw_embed(&draw, now))
            .with_button(self.render.join_button(draw.id))
            .mentioning_everyone();

        match self.bot.respond(interaction, &reply).await? {
            Some(message_id) => self.draws.attach_message(draw.id, message_id).await,
            None => tracing::warn!(draw_id = draw.id, "Announcement message id unknown"),
        }
        Ok(())
    }

    async fn join(&self, interaction: &Interaction, id: DrawId) -> Result<(), BotError> {
        let draw = match self.draws.join(id, interaction.user.id).await {
            Ok(draw) => draw,
            Err(e) => {
                self.bot
                    .respond(interaction, &Reply::text(e.to_string()).ephemeral())
                    .await?;
                return Ok(());
            }
        };

        let text = format!("✅ 成功參加抽獎！目前參加人數：{}", draw.participants.len());
        self.bot.respond(interaction, &Reply::text(text).ephemeral()).await?;

        if let Some(message_id) = draw.message_id.or(interaction.message_id) {
            let embed = self.render.draw_embed(&draw, Utc::now());
            if let Err(e) = self.bot.edit_embed(draw.channel_id, message_id, &embed).await {
                tracing::warn!(draw_id = id, "Failed to refresh draw message: {}", e);
            }
        }
        Ok(())
    }

    async fn list_draws(&self, interaction: &Interaction) -> Result<(), BotError> {
        let active = self.draws.active().await;
        let embed = self.render.active_list_embed(&active, Utc::now());
        self.bot.respond(interaction, &Reply::embed(embed)).await?;
        Ok(())
    }

    async fn force_end(&self, interaction: &Interaction) -> Result<(), BotError> {
        let raw = interaction.required_int("draw_id")?;
        let id = DrawId::try_from(raw).map_err(|_| CommandError::DrawNotFound(0))?;

        match self.draws.get(id).await {
            None => return Err(CommandError::DrawNotFound(id).into()),
            Some(draw) if !draw.active => return Err(CommandError::DrawAlreadyEnded(id).into()),
            Some(_) => {}
        }

        self.bot
            .respond(interaction, &Reply::text(format!("⏳ 正在結束抽獎 ID: {}...", id)))
            .await?;
        // The expiry check may close the draw while the reply is in flight;
        // the interaction is already answered, so that counts as ended.
        match self.end_draw(id, Utc::now()).await {
            Ok(_) => {}
            Err(BotError::Command(CommandError::DrawAlreadyEnded(_))) => {
                tracing::debug!(draw_id = id, "Draw ended by the scheduler first");
            }
            Err(e) => return Err(e),
        }
        self.bot
            .edit_response(interaction, &format!("✅ 已強制結束抽獎 ID: {}", id))
            .await
    }

    async fn history(&self, interaction: &Interaction) -> Result<(), BotError> {
        let limit = interaction
            .int_option("limit")?
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);

        let ended = self.draws.history(limit as usize).await;
        let reply = if ended.is_empty() {
            Reply::text("目前沒有已結束的抽獎紀錄。").ephemeral()
        } else {
            Reply::embed(self.render.history_embed(&ended))
        };
        self.bot.respond(interaction, &reply).await?;
        Ok(())
    }

    async fn backup_status(&self, interaction: &Interaction) -> Result<(), BotError> {
        let status = self.draws.store_status().await?;
        let (total, active) = self.draws.counts().await;
        let embed = self.render.backup_embed(&status, total, active);
        self.bot.respond(interaction, &Reply::embed(embed).ephemeral()).await?;
        Ok(())
    }

    async fn help(&self, interaction: &Interaction) -> Result<(), BotError> {
        let reply = Reply::embed(self.render.help_embed()).ephemeral();
        self.bot.respond(interaction, &reply).await?;
        Ok(())
    }

    /// Close a draw, pick winners and announce them in the draw's channel.
    ///
    /// The draw stays closed even when the announcement cannot be posted.
    pub async fn end_draw(&self, id: DrawId, now: DateTime<Utc>) -> Result<DrawOutcome, BotError> {
        let (draw, outcome) = self.draws.finish(id, now).await?;

        let reply = Reply::text(self.render.result_content(&outcome))
            .with_embed(self.render.result_embed(&draw, &outcome, now))
            .mentioning_everyone();
        if let Err(e) = self.bot.send_message(draw.channel_id, &reply).await {
            tracing::error!(draw_id = id, channel_id = draw.channel_id, "Failed to announce result: {}", e);
        }
        Ok(outcome)
    }

    /// End every draw whose time is up; returns how many were ended
    pub async fn end_due(&self, now: DateTime<Utc>) -> usize {
        let mut ended = 0;
        for id in self.draws.due(now).await {
            match self.end_draw(id, now).await {
                Ok(_) => ended += 1,
                Err(e) => tracing::warn!(draw_id = id, "Could not end draw: {}", e),
            }
        }
        ended
    }
}
