//! Discord adapter

pub mod gateway;
pub mod models;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;

use crate::application::errors::BotError;
use crate::domain::entities::{Command, Embed, Interaction, Reply};
use crate::domain::traits::{Bot, BotInfo};
use crate::infrastructure::config::DiscordConfig;
use models::{Application, MessageId, RateLimited, RawUser};

pub use gateway::Gateway;

const USER_AGENT: &str = concat!("DiscordBot (https://discord.com, ", env!("CARGO_PKG_VERSION"), ")");

/// Identity resolved at start-up
#[derive(Debug, Clone, Default)]
struct Session {
    info: BotInfo,
    application_id: String,
}

/// Discord REST adapter
pub struct DiscordAdapter {
    token: String,
    api_base: String,
    client: Client,
    session: RwLock<Session>,
}

impl DiscordAdapter {
    pub fn new(token: impl Into<String>, config: &DiscordConfig) -> Self {
        Self {
            token: token.into(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client: Client::new(),
            session: RwLock::new(Session::default()),
        }
    }

    /// Get the API URL for a path
    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn application_id(&self) -> Result<String, BotError> {
        let session = self.session.read().map_err(|_| BotError::Internal("session lock poisoned".into()))?;
        if session.application_id.is_empty() {
            return Err(BotError::Internal("adapter not started".into()));
        }
        Ok(session.application_id.clone())
    }

    /// Send a request, waiting out one rate limit if Discord asks for it
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, BotError> {
        let url = self.api_url(path);

        for attempt in 0..2 {
            let mut builder = self
                .client
                .request(method.clone(), &url)
                .header("Authorization", format!("Bot {}", self.token))
                .header("User-Agent", USER_AGENT);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| BotError::Network(e.to_string()))?;

            match response.status() {
                StatusCode::NO_CONTENT => return Ok(Value::Null),
                StatusCode::UNAUTHORIZED => {
                    return Err(BotError::Auth("Discord rejected the bot token".to_string()));
                }
                StatusCode::TOO_MANY_REQUESTS if attempt == 0 => {
                    let wait = response
                        .json::<RateLimited>()
                        .await
                        .map(|r| r.retry_after)
                        .unwrap_or(1.0);
                    tracing::warn!("Rate limited on {} {}, retrying in {:.2}s", method, path, wait);
                    tokio::time::sleep(Duration::from_secs_f64(wait.clamp(0.0, 60.0))).await;
                }
                status if status.is_success() => {
                    return response.json().await.map_err(|e| BotError::Parse(e.to_string()));
                }
                status => {
                    let error = response.text().await.unwrap_or_default();
                    return Err(BotError::Network(format!("Discord API error {} on {}: {}", status, path, error)));
                }
            }
        }

        Err(BotError::Network(format!("Rate limited on {}", path)))
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, BotError> {
        let value = self.request(method, path, body).await?;
        serde_json::from_value(value).map_err(|e| BotError::Parse(e.to_string()))
    }

    /// Fetch bot user and application id
    pub async fn fetch_bot_info(&self) -> Result<BotInfo, BotError> {
        let user: RawUser = self.request_as(Method::GET, "users/@me", None).await?;
        let application: Application = self.request_as(Method::GET, "oauth2/applications/@me", None).await?;

        let info = BotInfo {
            id: user.id.clone(),
            name: user.global_name.clone().unwrap_or_else(|| user.username.clone()),
            username: user.username,
        };
        let mut session = self
            .session
            .write()
            .map_err(|_| BotError::Internal("session lock poisoned".into()))?;
        *session = Session {
            info: info.clone(),
            application_id: application.id,
        };
        Ok(info)
    }
}

#[async_trait]
impl Bot for DiscordAdapter {
    async fn start(&self) -> Result<(), BotError> {
        let info = self.fetch_bot_info().await?;
        tracing::info!("Authenticated as {} ({})", info.username, info.id);
        Ok(())
    }

    async fn register_commands(&self, commands: &[Command]) -> Result<usize, BotError> {
        let app_id = self.application_id()?;
        let body = Value::Array(commands.iter().map(models::command_json).collect());
        let synced: Vec<Value> = self
            .request_as(Method::PUT, &format!("applications/{}/commands", app_id), Some(&body))
            .await?;
        Ok(synced.len())
    }

    async fn respond(&self, interaction: &Interaction, reply: &Reply) -> Result<Option<u64>, BotError> {
        let body = models::interaction_response_json(reply);
        self.request(
            Method::POST,
            &format!("interactions/{}/{}/callback", interaction.id, interaction.token),
            Some(&body),
        )
        .await?;

        if reply.ephemeral {
            return Ok(None);
        }
        let app_id = self.application_id()?;
        let original: MessageId = self
            .request_as(
                Method::GET,
                &format!("webhooks/{}/{}/messages/@original", app_id, interaction.token),
                None,
            )
            .await?;
        Ok(original.value())
    }

    async fn edit_response(&self, interaction: &Interaction, content: &str) -> Result<(), BotError> {
        let app_id = self.application_id()?;
        let body = serde_json::json!({ "content": content });
        self.request(
            Method::PATCH,
            &format!("webhooks/{}/{}/messages/@original", app_id, interaction.token),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn send_message(&self, channel_id: u64, reply: &Reply) -> Result<u64, BotError> {
        let body = models::message_json(reply);
        let message: MessageId = self
            .request_as(Method::POST, &format!("channels/{}/messages", channel_id), Some(&body))
            .await?;
        message
            .value()
            .ok_or_else(|| BotError::Parse(format!("bad message id {:?}", message.id)))
    }

    async fn edit_embed(&self, channel_id: u64, message_id: u64, embed: &Embed) -> Result<(), BotError> {
        let body = serde_json::json!({ "embeds": [models::embed_json(embed)] });
        self.request(
            Method::PATCH,
            &format!("channels/{}/messages/{}", channel_id, message_id),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.session
            .read()
            .map(|s| s.info.clone())
            .unwrap_or_default()
    }
}
