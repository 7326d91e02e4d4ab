//! Discord wire types

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::domain::entities::{
    Command, Embed, Interaction, InteractionKind, OptionKind, OptionValue, Reply, User,
};

/// Gateway opcodes
pub mod op {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RESUME: u8 = 6;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// GUILDS intent; slash commands and buttons need nothing more
pub const INTENTS: u64 = 1;

const ADMINISTRATOR: u64 = 1 << 3;
const EPHEMERAL: u64 = 1 << 6;
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    pub s: Option<u64>,
    pub t: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub session_id: String,
    pub resume_gateway_url: String,
    pub user: RawUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub id: String,
    pub username: String,
    pub global_name: Option<String>,
}

impl RawUser {
    pub fn to_user(&self) -> Option<User> {
        let mut user = User::new(self.id.parse().ok()?).with_username(self.username.clone());
        user.global_name = self.global_name.clone();
        Some(user)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMember {
    pub user: Option<RawUser>,
    pub permissions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOption {
    pub name: String,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawInteractionData {
    pub name: Option<String>,
    pub custom_id: Option<String>,
    #[serde(default)]
    pub options: Vec<RawOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessageRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawInteraction {
    pub id: String,
    pub token: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub channel_id: Option<String>,
    pub data: Option<RawInteractionData>,
    pub member: Option<RawMember>,
    pub user: Option<RawUser>,
    pub message: Option<RawMessageRef>,
}

impl RawInteraction {
    /// Slash commands (type 2) and button presses (type 3); anything else
    /// yields `None`
    pub fn into_interaction(self) -> Option<Interaction> {
        let data = self.data?;
        let kind = match self.kind {
            2 => InteractionKind::Command {
                name: data.name?,
                options: data
                    .options
                    .into_iter()
                    .filter_map(|o| {
                        let value = match o.value? {
                            Value::Number(n) => OptionValue::Integer(n.as_i64()?),
                            Value::String(s) => OptionValue::String(s),
                            other => OptionValue::String(other.to_string()),
                        };
                        Some((o.name, value))
                    })
                    .collect::<HashMap<_, _>>(),
            },
            3 => InteractionKind::Button {
                custom_id: data.custom_id?,
            },
            _ => return None,
        };

        let is_admin = self
            .member
            .as_ref()
            .and_then(|m| m.permissions.as_deref())
            .and_then(|p| p.parse::<u64>().ok())
            .map(|p| p & ADMINISTRATOR != 0)
            .unwrap_or(false);
        let user = self
            .member
            .and_then(|m| m.user)
            .or(self.user)?
            .to_user()?;

        Some(Interaction {
            id: self.id,
            token: self.token,
            channel_id: self.channel_id?.parse().ok()?,
            message_id: self.message.and_then(|m| m.id.parse().ok()),
            user,
            is_admin,
            kind,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageId {
    pub id: String,
}

impl MessageId {
    pub fn value(&self) -> Option<u64> {
        self.id.parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Application {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimited {
    pub retry_after: f64,
}

#[derive(Debug, Clone, Serialize)]
struct EmbedFooter<'a> {
    text: &'a str,
}

pub fn embed_json(embed: &Embed) -> Value {
    let mut value = json!({
        "title": embed.title,
        "color": embed.color.value(),
        "fields": embed.fields,
    });
    if let Some(description) = &embed.description {
        value["description"] = json!(description);
    }
    if let Some(footer) = &embed.footer {
        value["footer"] = json!(EmbedFooter { text: footer });
    }
    value
}

/// Message body shared by channel messages and interaction responses
pub fn message_json(reply: &Reply) -> Value {
    let parse = if reply.mention_everyone {
        vec!["everyone", "users"]
    } else {
        vec!["users"]
    };
    let mut value = json!({ "allowed_mentions": { "parse": parse } });
    if let Some(content) = &reply.content {
        value["content"] = json!(content);
    }
    if let Some(embed) = &reply.embed {
        value["embeds"] = json!([embed_json(embed)]);
    }
    if !reply.buttons.is_empty() {
        let buttons: Vec<Value> = reply
            .buttons
            .iter()
            .map(|b| {
                let mut button = json!({
                    "type": 2,
                    "style": 1,
                    "label": b.label,
                    "custom_id": b.custom_id,
                });
                if let Some(emoji) = &b.emoji {
                    button["emoji"] = json!({ "name": emoji });
                }
                button
            })
            .collect();
        value["components"] = json!([{ "type": 1, "components": buttons }]);
    }
    if reply.ephemeral {
        value["flags"] = json!(EPHEMERAL);
    }
    value
}

pub fn interaction_response_json(reply: &Reply) -> Value {
    json!({
        "type": CHANNEL_MESSAGE_WITH_SOURCE,
        "data": message_json(reply),
    })
}

pub fn command_json(command: &Command) -> Value {
    let options: Vec<Value> = command
        .options
        .iter()
        .map(|o| {
            json!({
                "type": match o.kind {
                    OptionKind::String => 3,
                    OptionKind::Integer => 4,
                },
                "name": o.name,
                "description": o.description,
                "required": o.required,
            })
        })
        .collect();

    let mut value = json!({
        "type": 1,
        "name": command.name,
        "description": command.description,
        "options": options,
    });
    if command.admin_only {
        value["default_member_permissions"] = json!(ADMINISTRATOR.to_string());
    }
    value
}
