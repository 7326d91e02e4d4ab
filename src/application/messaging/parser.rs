//! Message parser - Turns console input into interactions
//!
//! Syntax:
//! - `/抽獎 Steam 30 2`: options fill in declaration order
//! - `/抽獎 prize=Steam minutes=30`: or by name
//! - `join 3`: press the join button of draw 3
//! - a leading `@42` acts as user 42

use crate::application::errors::CommandError;
use crate::application::services::render::join_custom_id;
use crate::domain::entities::{CommandRegistry, Interaction, OptionKind, OptionValue, User};

/// Parses console lines into structured interactions
pub struct MessageParser {
    command_prefix: String,
    channel_id: u64,
    default_user: User,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>, channel_id: u64, default_user: User) -> Self {
        Self {
            command_prefix: prefix.into(),
            channel_id,
            default_user,
        }
    }

    /// Parse a line; `Ok(None)` for blank input
    pub fn parse(&self, line: &str, registry: &CommandRegistry) -> Result<Option<Interaction>, CommandError> {
        let mut tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(None);
        }

        let user = match tokens[0].strip_prefix('@') {
            Some(id) => {
                let id: u64 = id
                    .parse()
                    .map_err(|_| CommandError::InvalidOption(format!("user {}", id)))?;
                tokens.remove(0);
                User::new(id).with_username(format!("user{}", id))
            }
            None => self.default_user.clone(),
        };
        let Some((&head, args)) = tokens.split_first() else {
            return Ok(None);
        };

        let name = head.strip_prefix(self.command_prefix.as_str()).unwrap_or(head);
        if name.eq_ignore_ascii_case("join") {
            let id: u64 = args
                .first()
                .ok_or_else(|| CommandError::MissingOption("draw_id".to_string()))?
                .parse()
                .map_err(|_| CommandError::InvalidOption("draw_id".to_string()))?;
            return Ok(Some(
                Interaction::button(self.channel_id, user, join_custom_id(id)).as_admin(),
            ));
        }

        let command = registry
            .find(name)
            .ok_or_else(|| CommandError::NotFound(name.to_string()))?;

        let mut interaction = Interaction::command(self.channel_id, user, command.name.clone()).as_admin();
        let mut positional = command.options.iter();
        for arg in args {
            let (option, raw) = match arg.split_once('=') {
                Some((key, value)) => {
                    let option = command
                        .options
                        .iter()
                        .find(|o| o.name == key)
                        .ok_or_else(|| CommandError::InvalidOption(key.to_string()))?;
                    (option, value)
                }
                None => {
                    let option = positional
                        .next()
                        .ok_or_else(|| CommandError::InvalidOption(arg.to_string()))?;
                    (option, *arg)
                }
            };
            let value = match (option.kind, raw.parse::<i64>()) {
                (OptionKind::Integer, Ok(v)) => OptionValue::Integer(v),
                _ => OptionValue::String(raw.to_string()),
            };
            interaction = interaction.with_option(option.name.clone(), value);
        }
        Ok(Some(interaction))
    }
}
