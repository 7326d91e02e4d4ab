use std::collections::HashMap;

use super::User;
use crate::application::errors::CommandError;

/// Value of a slash command option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Integer(i64),
    String(String),
}

/// What the user did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionKind {
    /// A slash command with its options
    Command {
        name: String,
        options: HashMap<String, OptionValue>,
    },
    /// A button press on a previously sent message
    Button { custom_id: String },
}

/// An incoming user interaction
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: String,
    /// Token used to answer this interaction
    pub token: String,
    pub channel_id: u64,
    /// Message the button belongs to
    pub message_id: Option<u64>,
    pub user: User,
    /// Invoker holds the administrator permission in this guild
    pub is_admin: bool,
    pub kind: InteractionKind,
}

impl Interaction {
    pub fn command(channel_id: u64, user: User, name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            token: String::new(),
            channel_id,
            message_id: None,
            user,
            is_admin: false,
            kind: InteractionKind::Command {
                name: name.into(),
                options: HashMap::new(),
            },
        }
    }

    pub fn button(channel_id: u64, user: User, custom_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            token: String::new(),
            channel_id,
            message_id: None,
            user,
            is_admin: false,
            kind: InteractionKind::Button {
                custom_id: custom_id.into(),
            },
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: OptionValue) -> Self {
        if let InteractionKind::Command { ref mut options, .. } = self.kind {
            options.insert(name.into(), value);
        }
        self
    }

    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn command_name(&self) -> Option<&str> {
        match &self.kind {
            InteractionKind::Command { name, .. } => Some(name),
            InteractionKind::Button { .. } => None,
        }
    }

    fn option(&self, name: &str) -> Option<&OptionValue> {
        match &self.kind {
            InteractionKind::Command { options, .. } => options.get(name),
            InteractionKind::Button { .. } => None,
        }
    }

    /// Integer option; string values are parsed
    pub fn int_option(&self, name: &str) -> Result<Option<i64>, CommandError> {
        match self.option(name) {
            None => Ok(None),
            Some(OptionValue::Integer(v)) => Ok(Some(*v)),
            Some(OptionValue::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| CommandError::InvalidOption(name.to_string())),
        }
    }

    pub fn required_int(&self, name: &str) -> Result<i64, CommandError> {
        self.int_option(name)?
            .ok_or_else(|| CommandError::MissingOption(name.to_string()))
    }

    pub fn string_option(&self, name: &str) -> Option<String> {
        match self.option(name)? {
            OptionValue::String(s) => Some(s.clone()),
            OptionValue::Integer(v) => Some(v.to_string()),
        }
    }

    pub fn required_string(&self, name: &str) -> Result<String, CommandError> {
        self.string_option(name)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CommandError::MissingOption(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_are_typed() {
        let i = Interaction::command(1, User::new(2), "抽獎")
            .with_option("prize", OptionValue::String("Steam".into()))
            .with_option("minutes", OptionValue::String("15".into()))
            .with_option("winners", OptionValue::Integer(3));

        assert_eq!(i.required_string("prize").unwrap(), "Steam");
        assert_eq!(i.required_int("minutes").unwrap(), 15);
        assert_eq!(i.int_option("winners").unwrap(), Some(3));
        assert_eq!(i.int_option("limit").unwrap(), None);
        assert_eq!(
            i.required_int("draw_id"),
            Err(CommandError::MissingOption("draw_id".into()))
        );
    }

    #[test]
    fn malformed_integer_is_rejected() {
        let i = Interaction::command(1, User::new(2), "抽獎")
            .with_option("minutes", OptionValue::String("soon".into()));
        assert_eq!(
            i.int_option("minutes"),
            Err(CommandError::InvalidOption("minutes".into()))
        );
    }
}
