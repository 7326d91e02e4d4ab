use std::fmt;

/// Platform user identifier (Discord snowflake)
pub type UserId = u64;

/// Represents a user in the system
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: UserId,
    pub username: Option<String>,
    pub global_name: Option<String>,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            username: None,
            global_name: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Account name, falling back to the display name and then the id
    pub fn display_name(&self) -> String {
        if let Some(ref username) = self.username {
            username.clone()
        } else if let Some(ref name) = self.global_name {
            name.clone()
        } else {
            self.id.to_string()
        }
    }

    /// Discord mention markup
    pub fn mention(&self) -> String {
        mention(self.id)
    }
}

pub fn mention(id: UserId) -> String {
    format!("<@{}>", id)
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
