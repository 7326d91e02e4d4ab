//! Platform-neutral rich message content

use serde::Serialize;

/// Embed accent colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Gold,
    Blue,
    Green,
    Purple,
}

impl Color {
    pub fn value(self) -> u32 {
        match self {
            Color::Gold => 0xF1C40F,
            Color::Blue => 0x3498DB,
            Color::Green => 0x2ECC71,
            Color::Purple => 0x9B59B6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Rich message card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: Option<String>,
    pub color: Color,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

impl Embed {
    pub fn new(title: impl Into<String>, color: Color) -> Self {
        Self {
            title: title.into(),
            description: None,
            color,
            fields: Vec::new(),
            footer: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Clickable button attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub custom_id: String,
    pub emoji: Option<String>,
}

impl Button {
    pub fn new(label: impl Into<String>, custom_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            custom_id: custom_id.into(),
            emoji: None,
        }
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }
}

/// An outgoing message: text, embed and buttons
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub buttons: Vec<Button>,
    /// Only visible to the invoking user
    pub ephemeral: bool,
    /// Allow `@everyone` to ping
    pub mention_everyone: bool,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Self::default()
        }
    }

    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }

    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn mentioning_everyone(mut self) -> Self {
        self.mention_everyone = true;
        self
    }
}
