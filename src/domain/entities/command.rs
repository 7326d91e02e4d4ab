use std::collections::BTreeMap;

/// Kind of a slash command option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Integer,
}

/// A declared slash command option
#[derive(Debug, Clone)]
pub struct CommandOption {
    pub name: String,
    pub description: String,
    pub kind: OptionKind,
    pub required: bool,
}

/// Represents a bot command
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOption>,
    /// Hidden from members without the administrator permission
    pub admin_only: bool,
}

impl Command {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
            admin_only: false,
        }
    }

    pub fn with_option(
        mut self,
        name: impl Into<String>,
        kind: OptionKind,
        required: bool,
        description: impl Into<String>,
    ) -> Self {
        self.options.push(CommandOption {
            name: name.into(),
            description: description.into(),
            kind,
            required,
        });
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }

    pub fn matches(&self, input: &str) -> bool {
        self.name.to_lowercase() == input.to_lowercase()
    }
}

/// Command registry for managing available commands
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) {
        self.commands.insert(command.name.clone(), command);
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn find(&self, input: &str) -> Option<&Command> {
        self.commands.values().find(|c| c.matches(input))
    }

    pub fn all(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
