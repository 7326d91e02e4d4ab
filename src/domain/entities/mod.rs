//! Domain entities - Core business objects

pub mod user;
pub mod command;
pub mod interaction;
pub mod embed;
pub mod draw;
pub mod ledger;

pub use user::{User, UserId};
pub use command::{Command, CommandOption, CommandRegistry, OptionKind};
pub use interaction::{Interaction, InteractionKind, OptionValue};
pub use embed::{Button, Color, Embed, EmbedField, Reply};
pub use draw::{DrawId, DrawOutcome, JoinError, LuckyDraw};
pub use ledger::{DrawLedger, NewDraw};
