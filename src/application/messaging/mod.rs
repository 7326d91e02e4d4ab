//! Message handling - Event-driven interaction processing

pub mod dispatcher;
pub mod parser;

pub use dispatcher::{BotEvent, MessageDispatcher};
pub use parser::MessageParser;
