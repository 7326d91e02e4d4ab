//! lucky-draw-bot - Discord giveaway bot
//!
//! Members join timed draws with a button; winners are picked when the
//! draw expires or an administrator ends it. Draws survive restarts in a
//! JSON snapshot under the data directory.

pub mod domain;
pub mod application;
pub mod infrastructure;
