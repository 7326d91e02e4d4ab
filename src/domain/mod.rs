//! Domain layer - Core business logic
//!
//! This layer contains:
//! - Entities: Core business objects (LuckyDraw, DrawLedger, Interaction, Embed)
//! - Traits: Abstractions for infrastructure (Bot, Store)

pub mod entities;
pub mod traits;
