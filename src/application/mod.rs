//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: draw bookkeeping, command handling, rendering, scheduling
//! - Errors: Domain-specific errors
//! - Messaging: Event dispatching and console input parsing

pub mod errors;
pub mod services;
pub mod messaging;

#[cfg(test)]
pub(crate) mod testing;
