//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Draw snapshots on disk
//! - Environment: Runtime identity and data directory checks
//! - Adapters: Platform integrations (Discord, console)

pub mod config;
pub mod storage;
pub mod environment;
pub mod adapters;
