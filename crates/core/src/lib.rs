//! vault-sync core library.
//!
//! This crate provides the building blocks of the vault sync engine:
//! configuration, the version-control port and its git CLI implementation,
//! conflict classification and resolution, the bounded sync log, retry with
//! backoff, and commit message generation.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod git;
pub mod message;
pub mod models;
pub mod retry;
pub mod sync_log;

// Re-exports for convenience.
pub use config::VaultConfig;
pub use errors::SyncError;
pub use git::{GitCli, VersionControl};
pub use models::RunMode;
pub use sync_log::SyncLog;
