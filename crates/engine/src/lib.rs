//! vault-sync engine library.
//!
//! One run stages and commits local changes, rebases onto the remote while
//! resolving conflicts by path rules, and pushes the result. Used by the
//! `vault-sync` binary and by tests that drive the engine against a fake
//! version-control port.

pub mod commit_stage;
pub mod engine;
pub mod preflight;
pub mod pull_stage;
pub mod push_stage;

pub use engine::{SyncEngine, SyncState};
