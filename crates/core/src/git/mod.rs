//! Version-control access for vault-sync.
//!
//! The engine talks to git only through the [`VersionControl`] port;
//! [`GitCli`] implements it by shelling out to the `git` binary.

pub mod client;
pub mod port;

pub use client::GitCli;
pub use port::VersionControl;
