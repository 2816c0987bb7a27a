//! Conflict classification and deterministic resolution.
//!
//! - [`classifier`] maps a conflicted path to a [`ConflictRule`].
//! - [`resolver`] applies the rule through the version-control port.

pub mod classifier;
pub mod resolver;

pub use classifier::{ConflictClassifier, ConflictRule};
pub use resolver::{ConflictResolver, ResolveReport};
