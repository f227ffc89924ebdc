//! Error types for the game simulation.
//!
//! Only the outer API (spawning, commands, configuration, persistence)
//! returns these. The per-tick update never fails; every degraded case is
//! handled by a fallback branch in the module concerned.

use thiserror::Error;

use crate::components::{EntityId, ObjectKind};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity exists but is not of the kind the operation needs.
    #[error("Entity {id} is not a {expected:?}")]
    WrongKind {
        /// Entity that was addressed.
        id: EntityId,
        /// Kind the operation requires.
        expected: ObjectKind,
    },

    /// Rules file parsing error.
    #[error("Failed to parse rules '{path}': {message}")]
    ConfigParse {
        /// Path (or `<inline>`) of the rules that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// File system failure while reading rules or saves.
    #[error("I/O error: {0}")]
    Io(String),

    /// Save state could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
