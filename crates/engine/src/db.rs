//! Persistence collaborator used by the engine and the client sessions.

use async_trait::async_trait;

use crate::game::{Game, Move};
use crate::types::User;

/// Database errors surfaced to the engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Sink for games, moves and users.
#[async_trait]
pub trait Database: Send + Sync {
    /// Insert the game on first call (assigning `game.id`), update its state afterwards.
    async fn save_game(&self, game: &mut Game) -> Result<(), DatabaseError>;

    /// Record one applied move.
    async fn save_move(&self, mv: &Move) -> Result<(), DatabaseError>;

    /// Look up a user by authentication token.
    async fn user_by_token(&self, token: &str) -> Result<Option<User>, DatabaseError>;

    /// Insert the user (assigning `user.id`) or update its editable metadata.
    async fn save_user(&self, user: &mut User) -> Result<(), DatabaseError>;
}
