//! Agent module - anything that can be asked for a move
//!
//! The only production agent is a network client session, but the game
//! engine and the scheduler only ever see this trait, so tests can drive
//! them with scripted agents.

use async_trait::async_trait;

use crate::game::{Game, Move};
use crate::types::User;

/// Process-wide identity of a connected agent.
pub type AgentId = u64;

/// Answer of an agent to a move request.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Play this move. It may still turn out to be illegal.
    Play(Move),
    /// Give up the game.
    Resign,
}

/// Capability of being asked for a move within bounded time.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier, unique among live agents.
    fn id(&self) -> AgentId;

    /// Identity recorded with games this agent plays.
    async fn user(&self) -> User;

    /// Cheap liveness check used by the scheduler before pairing.
    fn is_alive(&self) -> bool {
        true
    }

    /// Ask for a move for the side this agent plays in `game`.
    async fn request(&self, game: &Game) -> Decision;

    /// Called once after `game` reached its final state.
    async fn conclude(&self, _game: &Game) {}
}
