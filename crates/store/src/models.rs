//! Rows as stored.

use serde::{Deserialize, Serialize};

use crate::core::{Board, BoardParseError};
use crate::types::{State, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub token: String,
    pub name: String,
    pub author: String,
    pub description: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<UserRecord> for User {
    fn from(row: UserRecord) -> Self {
        User {
            id: row.id as u64,
            name: row.name,
            author: row.author,
            description: row.description,
            token: row.token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GameRecord {
    pub id: i64,
    /// None for anonymous agents.
    pub south: Option<i64>,
    pub north: Option<i64>,
    pub size: i64,
    /// Latest board, canonical form.
    pub board: String,
    pub state: String,
    pub started_at: i64,
    pub updated_at: i64,
}

impl GameRecord {
    pub fn state(&self) -> Option<State> {
        State::from_str(&self.state)
    }

    pub fn board(&self) -> Result<Board, BoardParseError> {
        self.board.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MoveRecord {
    pub id: i64,
    pub game: i64,
    pub side: String,
    /// 0-based pit.
    pub choice: i64,
    pub comment: String,
    /// Board after the move, canonical form.
    pub state: String,
    pub played_at: i64,
}

/// A game with its full move history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDetails {
    pub game: GameRecord,
    pub moves: Vec<MoveRecord>,
}
