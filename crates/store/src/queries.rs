//! Database queries.

use async_trait::async_trait;
use tracing::debug;

use crate::db::{query_error, unix_timestamp, SqliteDatabase};
use crate::engine::{Database, DatabaseError, Game, Move};
use crate::models::{GameDetails, GameRecord, MoveRecord, UserRecord};
use crate::types::User;

fn user_ref(user: &User) -> Option<i64> {
    (user.id > 0).then_some(user.id as i64)
}

fn offset(page: u32, per_page: u32) -> i64 {
    i64::from(page) * i64::from(per_page)
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn save_game(&self, game: &mut Game) -> Result<(), DatabaseError> {
        let now = unix_timestamp();
        let board = game.board.to_string();

        if game.id == 0 {
            let south = user_ref(&game.south.user().await);
            let north = user_ref(&game.north.user().await);

            let result = sqlx::query(
                "INSERT INTO games (south, north, size, board, state, started_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(south)
            .bind(north)
            .bind(game.board.size() as i64)
            .bind(board)
            .bind(game.state.as_str())
            .bind(now)
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(query_error)?;

            game.id = result.last_insert_rowid() as u64;
            debug!(game = game.id, "Game created");
            return Ok(());
        }

        let result = sqlx::query("UPDATE games SET board = ?, state = ?, updated_at = ? WHERE id = ?")
            .bind(board)
            .bind(game.state.as_str())
            .bind(now)
            .bind(game.id as i64)
            .execute(self.pool())
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Game {}", game.id)));
        }
        Ok(())
    }

    async fn save_move(&self, mv: &Move) -> Result<(), DatabaseError> {
        let state = mv.state.as_ref().map(ToString::to_string).unwrap_or_default();

        sqlx::query("INSERT INTO moves (game, side, choice, comment, state, played_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(mv.game as i64)
            .bind(mv.side.as_str())
            .bind(mv.choice as i64)
            .bind(mv.comment.as_str())
            .bind(state)
            .bind(unix_timestamp())
            .execute(self.pool())
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn user_by_token(&self, token: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE token = ?")
            .bind(token)
            .fetch_optional(self.pool())
            .await
            .map_err(query_error)?;
        Ok(row.map(User::from))
    }

    async fn save_user(&self, user: &mut User) -> Result<(), DatabaseError> {
        if user.is_anonymous() {
            return Err(DatabaseError::Query("anonymous users are not stored".to_string()));
        }
        let now = unix_timestamp();

        if user.id == 0 {
            let result = sqlx::query(
                "INSERT INTO users (token, name, author, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(user.token.as_str())
            .bind(user.name.as_str())
            .bind(user.author.as_str())
            .bind(user.description.as_str())
            .bind(now)
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(query_error)?;

            user.id = result.last_insert_rowid() as u64;
            debug!(user = user.id, "User created");
            return Ok(());
        }

        let result =
            sqlx::query("UPDATE users SET name = ?, author = ?, description = ?, updated_at = ? WHERE id = ?")
                .bind(user.name.as_str())
                .bind(user.author.as_str())
                .bind(user.description.as_str())
                .bind(now)
                .bind(user.id as i64)
                .execute(self.pool())
                .await
                .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User {}", user.id)));
        }
        Ok(())
    }
}

impl SqliteDatabase {
    // =========================================================================
    // Game queries
    // =========================================================================

    /// A game and all of its moves in playing order.
    pub async fn query_game(&self, id: u64) -> Result<GameDetails, DatabaseError> {
        let game = sqlx::query_as::<_, GameRecord>("SELECT * FROM games WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(self.pool())
            .await
            .map_err(query_error)?
            .ok_or_else(|| DatabaseError::NotFound(format!("Game {id}")))?;

        let moves = sqlx::query_as::<_, MoveRecord>("SELECT * FROM moves WHERE game = ? ORDER BY id")
            .bind(id as i64)
            .fetch_all(self.pool())
            .await
            .map_err(query_error)?;

        Ok(GameDetails { game, moves })
    }

    /// One page of games, newest first, optionally only those `user` took part in.
    ///
    /// `page` counts from 0.
    pub async fn query_games(
        &self,
        user: Option<u64>,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<GameRecord>, DatabaseError> {
        let user = user.map(|id| id as i64);
        sqlx::query_as::<_, GameRecord>(
            "SELECT * FROM games WHERE (? IS NULL OR south = ? OR north = ?) ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .bind(user)
        .bind(user)
        .bind(user)
        .bind(i64::from(per_page))
        .bind(offset(page, per_page))
        .fetch_all(self.pool())
        .await
        .map_err(query_error)
    }

    // =========================================================================
    // User queries
    // =========================================================================

    pub async fn query_user(&self, id: u64) -> Result<UserRecord, DatabaseError> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(self.pool())
            .await
            .map_err(query_error)?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    /// One page of users in registration order. `page` counts from 0.
    pub async fn query_users(&self, page: u32, per_page: u32) -> Result<Vec<UserRecord>, DatabaseError> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users ORDER BY id LIMIT ? OFFSET ?")
            .bind(i64::from(per_page))
            .bind(offset(page, per_page))
            .fetch_all(self.pool())
            .await
            .map_err(query_error)
    }

    pub async fn query_user_token(&self, token: &str) -> Result<UserRecord, DatabaseError> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE token = ?")
            .bind(token)
            .fetch_optional(self.pool())
            .await
            .map_err(query_error)?
            .ok_or_else(|| DatabaseError::NotFound("User with token".to_string()))
    }
}
