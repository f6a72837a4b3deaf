//! Storage module - SQLite persistence for games, moves and users
//!
//! [`SqliteDatabase`] implements the engine's [`Database`](kgp_engine::Database)
//! collaborator and adds the paged query side used by presentation layers
//! (`query_game`, `query_games`, `query_user`, `query_users`,
//! `query_user_token`).
//!
//! Schema migrations are embedded and run on open.

pub mod db;
pub mod models;
pub mod queries;

#[cfg(test)]
mod tests;

pub use kgp_core as core;
pub use kgp_engine as engine;
pub use kgp_types as types;

pub use db::{unix_timestamp, SqliteDatabase};
pub use models::{GameDetails, GameRecord, MoveRecord, UserRecord};
