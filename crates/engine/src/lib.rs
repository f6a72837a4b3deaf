//! Game engine - turn loop, agents and matchmaking
//!
//! This crate connects the board rules in `kgp-core` with whatever produces
//! moves. It knows nothing about sockets: a move source is anything that
//! implements [`Agent`], and persistence is anything that implements
//! [`Database`].
//!
//! # Architecture
//!
//! ```text
//! Scheduler ──pairs──▶ Game ──request──▶ Agent (South / North)
//!                        │
//!                        └──save──▶ Database
//! ```
//!
//! - [`agent`]: the move capability and its result type
//! - [`db`]: the persistence contract used by the engine and sessions
//! - [`game`]: [`Game`], [`Move`] and the [`play`] state machine
//! - [`scheduler`]: FIFO matchmaking with one task per game

pub mod agent;
pub mod db;
pub mod game;
pub mod scheduler;

pub use kgp_core as core;
pub use kgp_types as types;

pub use agent::{Agent, AgentId, Decision};
pub use db::{Database, DatabaseError};
pub use game::{play, Game, Move, PlayError};
pub use scheduler::{Scheduler, SchedulerConfig};
