//! Game module - one playthrough between two agents
//!
//! [`play`] drives a [`Game`] from `ongoing` to a terminal state:
//!
//! 1. The game is stored as `ongoing`; failing to store it aborts the game.
//! 2. While the board is not over, the side to move either has exactly one
//!    legal pit (applied without asking the agent) or is asked through
//!    [`Agent::request`].
//! 3. Resignations and illegal pits end the game as a resignation of the
//!    side to move. An extra turn keeps the same side on move.
//! 4. Otherwise the larger store wins, equal stores are `undecided`.
//! 5. The final state is stored; failing to store it is an error.
//!
//! Lost moves are only logged: move history is not worth a running game.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::agent::{Agent, AgentId, Decision};
use crate::core::Board;
use crate::db::{Database, DatabaseError};
use crate::types::{Outcome, Side, State};

/// One ply.
#[derive(Debug, Clone, PartialEq)]
pub struct Move {
    /// Agent that chose the pit.
    pub agent: AgentId,
    /// Side the move was made for.
    pub side: Side,
    /// 0-based pit on `side`.
    pub choice: usize,
    /// Annotation such as `[auto-move]` or `[random move]`.
    pub comment: String,
    /// Game the move belongs to, set when recorded.
    pub game: u64,
    /// Board after the move was applied, set when recorded.
    pub state: Option<Board>,
}

impl Move {
    pub fn new(agent: AgentId, side: Side, choice: usize, comment: impl Into<String>) -> Self {
        Self {
            agent,
            side,
            choice,
            comment: comment.into(),
            game: 0,
            state: None,
        }
    }
}

/// Errors that end a game abnormally.
#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("failed to save new game: {0}")]
    Start(#[source] DatabaseError),

    #[error("failed to save final game state: {0}")]
    Finish(#[source] DatabaseError),

    /// The board contract is broken; the game cannot continue.
    #[error("engine invariant violated: {0}")]
    Invariant(String),
}

/// Complete game state
pub struct Game {
    /// Storage id, 0 until the game was first saved.
    pub id: u64,
    pub board: Board,
    pub south: Arc<dyn Agent>,
    pub north: Arc<dyn Agent>,
    /// Side to move.
    pub current: Side,
    pub state: State,
    pub moves: Vec<Move>,
}

impl Game {
    /// Create an unsaved game with South to move.
    pub fn new(board: Board, south: Arc<dyn Agent>, north: Arc<dyn Agent>) -> Self {
        Self {
            id: 0,
            board,
            south,
            north,
            current: Side::South,
            state: State::Ongoing,
            moves: Vec::new(),
        }
    }

    /// The agent playing `side`.
    pub fn agent(&self, side: Side) -> &Arc<dyn Agent> {
        match side {
            Side::South => &self.south,
            Side::North => &self.north,
        }
    }

    /// The agent whose turn it is.
    pub fn active(&self) -> &Arc<dyn Agent> {
        self.agent(self.current)
    }

    /// Which side `agent` plays, if any.
    pub fn side_of(&self, agent: AgentId) -> Option<Side> {
        if self.south.id() == agent {
            Some(Side::South)
        } else if self.north.id() == agent {
            Some(Side::North)
        } else {
            None
        }
    }

    /// Apply `choice` for the side to move.
    ///
    /// Returns false, leaving the board untouched, if the pit is illegal.
    /// The turn passes to the other side unless the sowing granted an extra turn.
    pub fn apply(&mut self, choice: usize) -> bool {
        if !self.board.is_legal(self.current, choice) {
            return false;
        }
        let again = self.board.sow(self.current, choice);
        if !again {
            self.current = self.current.opposite();
        }
        true
    }

    /// Final state of a board that reached its natural end.
    fn classify(&self) -> State {
        match self.board.outcome(Side::South) {
            Outcome::Win => State::won(Side::South),
            Outcome::Loss => State::won(Side::North),
            Outcome::Draw => State::Undecided,
        }
    }
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("board", &self.board.to_string())
            .field("south", &self.south.id())
            .field("north", &self.north.id())
            .field("current", &self.current)
            .field("state", &self.state)
            .field("moves", &self.moves.len())
            .finish()
    }
}

/// Play `game` to completion.
pub async fn play(game: &mut Game, db: &dyn Database) -> Result<(), PlayError> {
    debug!(south = game.south.id(), north = game.north.id(), "Starting game");

    game.state = State::Ongoing;
    db.save_game(game).await.map_err(PlayError::Start)?;

    while !game.board.is_over() {
        let side = game.current;
        let agent = Arc::clone(game.active());

        let (count, last) = game.board.moves(side);
        debug!(game = game.id, %side, count, "Side to move");

        let mut mv = match count {
            0 => {
                return Err(PlayError::Invariant(format!(
                    "{side} has no moves on {} although the game is not over",
                    game.board
                )))
            }
            1 => Move::new(agent.id(), side, last, "[auto-move]"),
            _ => match agent.request(game).await {
                Decision::Play(mv) => mv,
                Decision::Resign => {
                    debug!(game = game.id, %side, "Resigned");
                    game.state = State::resigned(side);
                    break;
                }
            },
        };

        if !game.apply(mv.choice) {
            debug!(game = game.id, %side, choice = mv.choice, "Illegal move");
            game.state = State::resigned(side);
            break;
        }
        debug!(game = game.id, %side, choice = mv.choice, comment = %mv.comment, "Move");

        mv.side = side;
        mv.game = game.id;
        mv.state = Some(game.board.clone());
        if let Err(e) = db.save_move(&mv).await {
            warn!(game = game.id, error = %e, "Failed to save move");
        }
        game.moves.push(mv);
    }

    if game.state == State::Ongoing {
        game.state = game.classify();
    }

    db.save_game(game).await.map_err(PlayError::Finish)?;
    debug!(game = game.id, state = %game.state, "Game finished");
    Ok(())
}
