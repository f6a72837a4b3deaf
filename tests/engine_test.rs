use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kgp_server::core::Board;
use kgp_server::engine::{
    play, Agent, AgentId, Database, DatabaseError, Decision, Game, Move, PlayError,
};
use kgp_server::types::{Side, State, User};

/// Plays a fixed list of pits, then resigns.
struct Scripted {
    id: AgentId,
    pits: Mutex<VecDeque<usize>>,
    asked: AtomicUsize,
}

impl Scripted {
    fn new(id: AgentId, pits: &[usize]) -> Arc<Self> {
        Arc::new(Self {
            id,
            pits: Mutex::new(pits.iter().copied().collect()),
            asked: AtomicUsize::new(0),
        })
    }

    fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for Scripted {
    fn id(&self) -> AgentId {
        self.id
    }

    async fn user(&self) -> User {
        User::anonymous()
    }

    async fn request(&self, game: &Game) -> Decision {
        self.asked.fetch_add(1, Ordering::SeqCst);
        let side = game.side_of(self.id).expect("agent plays in this game");
        match self.pits.lock().await.pop_front() {
            Some(pit) => Decision::Play(Move::new(self.id, side, pit, "")),
            None => Decision::Resign,
        }
    }
}

/// Records saves and fails on demand.
#[derive(Default)]
struct Ledger {
    fail_start: bool,
    fail_finish: bool,
    fail_moves: bool,
    games: Mutex<Vec<State>>,
    moves: Mutex<Vec<Move>>,
}

#[async_trait]
impl Database for Ledger {
    async fn save_game(&self, game: &mut Game) -> Result<(), DatabaseError> {
        let first = game.id == 0;
        if (first && self.fail_start) || (!first && self.fail_finish) {
            return Err(DatabaseError::Connection("disk on fire".to_string()));
        }
        game.id = 7;
        self.games.lock().await.push(game.state);
        Ok(())
    }

    async fn save_move(&self, mv: &Move) -> Result<(), DatabaseError> {
        if self.fail_moves {
            return Err(DatabaseError::Query("moves table locked".to_string()));
        }
        self.moves.lock().await.push(mv.clone());
        Ok(())
    }

    async fn user_by_token(&self, _token: &str) -> Result<Option<User>, DatabaseError> {
        Ok(None)
    }

    async fn save_user(&self, _user: &mut User) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[tokio::test]
async fn single_legal_choice_is_played_without_asking() {
    let south = Scripted::new(1, &[]);
    let north = Scripted::new(2, &[]);
    // South's single pit empties its row.
    let board = Board::from_parts(0, 0, vec![0, 0, 2], vec![1, 0, 0]).unwrap();
    let mut game = Game::new(board, south.clone(), north.clone());
    let db = Ledger::default();

    play(&mut game, &db).await.unwrap();

    assert_eq!(south.asked(), 0);
    assert_eq!(north.asked(), 0);
    assert!(!game.moves.is_empty());
    assert!(game.moves.iter().all(|m| m.comment == "[auto-move]"));
    assert!(game.state.is_terminal());
}

#[tokio::test]
async fn illegal_choice_resigns_and_leaves_board_alone() {
    // Pit 5 is empty on South's opening board below.
    let board = Board::from_parts(0, 0, vec![3, 3, 3, 3, 3, 0], vec![3; 6]).unwrap();
    let south = Scripted::new(1, &[5]);
    let north = Scripted::new(2, &[0]);
    let mut game = Game::new(board.clone(), south.clone(), north.clone());
    let db = Ledger::default();

    play(&mut game, &db).await.unwrap();

    assert_eq!(game.state, State::SouthResigned);
    assert_eq!(game.board, board);
    assert_eq!(north.asked(), 0);
    assert!(db.moves.lock().await.is_empty());
    assert_eq!(*db.games.lock().await, vec![State::Ongoing, State::SouthResigned]);
}

#[tokio::test]
async fn out_of_range_choice_is_illegal_too() {
    let south = Scripted::new(1, &[usize::MAX]);
    let north = Scripted::new(2, &[]);
    let mut game = Game::new(Board::new(7, 7), south, north);

    play(&mut game, &Ledger::default()).await.unwrap();
    assert_eq!(game.state, State::SouthResigned);
}

#[tokio::test]
async fn extra_turn_keeps_the_same_side_on_move() {
    // 3 seeds from pit 0 of a 3-pit board end in South's store.
    let south = Scripted::new(1, &[0, 1]);
    let north = Scripted::new(2, &[]);
    let mut game = Game::new(Board::new(3, 3), south.clone(), north.clone());

    play(&mut game, &Ledger::default()).await.unwrap();

    assert_eq!(south.asked(), 2);
    assert_eq!(north.asked(), 1);
    assert_eq!(game.moves.len(), 2);
    assert!(game.moves.iter().all(|m| m.side == Side::South));
    assert_eq!(game.state, State::NorthResigned);
}

#[tokio::test]
async fn move_save_failure_does_not_stop_the_game() {
    let south = Scripted::new(1, &[1]);
    let north = Scripted::new(2, &[]);
    let mut game = Game::new(Board::new(3, 3), south, north);
    let db = Ledger {
        fail_moves: true,
        ..Ledger::default()
    };

    play(&mut game, &db).await.unwrap();

    assert_eq!(game.moves.len(), 1);
    assert_eq!(game.moves[0].game, 7);
    assert_eq!(game.moves[0].state.as_ref(), Some(&game.board));
    assert_eq!(game.state, State::NorthResigned);
    assert_eq!(*db.games.lock().await, vec![State::Ongoing, State::NorthResigned]);
}

#[tokio::test]
async fn failed_start_aborts_before_any_request() {
    let south = Scripted::new(1, &[0]);
    let north = Scripted::new(2, &[0]);
    let mut game = Game::new(Board::new(7, 7), south.clone(), north);
    let db = Ledger {
        fail_start: true,
        ..Ledger::default()
    };

    let err = play(&mut game, &db).await.unwrap_err();
    assert!(matches!(err, PlayError::Start(DatabaseError::Connection(_))));
    assert_eq!(south.asked(), 0);
}

#[tokio::test]
async fn failed_final_save_is_an_error() {
    let south = Scripted::new(1, &[]);
    let north = Scripted::new(2, &[]);
    let mut game = Game::new(Board::new(7, 7), south, north);
    let db = Ledger {
        fail_finish: true,
        ..Ledger::default()
    };

    let err = play(&mut game, &db).await.unwrap_err();
    assert!(matches!(err, PlayError::Finish(_)));
    assert_eq!(game.state, State::SouthResigned);
}

#[tokio::test]
async fn natural_end_goes_to_the_larger_store() {
    // South's only seed reaches the store and empties its row.
    let board = Board::from_parts(10, 4, vec![0, 0, 1], vec![1, 1, 1]).unwrap();
    let mut game = Game::new(board, Scripted::new(1, &[]), Scripted::new(2, &[]));
    play(&mut game, &Ledger::default()).await.unwrap();
    assert_eq!(game.state, State::SouthWon);

    let board = Board::from_parts(4, 10, vec![0, 0, 1], vec![1, 1, 1]).unwrap();
    let mut game = Game::new(board, Scripted::new(1, &[]), Scripted::new(2, &[]));
    play(&mut game, &Ledger::default()).await.unwrap();
    assert_eq!(game.state, State::NorthWon);

    let board = Board::from_parts(5, 4, vec![0, 0, 1], vec![1, 1, 0]).unwrap();
    let mut game = Game::new(board, Scripted::new(1, &[]), Scripted::new(2, &[]));
    play(&mut game, &Ledger::default()).await.unwrap();
    assert_eq!(game.state, State::Undecided);
}
