use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use kgp_server::engine::{Agent, AgentId, Database, Decision, Game, Move, Scheduler, SchedulerConfig};
use kgp_server::store::SqliteDatabase;
use kgp_server::types::{State, User};

/// Always plays its leftmost legal pit and reports the result it was told.
struct Greedy {
    id: AgentId,
    user: User,
    done: mpsc::UnboundedSender<(AgentId, u64, State)>,
}

#[async_trait]
impl Agent for Greedy {
    fn id(&self) -> AgentId {
        self.id
    }

    async fn user(&self) -> User {
        self.user.clone()
    }

    async fn request(&self, game: &Game) -> Decision {
        let Some(side) = game.side_of(self.id) else {
            return Decision::Resign;
        };
        match game.board.legal_moves(side).next() {
            Some(pit) => Decision::Play(Move::new(self.id, side, pit, "greedy")),
            None => Decision::Resign,
        }
    }

    async fn conclude(&self, game: &Game) {
        let _ = self.done.send((self.id, game.id, game.state));
    }
}

async fn setup(config: SchedulerConfig) -> (Arc<SqliteDatabase>, Arc<Scheduler>) {
    let db = Arc::new(SqliteDatabase::open_in_memory().await.unwrap());
    let database: Arc<dyn Database> = db.clone();
    (db, Scheduler::new(config, database))
}

#[tokio::test]
async fn paired_agents_play_a_stored_game() {
    let (db, scheduler) = setup(SchedulerConfig { size: 4, stones: 3 }).await;
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let mut alice = User {
        name: "alice".to_string(),
        token: "alice-token".to_string(),
        ..User::default()
    };
    db.save_user(&mut alice).await.unwrap();

    scheduler
        .enqueue(Arc::new(Greedy {
            id: 1,
            user: alice.clone(),
            done: done_tx.clone(),
        }))
        .await;
    assert_eq!(scheduler.waiting().await, 1);
    scheduler
        .enqueue(Arc::new(Greedy {
            id: 2,
            user: User::anonymous(),
            done: done_tx,
        }))
        .await;
    assert_eq!(scheduler.waiting().await, 0);

    let mut concluded = Vec::new();
    for _ in 0..2 {
        let report = timeout(Duration::from_secs(2), done_rx.recv())
            .await
            .expect("game did not finish")
            .unwrap();
        concluded.push(report);
    }
    concluded.sort_by_key(|(agent, _, _)| *agent);

    let (_, game_id, state) = concluded[0];
    assert_eq!(concluded[1].1, game_id);
    assert_eq!(concluded[1].2, state);
    assert!(state.is_terminal());
    assert!(!matches!(state, State::SouthResigned | State::NorthResigned));

    assert!(!scheduler.is_playing(1).await);
    assert!(!scheduler.is_playing(2).await);

    let details = db.query_game(game_id).await.unwrap();
    assert_eq!(details.game.south, Some(alice.id as i64));
    assert_eq!(details.game.north, None);
    assert_eq!(details.game.size, 4);
    assert_eq!(details.game.state(), Some(state));
    assert!(!details.moves.is_empty());

    // The stored history replays to the stored final board.
    let last = details.moves.last().unwrap();
    assert_eq!(last.state, details.game.board);
    assert_eq!(details.game.board().unwrap().seeds(), 4 * 2 * 3);
}

#[tokio::test]
async fn odd_agent_keeps_waiting() {
    let (_db, scheduler) = setup(SchedulerConfig::default()).await;
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    for id in 1..=3 {
        scheduler
            .enqueue(Arc::new(Greedy {
                id,
                user: User::anonymous(),
                done: done_tx.clone(),
            }))
            .await;
    }
    assert!(scheduler.is_queued(3).await);

    for _ in 0..2 {
        timeout(Duration::from_secs(2), done_rx.recv())
            .await
            .expect("game did not finish")
            .unwrap();
    }
    assert!(scheduler.is_queued(3).await);
    assert_eq!(scheduler.waiting().await, 1);
}
