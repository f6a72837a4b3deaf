//! Storage layer tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Board;
use crate::db::SqliteDatabase;
use crate::models::GameDetails;
use crate::engine::{Agent, AgentId, Database, DatabaseError, Decision, Game, Move};
use crate::types::{Side, State, User};

async fn test_db() -> SqliteDatabase {
    SqliteDatabase::open_in_memory().await.unwrap()
}

struct Named {
    id: AgentId,
    user: User,
}

#[async_trait]
impl Agent for Named {
    fn id(&self) -> AgentId {
        self.id
    }

    async fn user(&self) -> User {
        self.user.clone()
    }

    async fn request(&self, _game: &Game) -> Decision {
        Decision::Resign
    }
}

fn agent(id: AgentId, user: User) -> Arc<dyn Agent> {
    Arc::new(Named { id, user })
}

async fn registered(db: &SqliteDatabase, token: &str, name: &str) -> User {
    let mut user = User {
        name: name.to_string(),
        token: token.to_string(),
        ..User::default()
    };
    db.save_user(&mut user).await.unwrap();
    user
}

// === User tests ===

#[tokio::test]
async fn save_and_find_user_by_token() {
    let db = test_db().await;
    let user = registered(&db, "t0k3n", "alice").await;
    assert!(user.id > 0);

    let found = db.user_by_token("t0k3n").await.unwrap().unwrap();
    assert_eq!(found, user);
    assert!(db.user_by_token("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn update_user_metadata() {
    let db = test_db().await;
    let mut user = registered(&db, "t0k3n", "alice").await;

    user.author = "Alice and Bob".to_string();
    user.description = "minimax, depth 6".to_string();
    db.save_user(&mut user).await.unwrap();

    let row = db.query_user(user.id).await.unwrap();
    assert_eq!(row.author, "Alice and Bob");
    assert_eq!(row.description, "minimax, depth 6");
    assert_eq!(db.query_user_token("t0k3n").await.unwrap().id, user.id as i64);
}

#[tokio::test]
async fn anonymous_user_is_never_stored() {
    let db = test_db().await;
    let mut user = User::anonymous();
    assert!(db.save_user(&mut user).await.is_err());
    assert!(db.query_users(0, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_token_is_rejected() {
    let db = test_db().await;
    registered(&db, "same", "alice").await;
    let mut other = User {
        name: "bob".to_string(),
        token: "same".to_string(),
        ..User::default()
    };
    assert!(matches!(db.save_user(&mut other).await, Err(DatabaseError::Query(_))));
}

#[tokio::test]
async fn query_users_pages() {
    let db = test_db().await;
    for i in 0..5 {
        registered(&db, &format!("token-{i}"), &format!("user-{i}")).await;
    }
    let first = db.query_users(0, 2).await.unwrap();
    let last = db.query_users(2, 2).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].name, "user-0");
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].name, "user-4");
}

#[tokio::test]
async fn missing_user_is_not_found() {
    let db = test_db().await;
    assert!(matches!(db.query_user(7).await, Err(DatabaseError::NotFound(_))));
    assert!(matches!(db.query_user_token("x").await, Err(DatabaseError::NotFound(_))));
}

// === Game tests ===

#[tokio::test]
async fn save_game_inserts_then_updates() {
    let db = test_db().await;
    let alice = registered(&db, "a", "alice").await;
    let mut game = Game::new(Board::new(4, 3), agent(1, alice.clone()), agent(2, User::anonymous()));

    db.save_game(&mut game).await.unwrap();
    assert!(game.id > 0);
    let id = game.id;

    assert!(game.apply(0));
    let mut mv = Move::new(1, Side::South, 0, "[auto-move]");
    mv.game = game.id;
    mv.state = Some(game.board.clone());
    db.save_move(&mv).await.unwrap();

    game.state = State::NorthResigned;
    db.save_game(&mut game).await.unwrap();
    assert_eq!(game.id, id);

    let details = db.query_game(id).await.unwrap();
    assert_eq!(details.game.south, Some(alice.id as i64));
    assert_eq!(details.game.north, None);
    assert_eq!(details.game.size, 4);
    assert_eq!(details.game.state(), Some(State::NorthResigned));
    assert_eq!(details.game.board().unwrap(), game.board);
    assert_eq!(details.moves.len(), 1);
    assert_eq!(details.moves[0].comment, "[auto-move]");
    assert_eq!(details.moves[0].state, game.board.to_string());
}

#[tokio::test]
async fn move_for_unknown_game_fails() {
    let db = test_db().await;
    let mut mv = Move::new(1, Side::North, 2, "");
    mv.game = 99;
    assert!(db.save_move(&mv).await.is_err());
}

#[tokio::test]
async fn updating_unknown_game_is_not_found() {
    let db = test_db().await;
    let mut game = Game::new(
        Board::new(3, 3),
        agent(1, User::anonymous()),
        agent(2, User::anonymous()),
    );
    game.id = 42;
    assert!(matches!(db.save_game(&mut game).await, Err(DatabaseError::NotFound(_))));
}

#[tokio::test]
async fn query_games_newest_first_and_by_user() {
    let db = test_db().await;
    let alice = registered(&db, "a", "alice").await;
    let bob = registered(&db, "b", "bob").await;

    let pairs = [(alice.clone(), bob.clone()), (bob.clone(), User::anonymous()), (alice.clone(), bob)];
    let mut ids = Vec::new();
    for (south, north) in pairs {
        let mut game = Game::new(Board::new(3, 3), agent(1, south), agent(2, north));
        db.save_game(&mut game).await.unwrap();
        ids.push(game.id as i64);
    }

    let all = db.query_games(None, 0, 10).await.unwrap();
    assert_eq!(all.iter().map(|g| g.id).collect::<Vec<_>>(), vec![ids[2], ids[1], ids[0]]);

    let alices = db.query_games(Some(alice.id), 0, 10).await.unwrap();
    assert_eq!(alices.iter().map(|g| g.id).collect::<Vec<_>>(), vec![ids[2], ids[0]]);

    let second_page = db.query_games(None, 1, 2).await.unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, ids[0]);
}

#[tokio::test]
async fn game_details_export_as_json() {
    let db = test_db().await;
    let mut game = Game::new(
        Board::new(3, 1),
        agent(1, User::anonymous()),
        agent(2, User::anonymous()),
    );
    db.save_game(&mut game).await.unwrap();

    let details = db.query_game(game.id).await.unwrap();
    let json = serde_json::to_value(&details).unwrap();
    assert_eq!(json["game"]["state"], "ongoing");
    assert_eq!(json["game"]["board"], "<3,0,0,1,1,1,1,1,1>");
    assert!(json["game"]["south"].is_null());
    assert_eq!(json["moves"], serde_json::json!([]));

    let back: GameDetails = serde_json::from_value(json).unwrap();
    assert_eq!(back, details);
}
