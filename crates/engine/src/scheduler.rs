//! Scheduler - pairs waiting agents into games
//!
//! Agents enter the queue with [`Scheduler::enqueue`] and leave it either
//! when they are paired or through [`Scheduler::unschedule`]. Pairing takes
//! the two agents at the front of the queue in arrival order; the first
//! plays South. Every game runs on its own task and both agents are told
//! about the result through [`Agent::conclude`].

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::agent::{Agent, AgentId};
use crate::core::Board;
use crate::db::Database;
use crate::game::{play, Game};
use crate::types::{DEFAULT_SIZE, DEFAULT_STONES};

/// Shape of the boards handed out to new games.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub size: usize,
    pub stones: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            stones: DEFAULT_STONES,
        }
    }
}

#[derive(Default)]
struct Queue {
    waiting: VecDeque<Arc<dyn Agent>>,
    playing: HashSet<AgentId>,
}

impl Queue {
    fn contains(&self, id: AgentId) -> bool {
        self.waiting.iter().any(|a| a.id() == id)
    }
}

/// Shared matchmaker
pub struct Scheduler {
    config: SchedulerConfig,
    database: Arc<dyn Database>,
    queue: Mutex<Queue>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, database: Arc<dyn Database>) -> Arc<Self> {
        Arc::new(Self {
            config,
            database,
            queue: Mutex::new(Queue::default()),
        })
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Add `agent` to the queue and try to start a game.
    ///
    /// Agents that are already queued or playing are left alone.
    pub async fn enqueue(self: &Arc<Self>, agent: Arc<dyn Agent>) {
        let mut queue = self.queue.lock().await;
        let id = agent.id();
        if queue.playing.contains(&id) || queue.contains(id) {
            return;
        }
        debug!(agent = id, "Queued");
        queue.waiting.push_back(agent);
        self.schedule(&mut queue);
    }

    /// Retry pairing on behalf of `agent`, if it is still waiting.
    pub async fn promote(self: &Arc<Self>, id: AgentId) {
        let mut queue = self.queue.lock().await;
        if queue.playing.contains(&id) || !queue.contains(id) {
            return;
        }
        self.schedule(&mut queue);
    }

    /// Remove `agent` from the queue. A no-op for agents that are not waiting.
    pub async fn unschedule(&self, id: AgentId) {
        let mut queue = self.queue.lock().await;
        let before = queue.waiting.len();
        queue.waiting.retain(|a| a.id() != id);
        if queue.waiting.len() != before {
            debug!(agent = id, "Unscheduled");
        }
    }

    pub async fn is_queued(&self, id: AgentId) -> bool {
        self.queue.lock().await.contains(id)
    }

    pub async fn is_playing(&self, id: AgentId) -> bool {
        self.queue.lock().await.playing.contains(&id)
    }

    /// Number of agents waiting for an opponent.
    pub async fn waiting(&self) -> usize {
        self.queue.lock().await.waiting.len()
    }

    fn schedule(self: &Arc<Self>, queue: &mut Queue) {
        queue.waiting.retain(|a| a.is_alive());

        while queue.waiting.len() >= 2 {
            let (Some(south), Some(north)) = (queue.waiting.pop_front(), queue.waiting.pop_front()) else {
                break;
            };
            queue.playing.insert(south.id());
            queue.playing.insert(north.id());
            info!(south = south.id(), north = north.id(), "Paired agents");

            let scheduler = Arc::clone(self);
            tokio::spawn(async move { scheduler.run(south, north).await });
        }
    }

    async fn run(self: Arc<Self>, south: Arc<dyn Agent>, north: Arc<dyn Agent>) {
        let board = Board::new(self.config.size, self.config.stones);
        let mut game = Game::new(board, Arc::clone(&south), Arc::clone(&north));

        match play(&mut game, self.database.as_ref()).await {
            Ok(()) => info!(game = game.id, state = %game.state, moves = game.moves.len(), "Game over"),
            Err(e) => error!(game = game.id, error = %e, "Game aborted"),
        }

        {
            let mut queue = self.queue.lock().await;
            queue.playing.remove(&south.id());
            queue.playing.remove(&north.id());
        }

        south.conclude(&game).await;
        north.conclude(&game).await;
    }
}
