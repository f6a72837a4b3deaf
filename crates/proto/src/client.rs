//! Client session - one connection, one protocol state machine
//!
//! A session runs three activities at once:
//!
//! - a reader task decoding inbound lines and interpreting them,
//! - a watchdog that kills the session if no mode is requested in time,
//! - the coordinator loop ([`Client::connect`] itself) that owns the
//!   request/response correlation tables.
//!
//! The game engine talks to a session only through the [`Agent`] trait.
//! [`Agent::request`] sends `state`, registers the request with the
//! coordinator and waits for a move, a timeout or shutdown. Moves may reach
//! the coordinator before their request does; they are held back as long as
//! the `state` id is still outstanding.
//!
//! All writes go through one lock, so lines from different activities never
//! interleave. Server ids come from a counter advanced by two and are drawn
//! while that lock is held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::{decode, encode, parse, Arg, ArgError, Target};
use crate::config::ProtoConfig;
use crate::engine::{Agent, AgentId, Database, DatabaseError, Decision, Game, Move, Scheduler};
use crate::types::{Mode, Side, User, PROTOCOL_VERSION};

/// Errors that end or disturb a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Correlation bookkeeping is broken. Fatal to the session.
    #[error("request id {0} registered twice before it was resolved")]
    RequestReused(u64),

    #[error("session is already connected")]
    AlreadyConnected,

    #[error(transparent)]
    Arg(#[from] ArgError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Writer half shared by every activity of a session.
pub type Writer = Box<dyn AsyncWrite + Send + Unpin>;

struct PendingRequest {
    id: u64,
    reply: mpsc::Sender<Option<Move>>,
}

struct PendingResponse {
    id: u64,
    /// None asks the requester to stop waiting.
    mv: Option<Move>,
}

/// An outstanding `state` request.
#[derive(Debug, Clone, Copy)]
struct Tracked {
    game: u64,
    side: Side,
}

struct Inbox {
    requests: mpsc::Receiver<PendingRequest>,
    responses: mpsc::Receiver<PendingResponse>,
}

/// A connected agent.
pub struct Client {
    id: AgentId,
    config: ProtoConfig,
    user: Mutex<User>,
    comment: Mutex<String>,
    mode: AtomicU8,
    writer: Mutex<Writer>,
    rid: AtomicU64,
    cancel: CancellationToken,
    dead: AtomicBool,
    pinged: AtomicBool,
    /// Outstanding `state` ids, guarded apart from the writer.
    games: Mutex<HashMap<u64, Tracked>>,
    requests: mpsc::Sender<PendingRequest>,
    responses: mpsc::Sender<PendingResponse>,
    inbox: Mutex<Option<Inbox>>,
    alive_tx: mpsc::Sender<u64>,
    /// Held while a `ping` waits for its `pong`.
    alive_rx: Mutex<mpsc::Receiver<u64>>,
    scheduler: Arc<Scheduler>,
    database: Arc<dyn Database>,
}

impl Client {
    pub fn new(
        id: AgentId,
        config: ProtoConfig,
        writer: Writer,
        scheduler: Arc<Scheduler>,
        database: Arc<dyn Database>,
    ) -> Arc<Self> {
        let capacity = config.request_capacity.max(1);
        let (requests, request_rx) = mpsc::channel(capacity);
        let (responses, response_rx) = mpsc::channel(capacity);
        let (alive_tx, alive_rx) = mpsc::channel(capacity);

        Arc::new(Self {
            id,
            config,
            user: Mutex::new(User::anonymous()),
            comment: Mutex::new(String::new()),
            mode: AtomicU8::new(Mode::None.as_u8()),
            writer: Mutex::new(writer),
            rid: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            dead: AtomicBool::new(false),
            pinged: AtomicBool::new(false),
            games: Mutex::new(HashMap::new()),
            requests,
            responses,
            inbox: Mutex::new(Some(Inbox {
                requests: request_rx,
                responses: response_rx,
            })),
            alive_tx,
            alive_rx: Mutex::new(alive_rx),
            scheduler,
            database,
        })
    }

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::SeqCst))
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    /// True while a liveness `ping` is waiting for its `pong`.
    pub fn is_pinged(&self) -> bool {
        self.pinged.load(Ordering::SeqCst)
    }

    /// Trigger shutdown. Idempotent.
    pub fn kill(&self) {
        self.cancel.cancel();
    }

    /// Token cancelled when the session shuts down.
    pub fn cancelled(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn next_id(&self) -> u64 {
        self.rid.fetch_add(2, Ordering::SeqCst) + 2
    }

    /// Write one line under a fresh id. Returns None if nothing was sent.
    ///
    /// The id is drawn while the writer is held, so ids reach the wire in
    /// increasing order. `track` registers the id as an outstanding request
    /// before the line is written.
    async fn emit(&self, to: u64, command: &str, args: &[Arg<'_>], track: Option<Tracked>) -> Option<u64> {
        if self.is_dead() {
            return None;
        }

        let mut writer = self.writer.lock().await;
        let id = self.next_id();
        if let Some(tracked) = track {
            self.track(id, tracked).await;
        }
        let line = encode(id, to, command, args);
        debug!(client = self.id, "> {line}");

        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\r\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            debug!(client = self.id, error = %e, "Write failed");
            if track.is_some() {
                self.untrack(id).await;
            }
            return None;
        }
        Some(id)
    }

    /// Send `command` referencing `to` (0 for none). Returns the new id, 0 if not sent.
    pub async fn respond(&self, to: u64, command: &str, args: &[Arg<'_>]) -> u64 {
        self.emit(to, command, args, None).await.unwrap_or(0)
    }

    /// Send an unreferenced `command`.
    pub async fn send(&self, command: &str, args: &[Arg<'_>]) -> u64 {
        self.respond(0, command, args).await
    }

    async fn error(&self, to: u64, message: &str) -> u64 {
        self.respond(to, "error", &[Arg::Str(message)]).await
    }

    /// Check liveness with `ping`.
    ///
    /// On timeout the peer is told how long we waited, the session is
    /// marked dead and killed.
    pub async fn ping(&self) -> bool {
        if self.is_dead() {
            return false;
        }
        if !self.config.ping {
            return true;
        }

        let mut alive = self.alive_rx.lock().await;
        while alive.try_recv().is_ok() {}

        self.pinged.store(true, Ordering::SeqCst);
        let id = self.send("ping", &[]).await;
        if id == 0 {
            return false;
        }

        let start = Instant::now();
        let deadline = tokio::time::sleep(self.config.ping_timeout());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = &mut deadline => {
                    let message = format!("received no pong after {:?}", start.elapsed());
                    self.error(id, &message).await;
                    info!(client = self.id, "No pong, closing");
                    self.dead.store(true, Ordering::SeqCst);
                    self.kill();
                    return false;
                }
                pong = alive.recv() => match pong {
                    Some(reference) if reference == 0 || reference == id => {
                        self.pinged.store(false, Ordering::SeqCst);
                        return true;
                    }
                    Some(_) => continue,
                    None => return false,
                },
            }
        }
    }

    /// Run the session until it is killed or the peer disconnects.
    pub async fn connect<R>(self: Arc<Self>, reader: R) -> Result<(), SessionError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let inbox = self.inbox.lock().await.take().ok_or(SessionError::AlreadyConnected)?;

        let (major, minor, patch) = PROTOCOL_VERSION;
        self.send("kgp", &[Arg::Int(major), Arg::Int(minor), Arg::Int(patch)])
            .await;

        tokio::spawn(Arc::clone(&self).watch_mode());
        tokio::spawn(Arc::clone(&self).read_lines(reader));

        let result = self.coordinate(inbox).await;
        if let Err(e) = &result {
            error!(client = self.id, error = %e, "Session aborted");
            self.kill();
        }
        self.shutdown().await;
        result
    }

    async fn watch_mode(self: Arc<Self>) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.config.mode_timeout()) => {
                if self.mode() == Mode::None {
                    self.error(0, "Requested no mode").await;
                    self.kill();
                }
            }
        }
    }

    async fn read_lines<R>(self: Arc<Self>, reader: R)
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = tokio::select! {
                _ = self.cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            match line {
                Ok(Some(line)) => {
                    if self.is_dead() {
                        break;
                    }
                    debug!(client = self.id, "< {line}");
                    if let Err(e) = Arc::clone(&self).interpret(&line).await {
                        debug!(client = self.id, error = %e, "Dropped line");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(client = self.id, error = %e, "Read failed");
                    break;
                }
            }
        }
        self.kill();
    }

    async fn coordinate(&self, inbox: Inbox) -> Result<(), SessionError> {
        let Inbox {
            mut requests,
            mut responses,
        } = inbox;
        let mut waiting: HashMap<u64, mpsc::Sender<Option<Move>>> = HashMap::new();
        let mut early: HashMap<u64, Vec<Option<Move>>> = HashMap::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(client = self.id, "Received shutdown signal");
                    return Ok(());
                }
                Some(req) = requests.recv() => {
                    if waiting.get(&req.id).is_some_and(|reply| !reply.is_closed()) {
                        return Err(SessionError::RequestReused(req.id));
                    }
                    for mv in early.remove(&req.id).unwrap_or_default() {
                        let _ = req.reply.try_send(mv);
                    }
                    waiting.insert(req.id, req.reply);
                }
                Some(resp) = responses.recv() => {
                    match waiting.get(&resp.id) {
                        Some(reply) => {
                            // Answers beyond the inbox capacity are dropped.
                            let _ = reply.try_send(resp.mv);
                        }
                        None => {
                            if self.games.lock().await.contains_key(&resp.id) {
                                early.entry(resp.id).or_default().push(resp.mv);
                            }
                        }
                    }
                    waiting.retain(|_, reply| !reply.is_closed());
                    let games = self.games.lock().await;
                    early.retain(|id, _| games.contains_key(id));
                }
            }
        }
    }

    async fn shutdown(&self) {
        self.scheduler.unschedule(self.id).await;

        {
            let mut writer = self.writer.lock().await;
            let _ = writer.write_all(b"goodbye\r\n").await;
            let _ = writer.flush().await;
            let _ = writer.shutdown().await;
            self.dead.store(true, Ordering::SeqCst);
        }

        debug!(client = self.id, "Closed connection");
    }

    /// Find the outstanding request `reference` names; 0 means the latest one.
    async fn resolve(&self, reference: u64) -> Option<(u64, Tracked)> {
        let games = self.games.lock().await;
        if reference == 0 {
            games.iter().max_by_key(|(id, _)| **id).map(|(id, t)| (*id, *t))
        } else {
            games.get(&reference).map(|t| (reference, *t))
        }
    }

    /// Evaluate one input line.
    pub async fn interpret(self: Arc<Self>, input: &str) -> Result<(), SessionError> {
        let Some(line) = decode(input) else {
            return Ok(());
        };
        let (id, reference) = (line.id, line.reference);

        match line.command {
            "mode" => {
                if self.scheduler.is_playing(self.id).await {
                    return Ok(());
                }
                let mut name = String::new();
                parse(line.args, &mut [Target::Str(&mut name)])?;

                match Mode::from_str(&name) {
                    Some(mode) => {
                        self.mode.store(mode.as_u8(), Ordering::SeqCst);
                        self.respond(id, "ok", &[]).await;
                        let agent: Arc<dyn Agent> = self.clone();
                        self.scheduler.enqueue(agent).await;
                    }
                    None => {
                        self.error(id, "Unsupported Mode").await;
                    }
                }
            }
            "move" => {
                let Some((target, tracked)) = self.resolve(reference).await else {
                    if id > 0 {
                        self.error(id, "No such request").await;
                    }
                    return Ok(());
                };
                let mut pit = 0;
                parse(line.args, &mut [Target::Uint(&mut pit)])?;

                // Pits are 1-based on the wire; 0 can never be legal.
                let choice = usize::try_from(pit)
                    .ok()
                    .and_then(|p| p.checked_sub(1))
                    .unwrap_or(usize::MAX);
                let comment = self.comment.lock().await.clone();
                let mut mv = Move::new(self.id, tracked.side, choice, comment);
                mv.game = tracked.game;

                let _ = self
                    .responses
                    .send(PendingResponse {
                        id: target,
                        mv: Some(mv),
                    })
                    .await;
            }
            "yield" => {
                let Some((target, _)) = self.resolve(reference).await else {
                    if id > 0 {
                        self.error(id, "No such request").await;
                    }
                    return Ok(());
                };
                let _ = self.responses.send(PendingResponse { id: target, mv: None }).await;
            }
            "ok" | "fail" | "error" => {
                debug!(client = self.id, reply = line.command, args = line.args, "Ignoring reply");
            }
            "ping" => {
                self.respond(id, "pong", &[]).await;
            }
            "pong" => {
                self.pinged.store(false, Ordering::SeqCst);
                let _ = self.alive_tx.try_send(reference);
                if !self.scheduler.is_playing(self.id).await {
                    self.scheduler.promote(self.id).await;
                }
            }
            "set" => {
                let (mut key, mut value) = (String::new(), String::new());
                parse(line.args, &mut [Target::Str(&mut key), Target::Str(&mut value)])?;
                self.set(&key, value).await?;
            }
            other => {
                debug!(client = self.id, command = other, "Unknown command");
            }
        }
        Ok(())
    }

    /// Apply a `set` option.
    async fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        let mut user = self.user.lock().await;
        match key {
            "info:name" => user.name = value,
            "info:authors" => user.author = value,
            "info:description" => user.description = value,
            "info:comment" => {
                *self.comment.lock().await = value;
                return Ok(());
            }
            "auth:token" => {
                if !user.is_anonymous() || value.is_empty() {
                    return Ok(());
                }
                match self.database.user_by_token(&value).await? {
                    Some(mut known) => {
                        info!(client = self.id, user = known.id, "Authenticated");
                        // Edits made before authenticating win over the stored row.
                        let anonymous = User::anonymous();
                        let mut edited = false;
                        if user.name != anonymous.name {
                            known.name = user.name.clone();
                            edited = true;
                        }
                        if user.author != anonymous.author {
                            known.author = user.author.clone();
                            edited = true;
                        }
                        if user.description != anonymous.description {
                            known.description = user.description.clone();
                            edited = true;
                        }
                        if edited {
                            self.database.save_user(&mut known).await?;
                        }
                        *user = known;
                    }
                    None => {
                        let anonymous = User::anonymous();
                        let mut fresh = User {
                            id: 0,
                            name: user.name.clone(),
                            author: user.author.clone(),
                            description: if user.description == anonymous.description {
                                String::new()
                            } else {
                                user.description.clone()
                            },
                            token: value,
                        };
                        self.database.save_user(&mut fresh).await?;
                        info!(client = self.id, user = fresh.id, "Registered");
                        *user = fresh;
                    }
                }
                return Ok(());
            }
            other => {
                debug!(client = self.id, key = other, "Unknown option");
                return Ok(());
            }
        }

        if !user.is_anonymous() {
            self.database.save_user(&mut *user).await?;
        }
        Ok(())
    }

    async fn track(&self, id: u64, tracked: Tracked) {
        self.games.lock().await.insert(id, tracked);
    }

    async fn untrack(&self, id: u64) {
        self.games.lock().await.remove(&id);
    }

    /// Number of outstanding `state` requests.
    pub async fn outstanding(&self) -> usize {
        self.games.lock().await.len()
    }
}

#[async_trait]
impl Agent for Client {
    fn id(&self) -> AgentId {
        self.id
    }

    async fn user(&self) -> User {
        self.user.lock().await.clone()
    }

    fn is_alive(&self) -> bool {
        !self.is_dead() && !self.cancel.is_cancelled()
    }

    async fn request(&self, game: &Game) -> Decision {
        if !self.is_alive() {
            return Decision::Resign;
        }
        let Some(side) = game.side_of(self.id) else {
            warn!(client = self.id, game = game.id, "Asked to move in a foreign game");
            return Decision::Resign;
        };

        let board = match side {
            Side::South => game.board.clone(),
            Side::North => game.board.mirror(),
        };

        let tracked = Tracked { game: game.id, side };
        let Some(id) = self.emit(0, "state", &[Arg::Board(&board)], Some(tracked)).await else {
            return Decision::Resign;
        };

        let choice = game.board.random(side, &mut rand::thread_rng()).unwrap_or(0);
        let mut mv = Move::new(self.id, side, choice, "[random move]");
        mv.game = game.id;

        let (reply, mut answers) = mpsc::channel(self.config.request_capacity.max(1));
        match self.requests.try_send(PendingRequest { id, reply }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(client = self.id, "Overload move");
                mv.comment = "[overload move]".to_string();
                self.finish(id).await;
                return Decision::Play(mv);
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client = self.id, "Session closed while requesting a move");
                self.untrack(id).await;
                return Decision::Resign;
            }
        }

        let deadline = tokio::time::sleep(self.config.move_timeout());
        tokio::pin!(deadline);

        let decision = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break Decision::Play(mv),
                _ = &mut deadline => {
                    break if self.ping().await {
                        Decision::Play(mv)
                    } else {
                        Decision::Resign
                    };
                }
                answer = answers.recv() => match answer {
                    Some(Some(answer)) => mv = answer,
                    _ => break Decision::Play(mv),
                },
            }
        };

        self.finish(id).await;
        decision
    }

    async fn conclude(&self, game: &Game) {
        debug!(client = self.id, game = game.id, state = %game.state, "Concluded");
        self.kill();
    }
}

impl Client {
    async fn finish(&self, id: u64) {
        self.untrack(id).await;
        self.respond(id, "stop", &[]).await;
    }
}
