//! TCP server for agents
//!
//! Accepts connections and runs one [`Client`] session per connection.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::client::{Client, SessionError};
use crate::config::ServerConfig;
use crate::engine::{AgentId, Database, Scheduler};

/// Start the TCP server
///
/// `ready_tx` receives the bound address once the listener is up, which
/// lets callers bind port 0.
pub async fn run_server(
    config: ServerConfig,
    scheduler: Arc<Scheduler>,
    database: Arc<dyn Database>,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    let bound = listener.local_addr()?;
    info!(addr = %bound, "Listening");
    if let Some(tx) = ready_tx {
        let _ = tx.send(bound);
    }

    let mut client_id_counter: AgentId = 0;

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                if let Some(pause) = accept_backoff(&e) {
                    tokio::time::sleep(pause).await;
                }
                continue;
            }
        };
        client_id_counter += 1;
        let client_id = client_id_counter;

        info!(client = client_id, %addr, "Connected");

        let config = config.clone();
        let scheduler = Arc::clone(&scheduler);
        let database = Arc::clone(&database);

        tokio::spawn(async move {
            match handle_client(socket, client_id, config, scheduler, database).await {
                Ok(()) => {}
                Err(e @ SessionError::RequestReused(_)) => {
                    error!(client = client_id, error = %e, "Session failed")
                }
                Err(e) => warn!(client = client_id, error = %e, "Session error"),
            }
            info!(client = client_id, "Disconnected");
        });
    }
}

/// How long to pause before accepting again after `e`. Errors tied to a
/// single peer are retried at once.
fn accept_backoff(e: &io::Error) -> Option<Duration> {
    match e.kind() {
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset | io::ErrorKind::Interrupted => None,
        _ => Some(Duration::from_millis(100)),
    }
}

/// Handle a single client connection
async fn handle_client(
    socket: TcpStream,
    client_id: AgentId,
    config: ServerConfig,
    scheduler: Arc<Scheduler>,
    database: Arc<dyn Database>,
) -> Result<(), SessionError> {
    if let Err(e) = socket.set_nodelay(true) {
        debug!(client = client_id, error = %e, "Failed to set TCP_NODELAY");
    }
    let (reader, writer) = socket.into_split();

    let client = Client::new(client_id, config.proto, Box::new(writer), scheduler, database);
    client.connect(reader).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::time::timeout;

    use crate::engine::{DatabaseError, Game, Move, SchedulerConfig};
    use crate::types::User;

    #[test]
    fn test_vanished_peer_is_retried_at_once() {
        for kind in [
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::Interrupted,
        ] {
            assert_eq!(accept_backoff(&io::Error::from(kind)), None);
        }
    }

    #[test]
    fn test_fd_exhaustion_backs_off() {
        // EMFILE
        let e = io::Error::from_raw_os_error(24);
        assert_eq!(accept_backoff(&e), Some(Duration::from_millis(100)));
    }

    struct Discard;

    #[async_trait::async_trait]
    impl Database for Discard {
        async fn save_game(&self, _game: &mut Game) -> Result<(), DatabaseError> {
            Ok(())
        }

        async fn save_move(&self, _mv: &Move) -> Result<(), DatabaseError> {
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
    async fn test_dropped_connection_does_not_stop_the_listener() {
        let database: Arc<dyn Database> = Arc::new(Discard);
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let scheduler = Scheduler::new(SchedulerConfig::from(&config.game), Arc::clone(&database));

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(run_server(config, scheduler, database, Some(ready_tx)));
        let addr = ready_rx.await.unwrap();

        drop(TcpStream::connect(addr).await.unwrap());
        for _ in 0..3 {
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            let greeting = timeout(Duration::from_secs(2), lines.next_line())
                .await
                .expect("no greeting")
                .unwrap();
            assert_eq!(greeting.as_deref(), Some("2 kgp 1 0 0"));
        }
    }
}
