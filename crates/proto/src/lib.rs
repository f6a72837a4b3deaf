//! Protocol module - agents playing over the Kalah Game Protocol
//!
//! This crate lets external agents play through a TCP connection speaking
//! a line-oriented text protocol.
//!
//! # Protocol Overview
//!
//! Every line is `[ID[@REF]] COMMAND [ARGS...]`, terminated by CRLF.
//!
//! 1. **Greeting**: the server sends `kgp 1 0 0`
//! 2. **Mode**: the client answers `mode freeplay` (or `mode simple`) in time
//! 3. **Matching**: the scheduler pairs it with the next waiting client
//! 4. **Playing**: the server sends `state <board>`, the client answers
//!    `move <pit>` referencing it, the server closes the request with `stop`
//! 5. **Closing**: after the game both sessions end with `goodbye`
//!
//! # Message Types
//!
//! ## Client → Server
//!
//! - **mode**: request a mode
//! - **move**: answer a `state` with a 1-based pit, possibly several times
//! - **yield**: stop deliberating, the last move stands
//! - **set**: `info:name`, `info:authors`, `info:description`,
//!   `info:comment`, `auth:token`
//! - **ping** / **pong**: liveness
//!
//! ## Server → Client
//!
//! - **kgp**: greeting with protocol version
//! - **ok** / **error**: mode acknowledgement or refusal
//! - **state**: move request, the board seen from the recipient as South
//! - **stop**: the request is closed
//! - **ping** / **pong**: liveness
//! - **goodbye**: last line before the connection closes
//!
//! # Example Protocol Flow
//!
//! ```text
//! Server -> Client: 2 kgp 1 0 0
//! Client -> Server: 1 mode freeplay
//! Server -> Client: 4@1 ok
//! Server -> Client: 6 state <7,0,0,7,7,7,7,7,7,7,7,7,7,7,7,7,7>
//! Client -> Server: 3@6 move 3
//! Client -> Server: 5@6 yield
//! Server -> Client: 8@6 stop
//! ```
//!
//! # Testing
//!
//! ```bash
//! nc 127.0.0.1 2671
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod server;

pub use kgp_core as core;
pub use kgp_engine as engine;
pub use kgp_types as types;

pub use client::{Client, SessionError};
pub use codec::{ArgError, Line};
pub use config::{ConfigError, GameConfig, ProtoConfig, ServerConfig};
pub use server::run_server;
