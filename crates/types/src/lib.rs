//! Shared vocabulary of the server
//!
//! Plain data used by every other crate: sides, game states, protocol
//! modes, user identities and the default constants. Nothing here does I/O.
//!
//! # Sides
//!
//! A Kalah board has two sides. South always moves first; the wire protocol
//! presents every board so that the recipient sees itself as South.
//!
//! # Defaults
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `DEFAULT_PORT` | 2671 | Plain TCP listening port |
//! | `DEFAULT_SIZE` | 7 | Pits per side |
//! | `DEFAULT_STONES` | 7 | Seeds per pit at game start |
//! | `DEFAULT_REQUEST_CAPACITY` | 8 | Outstanding move requests per session |
//!
//! # Examples
//!
//! ```
//! use kgp_types::{Mode, Side, State};
//!
//! assert_eq!(Side::South.opposite(), Side::North);
//! assert_eq!(State::resigned(Side::North), State::NorthResigned);
//! assert_eq!(State::SouthWon.as_str(), "south_won");
//! assert_eq!(Mode::from_str("simple"), Some(Mode::Freeplay));
//! ```

use std::fmt;

/// Protocol version announced in the `kgp` greeting (major, minor, patch).
pub const PROTOCOL_VERSION: (u64, u64, u64) = (1, 0, 0);

/// Default plain TCP port.
pub const DEFAULT_PORT: u16 = 2671;

/// Default number of pits per side.
pub const DEFAULT_SIZE: usize = 7;

/// Default number of seeds in every pit of a fresh board.
pub const DEFAULT_STONES: u32 = 7;

/// Default capacity of a session's inbound request queue.
pub const DEFAULT_REQUEST_CAPACITY: usize = 8;

/// Default time a client has to request a mode, in milliseconds.
pub const DEFAULT_MODE_TIMEOUT_MS: u64 = 5_000;

/// Default time a client has to answer a `state` request, in milliseconds.
pub const DEFAULT_MOVE_TIMEOUT_MS: u64 = 5_000;

/// Default time a client has to answer a `ping`, in milliseconds.
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 5_000;

/// One of the two sides of the board.
///
/// South owns the lower row and moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    South,
    North,
}

impl Side {
    /// The other side.
    ///
    /// # Examples
    ///
    /// ```
    /// use kgp_types::Side;
    ///
    /// assert_eq!(Side::North.opposite(), Side::South);
    /// ```
    pub fn opposite(self) -> Self {
        match self {
            Side::South => Side::North,
            Side::North => Side::South,
        }
    }

    /// Convert to lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::South => "south",
            Side::North => "north",
        }
    }

    /// Parse a side from its lowercase name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "south" => Some(Side::South),
            "north" => Some(Side::North),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a game.
///
/// `Ongoing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    #[default]
    Ongoing,
    SouthWon,
    NorthWon,
    SouthResigned,
    NorthResigned,
    /// Both stores ended level.
    Undecided,
}

impl State {
    /// The resignation state for `side`.
    pub fn resigned(side: Side) -> Self {
        match side {
            Side::South => State::SouthResigned,
            Side::North => State::NorthResigned,
        }
    }

    /// The winning state for `side`.
    pub fn won(side: Side) -> Self {
        match side {
            Side::South => State::SouthWon,
            Side::North => State::NorthWon,
        }
    }

    /// True for every state except `Ongoing`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, State::Ongoing)
    }

    /// Label used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Ongoing => "ongoing",
            State::SouthWon => "south_won",
            State::NorthWon => "north_won",
            State::SouthResigned => "south_resigned",
            State::NorthResigned => "north_resigned",
            State::Undecided => "undecided",
        }
    }

    /// Parse a state label.
    ///
    /// # Examples
    ///
    /// ```
    /// use kgp_types::State;
    ///
    /// assert_eq!(State::from_str("north_resigned"), Some(State::NorthResigned));
    /// assert_eq!(State::from_str("draw"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ongoing" => Some(State::Ongoing),
            "south_won" => Some(State::SouthWon),
            "north_won" => Some(State::NorthWon),
            "south_resigned" => Some(State::SouthResigned),
            "north_resigned" => Some(State::NorthResigned),
            "undecided" => Some(State::Undecided),
            _ => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a finished board from one side's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

/// Protocol mode negotiated by a client with `mode <name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Nothing requested yet.
    #[default]
    None,
    /// Queue for a game against the next waiting agent.
    Freeplay,
}

impl Mode {
    /// Parse a mode name as sent by a client.
    ///
    /// `simple` is accepted as an alias of `freeplay`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "freeplay" | "simple" => Some(Mode::Freeplay),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Mode::None => 0,
            Mode::Freeplay => 1,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Mode::Freeplay,
            _ => Mode::None,
        }
    }
}

/// Persistent identity of an agent.
///
/// `id == 0` means the user has not been stored yet. An empty `token`
/// marks the shared anonymous identity, which is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub author: String,
    pub description: String,
    pub token: String,
}

impl User {
    /// The placeholder identity of every unauthenticated connection.
    pub fn anonymous() -> Self {
        Self {
            id: 0,
            name: "Anonymous".to_string(),
            author: String::new(),
            description: "Pseudo-user of all unidentified agents.".to_string(),
            token: String::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.token.is_empty()
    }
}
