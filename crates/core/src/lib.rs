//! Kalah rules
//!
//! The board and its sowing rules, free of networking and storage. The
//! engine, the protocol layer and the benchmarks share this one
//! implementation.
//!
//! # Game Rules
//!
//! - Each side owns `size` pits plus a store; every pit starts with `stones` seeds.
//! - A move empties one non-empty pit and sows its seeds counter-clockwise,
//!   skipping the opponent's store.
//! - A last seed in the mover's own store grants another move.
//! - A last seed in an empty own pit captures the opposite pit.
//! - Once a side runs out of seeds, all remaining seeds go to their owners'
//!   stores and the larger store wins.
//!
//! # Example
//!
//! ```
//! use kgp_core::Board;
//! use kgp_types::Side;
//!
//! let mut board = Board::new(7, 7);
//! assert!(board.is_legal(Side::South, 0));
//!
//! // Pit 0 holds 7 seeds: the last one lands in South's store.
//! let again = board.sow(Side::South, 0);
//! assert!(again);
//! assert_eq!(board.store(Side::South), 1);
//! assert_eq!(board.to_string(), "<7,1,0,0,8,8,8,8,8,8,7,7,7,7,7,7,7>");
//! ```

pub mod board;

pub use kgp_types as types;

pub use board::{Board, BoardParseError};
