//! Board module - Kalah pits, stores and sowing rules
//!
//! Each side owns `size` pits and one store. Pits are indexed 0..size from
//! the owner's left, so South pit `i` faces North pit `size - 1 - i`.
//! Seeds travel counter-clockwise: through the mover's pits, into the
//! mover's store, then through the opponent's pits (the opponent's store is
//! skipped).
//!
//! The canonical text form is `<size,south_store,north_store,south_pits..,north_pits..>`.

use std::fmt;
use std::str::FromStr;

use rand::seq::IteratorRandom;
use rand::Rng;

use crate::types::{Outcome, Side};

/// Errors produced when reading the canonical board form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardParseError {
    #[error("board must be enclosed in angle brackets")]
    Brackets,
    #[error("invalid number in board: {0:?}")]
    Number(String),
    #[error("board of size {size} needs {expected} fields, got {found}")]
    Length {
        size: usize,
        expected: usize,
        found: usize,
    },
}

/// A Kalah position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    south: u32,
    north: u32,
    south_pits: Vec<u32>,
    north_pits: Vec<u32>,
}

impl Board {
    /// Create a fresh board with `size` pits per side and `stones` seeds in each pit.
    pub fn new(size: usize, stones: u32) -> Self {
        Self {
            south: 0,
            north: 0,
            south_pits: vec![stones; size],
            north_pits: vec![stones; size],
        }
    }

    /// Build a board from explicit stores and pits.
    ///
    /// Returns None if the rows differ in length or are empty.
    pub fn from_parts(south: u32, north: u32, south_pits: Vec<u32>, north_pits: Vec<u32>) -> Option<Self> {
        if south_pits.len() != north_pits.len() || south_pits.is_empty() {
            return None;
        }
        Some(Self {
            south,
            north,
            south_pits,
            north_pits,
        })
    }

    /// Number of pits per side.
    pub fn size(&self) -> usize {
        self.south_pits.len()
    }

    /// Seeds in `side`'s store.
    pub fn store(&self, side: Side) -> u32 {
        match side {
            Side::South => self.south,
            Side::North => self.north,
        }
    }

    /// Seeds in `pit` on `side`, or None when out of range.
    pub fn pit(&self, side: Side, pit: usize) -> Option<u32> {
        self.pits(side).get(pit).copied()
    }

    /// All pits of `side`, from the owner's left.
    pub fn pits(&self, side: Side) -> &[u32] {
        match side {
            Side::South => &self.south_pits,
            Side::North => &self.north_pits,
        }
    }

    fn pits_mut(&mut self, side: Side) -> &mut [u32] {
        match side {
            Side::South => &mut self.south_pits,
            Side::North => &mut self.north_pits,
        }
    }

    fn store_mut(&mut self, side: Side) -> &mut u32 {
        match side {
            Side::South => &mut self.south,
            Side::North => &mut self.north,
        }
    }

    /// A move is legal if it names an existing, non-empty pit of `side`.
    pub fn is_legal(&self, side: Side, pit: usize) -> bool {
        self.pit(side, pit).is_some_and(|seeds| seeds > 0)
    }

    /// Count the legal moves of `side`.
    ///
    /// The second value is the last legal pit found, which is the only legal
    /// pit when the count is 1.
    pub fn moves(&self, side: Side) -> (usize, usize) {
        let mut count = 0;
        let mut last = 0;
        for (pit, &seeds) in self.pits(side).iter().enumerate() {
            if seeds > 0 {
                count += 1;
                last = pit;
            }
        }
        (count, last)
    }

    /// Iterator over the legal pits of `side`.
    pub fn legal_moves(&self, side: Side) -> impl Iterator<Item = usize> + '_ {
        self.pits(side)
            .iter()
            .enumerate()
            .filter(|&(_, &seeds)| seeds > 0)
            .map(|(pit, _)| pit)
    }

    /// The game is over as soon as either side has nothing left to sow.
    pub fn is_over(&self) -> bool {
        self.moves(Side::South).0 == 0 || self.moves(Side::North).0 == 0
    }

    /// Compare stores from `side`'s perspective.
    pub fn outcome(&self, side: Side) -> Outcome {
        let mine = self.store(side);
        let theirs = self.store(side.opposite());
        match mine.cmp(&theirs) {
            std::cmp::Ordering::Greater => Outcome::Win,
            std::cmp::Ordering::Less => Outcome::Loss,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    /// The same position seen from the other side.
    pub fn mirror(&self) -> Self {
        Self {
            south: self.north,
            north: self.south,
            south_pits: self.north_pits.clone(),
            north_pits: self.south_pits.clone(),
        }
    }

    /// A uniformly chosen legal pit for `side`.
    pub fn random<R: Rng + ?Sized>(&self, side: Side, rng: &mut R) -> Option<usize> {
        self.legal_moves(side).choose(rng)
    }

    /// Total seeds on the board, stores included.
    pub fn seeds(&self) -> u32 {
        self.south + self.north + self.south_pits.iter().sum::<u32>() + self.north_pits.iter().sum::<u32>()
    }

    /// Sow the seeds of `pit` on `side`.
    ///
    /// Returns true if `side` is granted another move. The caller must have
    /// checked legality; sowing an empty or missing pit leaves the board
    /// untouched and returns false.
    pub fn sow(&mut self, side: Side, pit: usize) -> bool {
        if !self.is_legal(side, pit) {
            return false;
        }

        let size = self.size();
        let mut stones = self.pits(side)[pit];
        self.pits_mut(side)[pit] = 0;

        let mut row = side;
        let mut pos = pit + 1;
        while stones > 0 {
            if pos == size {
                if row == side {
                    *self.store_mut(side) += 1;
                    stones -= 1;
                }
                row = row.opposite();
                pos = 0;
            } else {
                self.pits_mut(row)[pos] += 1;
                pos += 1;
                stones -= 1;
            }
        }

        // Last seed landed in the mover's store.
        if pos == 0 && row != side {
            if self.is_over() {
                self.collect();
                return false;
            }
            return true;
        }

        if row == side && pos > 0 {
            let last = pos - 1;
            let other = size - 1 - last;
            let opposite = side.opposite();
            if self.pits(side)[last] == 1 && self.pits(opposite)[other] > 0 {
                let captured = self.pits(opposite)[other] + 1;
                self.pits_mut(opposite)[other] = 0;
                self.pits_mut(side)[last] = 0;
                *self.store_mut(side) += captured;
            }
        }

        if self.is_over() {
            self.collect();
        }
        false
    }

    /// Move every remaining seed into its owner's store.
    fn collect(&mut self) {
        for side in [Side::South, Side::North] {
            let rest: u32 = self.pits(side).iter().sum();
            *self.store_mut(side) += rest;
            self.pits_mut(side).iter_mut().for_each(|p| *p = 0);
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{},{},{}", self.size(), self.south, self.north)?;
        for seeds in self.south_pits.iter().chain(self.north_pits.iter()) {
            write!(f, ",{seeds}")?;
        }
        f.write_str(">")
    }
}

impl FromStr for Board {
    type Err = BoardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or(BoardParseError::Brackets)?;

        let fields = inner
            .split(',')
            .map(|field| {
                field
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| BoardParseError::Number(field.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let size = fields[0] as usize;
        let expected = size * 2 + 3;
        if size == 0 || fields.len() != expected {
            return Err(BoardParseError::Length {
                size,
                expected,
                found: fields.len(),
            });
        }

        Ok(Self {
            south: fields[1],
            north: fields[2],
            south_pits: fields[3..3 + size].to_vec(),
            north_pits: fields[3 + size..].to_vec(),
        })
    }
}
