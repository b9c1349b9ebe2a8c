//! Bingo card identity and grid.
//!
//! A card is a 5×5 grid made of five fixed-width columns (B, I, N, G, O).
//! Column `k` (zero based) holds numbers from `15k + 1` to `15k + 15`. The
//! center cell is a free space and is stored as [`FREE_SPACE`].

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of rows and columns of a card.
pub const GRID_SIZE: usize = 5;

/// Highest number that can be drawn.
pub const MAX_NUMBER: u8 = 75;

/// Width of each column's number range.
pub const COLUMN_SPAN: u8 = 15;

/// Row and column index of the free space.
pub const FREE_INDEX: usize = 2;

/// Value stored in the free-space cell.
pub const FREE_SPACE: u8 = 0;

/// Column letters, left to right.
pub const COLUMN_LETTERS: [char; GRID_SIZE] = ['B', 'I', 'N', 'G', 'O'];

/// Identifier of a card within one game's pool (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u32);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CardId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(Self)
    }
}

impl From<u32> for CardId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// A 5×5 grid stored column-major: `columns[col][row]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardGrid {
    columns: [[u8; GRID_SIZE]; GRID_SIZE],
}

impl CardGrid {
    /// Build a grid from column-major data.
    ///
    /// The center cell is forced to [`FREE_SPACE`] regardless of input.
    pub fn from_columns(mut columns: [[u8; GRID_SIZE]; GRID_SIZE]) -> Self {
        columns[FREE_INDEX][FREE_INDEX] = FREE_SPACE;
        Self { columns }
    }

    /// Build a grid from column-major data without touching the center cell.
    ///
    /// Used when reading untrusted grids that must be validated as-is.
    pub fn from_columns_raw(columns: [[u8; GRID_SIZE]; GRID_SIZE]) -> Self {
        Self { columns }
    }

    /// Column-major cell data.
    pub fn columns(&self) -> &[[u8; GRID_SIZE]; GRID_SIZE] {
        &self.columns
    }

    /// Number at `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> u8 {
        self.columns[col][row]
    }

    /// Whether `(row, col)` is the free space.
    pub fn is_free(row: usize, col: usize) -> bool {
        row == FREE_INDEX && col == FREE_INDEX
    }

    /// The valid number range of column `col`.
    pub fn column_range(col: usize) -> RangeInclusive<u8> {
        let start = COLUMN_SPAN * col as u8 + 1;
        start..=start + COLUMN_SPAN - 1
    }

    /// All non-free numbers on the card.
    pub fn numbers(&self) -> impl Iterator<Item = u8> + '_ {
        (0..GRID_SIZE).flat_map(move |col| {
            (0..GRID_SIZE)
                .filter(move |&row| !Self::is_free(row, col))
                .map(move |row| self.columns[col][row])
        })
    }

    /// Whether `number` appears in a non-free cell.
    pub fn contains(&self, number: u8) -> bool {
        self.numbers().any(|n| n == number)
    }

    /// Whether every non-free cell holds a number inside its column's range.
    pub fn is_well_formed(&self) -> bool {
        (0..GRID_SIZE).all(|col| {
            let range = Self::column_range(col);
            (0..GRID_SIZE)
                .filter(|&row| !Self::is_free(row, col))
                .all(|row| range.contains(&self.columns[col][row]))
        })
    }
}

/// A card in a game's pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInfo {
    /// Card identifier within the pool.
    pub card_id: CardId,
    /// The card's numbers.
    pub grid: CardGrid,
}
