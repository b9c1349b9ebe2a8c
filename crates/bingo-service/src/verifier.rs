//! Claim verification: does a marked set satisfy a win pattern on a card?
//!
//! Pure and deterministic. The center cell always counts as marked. A card
//! with any non-free number outside its column's range fails every pattern.

use std::collections::BTreeSet;

use bingo_core::types::WinPattern;
use bingo_core::types::card::{CardGrid, GRID_SIZE};

const LAST: usize = GRID_SIZE - 1;

/// Marked-state view over a grid.
struct Marks<'a> {
    grid: &'a CardGrid,
    marked: &'a BTreeSet<u8>,
}

impl Marks<'_> {
    fn is_marked(&self, row: usize, col: usize) -> bool {
        CardGrid::is_free(row, col) || self.marked.contains(&self.grid.cell(row, col))
    }

    fn any_row(&self) -> bool {
        (0..GRID_SIZE).any(|row| (0..GRID_SIZE).all(|col| self.is_marked(row, col)))
    }

    fn any_column(&self) -> bool {
        (0..GRID_SIZE).any(|col| (0..GRID_SIZE).all(|row| self.is_marked(row, col)))
    }

    fn any_diagonal(&self) -> bool {
        let main = (0..GRID_SIZE).all(|i| self.is_marked(i, i));
        let anti = (0..GRID_SIZE).all(|i| self.is_marked(i, LAST - i));
        main || anti
    }

    fn corners(&self) -> bool {
        [(0, 0), (0, LAST), (LAST, 0), (LAST, LAST)]
            .into_iter()
            .all(|(row, col)| self.is_marked(row, col))
    }

    fn full_house(&self) -> bool {
        (0..GRID_SIZE).all(|row| (0..GRID_SIZE).all(|col| self.is_marked(row, col)))
    }
}

/// Whether `marked` satisfies `pattern` on `grid`.
pub fn verify(grid: &CardGrid, marked: &BTreeSet<u8>, pattern: WinPattern) -> bool {
    if !grid.is_well_formed() {
        return false;
    }
    let marks = Marks { grid, marked };
    match pattern {
        WinPattern::FullHouse => marks.full_house(),
        WinPattern::Row => marks.any_row(),
        WinPattern::Column => marks.any_column(),
        WinPattern::Diagonal => marks.any_diagonal(),
        WinPattern::Corners => marks.corners(),
        WinPattern::Line => marks.any_row() || marks.any_column() || marks.any_diagonal(),
        WinPattern::LineAndCorners => {
            marks.any_row() || marks.any_column() || marks.any_diagonal() || marks.corners()
        }
    }
}

/// Parse `pattern` and verify. Unknown names are an error, never approximated.
pub fn verify_named(grid: &CardGrid, marked: &BTreeSet<u8>, pattern: &str) -> Result<bool, String> {
    let pattern: WinPattern = pattern.parse()?;
    Ok(verify(grid, marked, pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [WinPattern; 7] = [
        WinPattern::FullHouse,
        WinPattern::Row,
        WinPattern::Column,
        WinPattern::Diagonal,
        WinPattern::Corners,
        WinPattern::Line,
        WinPattern::LineAndCorners,
    ];

    fn grid() -> CardGrid {
        CardGrid::from_columns([
            [1, 2, 3, 4, 5],
            [16, 17, 18, 19, 20],
            [31, 32, 0, 34, 35],
            [46, 47, 48, 49, 50],
            [61, 62, 63, 64, 65],
        ])
    }

    fn marks(numbers: &[u8]) -> BTreeSet<u8> {
        numbers.iter().copied().collect()
    }

    #[test]
    fn test_middle_row_uses_free_space() {
        // Row 2: 3, 18, free, 48, 63
        let marked = marks(&[3, 18, 48, 63]);
        assert!(verify(&grid(), &marked, WinPattern::Row));
        assert!(verify(&grid(), &marked, WinPattern::Line));
        assert!(!verify(&grid(), &marked, WinPattern::Column));
        assert!(!verify(&grid(), &marked, WinPattern::FullHouse));
    }

    #[test]
    fn test_column() {
        assert!(verify(&grid(), &marks(&[16, 17, 18, 19, 20]), WinPattern::Column));
        assert!(!verify(&grid(), &marks(&[16, 17, 18, 19]), WinPattern::Column));
    }

    #[test]
    fn test_both_diagonals() {
        assert!(verify(&grid(), &marks(&[1, 17, 49, 65]), WinPattern::Diagonal));
        assert!(verify(&grid(), &marks(&[61, 47, 19, 5]), WinPattern::Diagonal));
        assert!(!verify(&grid(), &marks(&[1, 17, 49]), WinPattern::Diagonal));
    }

    #[test]
    fn test_corners_and_composite() {
        let marked = marks(&[1, 5, 61, 65]);
        assert!(verify(&grid(), &marked, WinPattern::Corners));
        assert!(verify(&grid(), &marked, WinPattern::LineAndCorners));
        assert!(!verify(&grid(), &marked, WinPattern::Line));
    }

    #[test]
    fn test_full_house() {
        let all: BTreeSet<u8> = grid().numbers().collect();
        for pattern in ALL {
            assert!(verify(&grid(), &all, pattern), "{pattern} should pass");
        }
    }

    #[test]
    fn test_out_of_range_card_fails_every_pattern() {
        let mut columns = *grid().columns();
        columns[0][0] = 70;
        let bad = CardGrid::from_columns(columns);
        let all: BTreeSet<u8> = (1..=75).collect();
        for pattern in ALL {
            assert!(!verify(&bad, &all, pattern), "{pattern} must reject");
        }
    }

    #[test]
    fn test_unknown_pattern_is_error() {
        assert!(verify_named(&grid(), &marks(&[]), "X_SHAPE").is_err());
        assert_eq!(verify_named(&grid(), &marks(&[1, 5, 61, 65]), "corners"), Ok(true));
    }
}
