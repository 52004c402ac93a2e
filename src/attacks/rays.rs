//! Ray-between tables: for every ordered pair of squares that share a rank,
//! file, or diagonal, the set of squares strictly between them.
//!
//! Used by the move generator's in-check destination mask (spec.md §4.2):
//! when a single checker exists, legal non-king moves must land on
//! `ray_between(checker, king) | {checker}`.

use crate::bitboard::Bitboard;
use crate::types::Square;
use once_cell::sync::Lazy;

const DIRECTIONS: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

fn ray_cast(from: Square, dir: (i8, i8)) -> Vec<Square> {
    let mut squares = Vec::new();
    let mut file = from.file() as i8 + dir.0;
    let mut rank = from.rank() as i8 + dir.1;
    while (0..8).contains(&file) && (0..8).contains(&rank) {
        squares.push(Square::from_file_rank(file as u8, rank as u8));
        file += dir.0;
        rank += dir.1;
    }
    squares
}

static BETWEEN: Lazy<[[Bitboard; 64]; 64]> = Lazy::new(|| {
    let mut table = [[Bitboard::EMPTY; 64]; 64];
    for from_idx in 0..64u8 {
        let from = Square::new(from_idx);
        for dir in DIRECTIONS {
            let ray = ray_cast(from, dir);
            let mut accum = Bitboard::EMPTY;
            for &sq in &ray {
                table[from.index()][sq.index()] = accum;
                accum |= Bitboard::from_square(sq);
            }
        }
    }
    table
});

/// Squares strictly between `from` and `to` if they share a rank, file, or
/// diagonal; empty otherwise (including when `from == to`).
#[must_use]
pub fn ray_between(from: Square, to: Square) -> Bitboard {
    BETWEEN[from.index()][to.index()]
}

/// Squares on the ray from `from` through `to` and beyond, to the board
/// edge, inclusive of `to`. Empty if not aligned. Used for pin-ray
/// restriction of sliders (spec.md §4.2 step 5).
#[must_use]
pub fn ray_through(from: Square, to: Square) -> Bitboard {
    if from == to {
        return Bitboard::EMPTY;
    }
    let df = to.file() as i8 - from.file() as i8;
    let dr = to.rank() as i8 - from.rank() as i8;
    let dir = (df.signum(), dr.signum());
    let aligned = df == 0 || dr == 0 || df.abs() == dr.abs();
    if !aligned {
        return Bitboard::EMPTY;
    }
    let mut accum = Bitboard::EMPTY;
    for sq in ray_cast(from, dir) {
        accum |= Bitboard::from_square(sq);
    }
    accum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_excludes_endpoints() {
        let a1 = Square::from_file_rank(0, 0);
        let a8 = Square::from_file_rank(0, 7);
        let between = ray_between(a1, a8);
        assert!(!between.contains(a1));
        assert!(!between.contains(a8));
        assert_eq!(between.popcount(), 6);
    }

    #[test]
    fn between_is_empty_unless_aligned() {
        let a1 = Square::from_file_rank(0, 0);
        let b3 = Square::from_file_rank(1, 2);
        assert!(ray_between(a1, b3).is_empty());
    }

    #[test]
    fn between_is_symmetric_on_diagonals() {
        let a1 = Square::from_file_rank(0, 0);
        let d4 = Square::from_file_rank(3, 3);
        assert_eq!(ray_between(a1, d4).popcount(), 2);
    }
}
