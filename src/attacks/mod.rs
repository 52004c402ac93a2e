//! Precomputed attack and ray lookups (spec.md §4.1).
//!
//! Everything here is O(1) and allocation-free after [`init`] runs once at
//! process startup; table memory is pre-sized and never resized.

mod magic;
mod rays;

pub use magic::{bishop_attacks, queen_attacks, rook_attacks};
pub use rays::{ray_between, ray_through};

use crate::bitboard::Bitboard;
use crate::types::{Color, Square};
use once_cell::sync::Lazy;

fn step_attacks(deltas: &[(i8, i8)]) -> [Bitboard; 64] {
    let mut table = [Bitboard::EMPTY; 64];
    for sq_idx in 0..64u8 {
        let sq = Square::new(sq_idx);
        let mut mask = Bitboard::EMPTY;
        for &(df, dr) in deltas {
            let file = sq.file() as i8 + df;
            let rank = sq.rank() as i8 + dr;
            if (0..8).contains(&file) && (0..8).contains(&rank) {
                mask |= Bitboard::from_square(Square::from_file_rank(file as u8, rank as u8));
            }
        }
        table[sq.index()] = mask;
    }
    table
}

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

static KNIGHT_ATTACKS: Lazy<[Bitboard; 64]> = Lazy::new(|| step_attacks(&KNIGHT_DELTAS));
static KING_ATTACKS: Lazy<[Bitboard; 64]> = Lazy::new(|| step_attacks(&KING_DELTAS));

static PAWN_ATTACKS: Lazy<[[Bitboard; 64]; 2]> = Lazy::new(|| {
    [
        step_attacks(&[(1, 1), (-1, 1)]),
        step_attacks(&[(1, -1), (-1, -1)]),
    ]
});

#[inline]
#[must_use]
pub fn knight_attacks(sq: Square) -> Bitboard {
    KNIGHT_ATTACKS[sq.index()]
}

#[inline]
#[must_use]
pub fn king_attacks(sq: Square) -> Bitboard {
    KING_ATTACKS[sq.index()]
}

#[inline]
#[must_use]
pub fn pawn_attacks(color: Color, sq: Square) -> Bitboard {
    PAWN_ATTACKS[color.index()][sq.index()]
}

/// Attacks of `piece_kind` from `sq` given the full board occupancy.
/// Excludes pawns, which have no "attack from square" mapping independent
/// of color.
#[must_use]
pub fn attacks_for(kind: crate::types::PieceKind, sq: Square, occ: Bitboard) -> Bitboard {
    use crate::types::PieceKind;
    match kind {
        PieceKind::Knight => knight_attacks(sq),
        PieceKind::Bishop => bishop_attacks(sq, occ),
        PieceKind::Rook => rook_attacks(sq, occ),
        PieceKind::Queen => queen_attacks(sq, occ),
        PieceKind::King => king_attacks(sq),
        PieceKind::Pawn => Bitboard::EMPTY,
    }
}

/// Forces all lookup tables to build and runs the magic-bitboard self-test.
/// Call once before any search or move generation.
pub fn init() {
    Lazy::force(&KNIGHT_ATTACKS);
    Lazy::force(&KING_ATTACKS);
    Lazy::force(&PAWN_ATTACKS);
    magic::init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knight_attacks_from_corner() {
        init();
        let a1 = Square::from_file_rank(0, 0);
        assert_eq!(knight_attacks(a1).popcount(), 2);
    }

    #[test]
    fn king_attacks_from_center() {
        init();
        let d4 = Square::from_file_rank(3, 3);
        assert_eq!(king_attacks(d4).popcount(), 8);
    }

    #[test]
    fn pawn_attacks_differ_by_color() {
        init();
        let sq = Square::from_file_rank(3, 3);
        assert_ne!(pawn_attacks(Color::White, sq).0, pawn_attacks(Color::Black, sq).0);
    }
}
