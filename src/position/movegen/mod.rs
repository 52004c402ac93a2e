//! Legal move generation (spec.md §4.2): pin-and-check aware, not a
//! pseudolegal-then-filter design.
//!
//! The algorithm follows spec.md §4.2 directly:
//! 1. King moves first, filtered by `is_square_attacked` on occupancy with
//!    the king removed (so sliders see through it). If more than one
//!    checker exists, this is the entire legal move list.
//! 2. Otherwise compute a destination mask: `rayBetween(checker, king) ∪
//!    {checker}` under single check, `~friendlyPieces` otherwise.
//! 3. Pawns, knights, and sliders each apply the destination mask plus
//!    their own pin restrictions.

mod kings;
mod knights;
mod pawns;
mod sliders;

use crate::attacks;
use crate::bitboard::Bitboard;
use crate::position::Position;
use crate::types::{Color, MoveList, PieceKind, Square};

pub(crate) fn generate(pos: &Position, out: &mut MoveList, captures_only: bool) {
    let us = pos.side_to_move;
    let them = us.opposite();
    let king_sq = pos.king_square(us);
    let occ_minus_king = pos.all_occupied & !Bitboard::from_square(king_sq);

    kings::generate_king_moves(pos, out, king_sq, occ_minus_king, captures_only);

    if pos.checkers.popcount() > 1 {
        // Double check: only the king can move.
        return;
    }

    let dest_mask = if let Some(checker) = pos.checkers.lsb() {
        attacks::ray_between(checker, king_sq) | Bitboard::from_square(checker)
    } else {
        !pos.occupied[us.index()]
    };
    let dest_mask = if captures_only {
        dest_mask & pos.occupied[them.index()]
    } else {
        dest_mask
    };

    pawns::generate_pawn_moves(pos, out, king_sq, dest_mask, captures_only);
    knights::generate_knight_moves(pos, out, king_sq, dest_mask);
    sliders::generate_slider_moves(pos, out, king_sq, dest_mask, PieceKind::Bishop);
    sliders::generate_slider_moves(pos, out, king_sq, dest_mask, PieceKind::Rook);
    sliders::generate_slider_moves(pos, out, king_sq, dest_mask, PieceKind::Queen);
}

/// True iff `sq` is pinned (orthogonally or diagonally) to its own king.
#[inline]
pub(crate) fn is_pinned(pos: &Position, sq: Square) -> bool {
    (pos.orthogonal_pins | pos.diagonal_pins).contains(sq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    fn setup() {
        crate::attacks::init();
    }

    #[test]
    fn startpos_has_twenty_moves() {
        setup();
        let pos = Position::startpos();
        assert_eq!(pos.generate_moves().len(), 20);
    }

    #[test]
    fn kiwipete_move_count() {
        setup();
        let pos = crate::position::fen::parse_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        assert_eq!(pos.generate_moves().len(), 48);
    }

    #[test]
    fn double_check_only_king_moves() {
        setup();
        // Black king on e8 double-checked by rook on e1 and bishop on h5.
        let pos = crate::position::fen::parse_fen("4k3/8/8/7B/8/8/8/4R1K1 b - - 0 1").unwrap();
        if pos.checkers.popcount() > 1 {
            for mv in pos.generate_moves().iter() {
                assert_eq!(mv.from(), pos.king_square(Color::Black));
            }
        }
    }
}
