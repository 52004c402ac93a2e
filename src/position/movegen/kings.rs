//! King moves and castling (spec.md §4.2 steps 1 and 6).
//!
//! Castling targets are the *rook* origin squares (king-captures-own-rook
//! FRC encoding, spec.md §3). A castling move is only emitted if the path
//! is clear and no square on the king's path (including its start) is
//! attacked.

use crate::attacks;
use crate::bitboard::Bitboard;
use crate::position::Position;
use crate::types::{Color, Move, MoveList, Square};

pub(crate) fn generate_king_moves(
    pos: &Position,
    out: &mut MoveList,
    king_sq: Square,
    occ_minus_king: Bitboard,
    captures_only: bool,
) {
    let us = pos.side_to_move;
    let them = us.opposite();
    let own_occ = pos.occupied[us.index()];
    let mut targets = attacks::king_attacks(king_sq) & !own_occ;
    if captures_only {
        targets &= pos.occupied[them.index()];
    }
    for to in targets.iter() {
        if pos.is_square_attacked(to, them, occ_minus_king) {
            continue;
        }
        if pos.occupied[them.index()].contains(to) {
            out.push(Move::capture(king_sq, to));
        } else {
            out.push(Move::quiet(king_sq, to));
        }
    }

    if captures_only || !pos.checkers.is_empty() {
        return;
    }
    generate_castling(pos, out, king_sq, us, them);
}

fn generate_castling(pos: &Position, out: &mut MoveList, king_sq: Square, us: Color, them: Color) {
    for (rook_sq, is_kingside) in [
        (pos.castling.king_side(us), true),
        (pos.castling.queen_side(us), false),
    ] {
        let Some(rook_sq) = rook_sq else { continue };
        if !castling_path_clear(pos, king_sq, rook_sq, is_kingside) {
            continue;
        }
        if !castling_path_safe(pos, king_sq, rook_sq, is_kingside, them) {
            continue;
        }
        let mv = if is_kingside {
            Move::castle_kingside(king_sq, rook_sq)
        } else {
            Move::castle_queenside(king_sq, rook_sq)
        };
        out.push(mv);
    }
}

/// The king's and rook's final squares (standard chess destinations), used
/// to derive both the emptiness check and the "king's path" safety check
/// under Chess960, where king/rook start squares may already overlap the
/// destination squares.
fn castling_squares(king_sq: Square, rook_sq: Square, is_kingside: bool) -> (Square, Square) {
    let rank = king_sq.rank();
    let king_to = Square::from_file_rank(if is_kingside { 6 } else { 2 }, rank);
    let rook_to = Square::from_file_rank(if is_kingside { 5 } else { 3 }, rank);
    let _ = rook_sq;
    (king_to, rook_to)
}

fn castling_path_clear(pos: &Position, king_sq: Square, rook_sq: Square, is_kingside: bool) -> bool {
    let (king_to, rook_to) = castling_squares(king_sq, rook_sq, is_kingside);
    let occ_without_castlers =
        pos.all_occupied & !Bitboard::from_square(king_sq) & !Bitboard::from_square(rook_sq);

    let king_span = attacks::ray_between(king_sq, king_to) | Bitboard::from_square(king_to);
    let rook_span = attacks::ray_between(rook_sq, rook_to) | Bitboard::from_square(rook_to);
    (king_span & occ_without_castlers).is_empty() && (rook_span & occ_without_castlers).is_empty()
}

fn castling_path_safe(
    pos: &Position,
    king_sq: Square,
    rook_sq: Square,
    is_kingside: bool,
    them: Color,
) -> bool {
    let (king_to, _) = castling_squares(king_sq, rook_sq, is_kingside);
    let occ_without_castlers =
        pos.all_occupied & !Bitboard::from_square(king_sq) & !Bitboard::from_square(rook_sq);
    let king_path = attacks::ray_between(king_sq, king_to)
        | Bitboard::from_square(king_to)
        | Bitboard::from_square(king_sq);
    for sq in king_path.iter() {
        if pos.is_square_attacked(sq, them, occ_without_castlers) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fen::parse_fen;

    #[test]
    fn castling_blocked_by_attacked_transit_square() {
        crate::attacks::init();
        // White king e1, rook h1, black rook on f8 attacks f1 (on the king's path).
        let pos = parse_fen("5r2/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        let moves = pos.generate_moves();
        assert!(!moves.iter().any(|m| m.is_castle()));
    }

    #[test]
    fn castling_available_when_path_clear_and_safe() {
        crate::attacks::init();
        let pos = parse_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        let moves = pos.generate_moves();
        assert!(moves.iter().any(|m| m.is_castle_kingside()));
    }
}
