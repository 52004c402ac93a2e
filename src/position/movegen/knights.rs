//! Knight moves (spec.md §4.2 step 4): pinned knights have no legal moves
//! at all and are skipped entirely.

use super::is_pinned;
use crate::attacks;
use crate::bitboard::Bitboard;
use crate::position::Position;
use crate::types::{Move, MoveList, Square};

pub(crate) fn generate_knight_moves(pos: &Position, out: &mut MoveList, _king_sq: Square, dest_mask: Bitboard) {
    let us = pos.side_to_move;
    let them = us.opposite();
    for from in pos.pieces[us.index()][crate::types::PieceKind::Knight.index()].iter() {
        if is_pinned(pos, from) {
            continue;
        }
        let targets = attacks::knight_attacks(from) & dest_mask;
        for to in targets.iter() {
            if pos.occupied[them.index()].contains(to) {
                out.push(Move::capture(from, to));
            } else {
                out.push(Move::quiet(from, to));
            }
        }
    }
}
