//! Bishop, rook, and queen moves (spec.md §4.2 step 5). Pinned sliders are
//! restricted to their pin ray; unpinned sliders move freely within the
//! destination mask. Queens generate as rook + bishop.

use crate::attacks;
use crate::bitboard::Bitboard;
use crate::position::Position;
use crate::types::{Move, MoveList, PieceKind, Square};

pub(crate) fn generate_slider_moves(
    pos: &Position,
    out: &mut MoveList,
    king_sq: Square,
    dest_mask: Bitboard,
    kind: PieceKind,
) {
    let us = pos.side_to_move;
    let them = us.opposite();
    let occ = pos.all_occupied;

    for from in pos.pieces[us.index()][kind.index()].iter() {
        let mut targets = attacks::attacks_for(kind, from, occ) & dest_mask;

        let pinned_orthogonally = pos.orthogonal_pins.contains(from);
        let pinned_diagonally = pos.diagonal_pins.contains(from);
        if pinned_orthogonally || pinned_diagonally {
            // Restricting to the pin ray naturally zeroes out moves for a
            // piece pinned along an axis it cannot itself move on (e.g. a
            // rook pinned diagonally has no overlap with the diagonal ray).
            targets &= attacks::ray_through(king_sq, from);
        }

        for to in targets.iter() {
            if pos.occupied[them.index()].contains(to) {
                out.push(Move::capture(from, to));
            } else {
                out.push(Move::quiet(from, to));
            }
        }
    }
}
