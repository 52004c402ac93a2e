//! Static Exchange Evaluation: the material balance of all captures on a
//! single square, played out from least-valuable attacker to least-valuable
//! attacker, with x-ray attackers revealed as sliders get removed.

use crate::attacks;
use crate::bitboard::Bitboard;
use crate::types::{Color, Move, PieceKind, PIECE_KINDS};

use super::Position;

const SEE_VALUES: [i32; 6] = [100, 320, 330, 500, 900, 20000];

const MAX_EXCHANGE_DEPTH: usize = 32;

/// Material balance of playing out the full capture sequence on `mv`'s
/// destination square, from the mover's perspective. Positive means the
/// initial capture wins material even after all recaptures.
#[must_use]
pub fn see(pos: &Position, mv: Move) -> i32 {
    let from = mv.from();
    let to = mv.to();

    let Some(attacker) = pos.piece_at(from) else {
        return 0;
    };

    let victim_kind = if mv.is_en_passant() {
        PieceKind::Pawn
    } else {
        match pos.piece_at(to) {
            Some(p) => p.kind,
            None => return 0,
        }
    };

    let ep_captured_sq = if mv.is_en_passant() {
        Some(crate::types::Square::from_file_rank(to.file(), from.rank()))
    } else {
        None
    };

    see_exchange(pos, from, to, ep_captured_sq, attacker.kind, victim_kind)
}

/// True iff `see(pos, mv) >= threshold`; used by noisy-move pruning thresholds
/// without materializing the exact balance.
#[must_use]
pub fn see_ge(pos: &Position, mv: Move, threshold: i32) -> bool {
    see(pos, mv) >= threshold
}

fn see_exchange(
    pos: &Position,
    from: crate::types::Square,
    to: crate::types::Square,
    ep_captured_sq: Option<crate::types::Square>,
    mut current_attacker: PieceKind,
    victim_kind: PieceKind,
) -> i32 {
    let mut gain = [0i32; MAX_EXCHANGE_DEPTH];
    let mut depth = 0usize;

    let mut occ = pos.all_occupied;
    if let Some(ep_sq) = ep_captured_sq {
        occ &= !Bitboard::from_square(ep_sq);
    }

    let mut side = pos.side_to_move;
    let mut from_bb = Bitboard::from_square(from);
    gain[0] = SEE_VALUES[victim_kind.index()];

    loop {
        occ &= !from_bb;
        side = side.opposite();

        let attackers = all_attackers_to(pos, to, occ);
        let side_attackers = attackers & pos.occupied[side.index()] & occ;
        if side_attackers.is_empty() {
            break;
        }

        depth += 1;
        if depth >= MAX_EXCHANGE_DEPTH {
            break;
        }

        let (lva_kind, lva_sq) = least_valuable_attacker(pos, side_attackers, side);

        gain[depth] = SEE_VALUES[current_attacker.index()] - gain[depth - 1];
        if (-gain[depth - 1]).max(gain[depth]) < 0 {
            break;
        }

        if lva_kind == PieceKind::King {
            let opponent_attackers = attackers & pos.occupied[side.opposite().index()] & occ & !from_bb;
            if !opponent_attackers.is_empty() {
                break;
            }
        }

        current_attacker = lva_kind;
        from_bb = Bitboard::from_square(lva_sq);
    }

    while depth > 0 {
        depth -= 1;
        gain[depth] = -(-gain[depth]).max(gain[depth + 1]);
    }
    gain[0]
}

/// All attackers (either color) to `sq` given `occ`. Recomputed from scratch
/// each ply of the exchange since the occupancy bitboard changes.
fn all_attackers_to(pos: &Position, sq: crate::types::Square, occ: Bitboard) -> Bitboard {
    pos.attackers_to(sq, occ, Color::White) | pos.attackers_to(sq, occ, Color::Black)
}

fn least_valuable_attacker(pos: &Position, attackers: Bitboard, color: Color) -> (PieceKind, crate::types::Square) {
    for kind in PIECE_KINDS {
        let candidates = attackers & pos.pieces[color.index()][kind.index()];
        if let Some(sq) = candidates.lsb() {
            return (kind, sq);
        }
    }
    unreachable!("least_valuable_attacker called with no attackers")
}

/// Quick SEE-style safety check for a *quiet* move: true unless a cheaper
/// enemy piece already attacks the destination square. Used by quiet-move
/// pruning heuristics that don't need the full exchange evaluation.
#[must_use]
pub fn quiet_move_is_safe(pos: &Position, mv: Move) -> bool {
    let from = mv.from();
    let to = mv.to();
    let Some(piece) = pos.piece_at(from) else {
        return true;
    };
    let us = piece.color;
    let them = us.opposite();
    let piece_value = SEE_VALUES[piece.kind.index()];

    let occ = (pos.all_occupied & !Bitboard::from_square(from)) | Bitboard::from_square(to);

    if piece.kind != PieceKind::Pawn
        && !(attacks::pawn_attacks(us, to) & pos.pieces[them.index()][PieceKind::Pawn.index()]).is_empty()
    {
        return false;
    }
    if piece_value > SEE_VALUES[PieceKind::Knight.index()]
        && !(attacks::knight_attacks(to) & pos.pieces[them.index()][PieceKind::Knight.index()]).is_empty()
    {
        return false;
    }
    if piece_value > SEE_VALUES[PieceKind::Bishop.index()] {
        let bishops = pos.pieces[them.index()][PieceKind::Bishop.index()];
        if !(attacks::bishop_attacks(to, occ) & bishops).is_empty() {
            return false;
        }
    }
    if piece_value > SEE_VALUES[PieceKind::Rook.index()] {
        let rooks = pos.pieces[them.index()][PieceKind::Rook.index()];
        if !(attacks::rook_attacks(to, occ) & rooks).is_empty() {
            return false;
        }
        let queens = pos.pieces[them.index()][PieceKind::Queen.index()];
        if !((attacks::bishop_attacks(to, occ) | attacks::rook_attacks(to, occ)) & queens).is_empty() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fen::parse_fen;
    use crate::types::Square;

    fn mv(pos: &Position, from: &str, to: &str) -> Move {
        let from = Square::from_str_opt(from).unwrap();
        let to = Square::from_str_opt(to).unwrap();
        pos.generate_moves()
            .iter()
            .find(|m| m.from() == from && m.to() == to)
            .copied()
            .unwrap_or(Move::capture(from, to))
    }

    #[test]
    fn simple_winning_capture() {
        crate::attacks::init();
        let pos = parse_fen("8/8/8/3p4/4P3/8/8/4K2k w - - 0 1").unwrap();
        assert_eq!(see(&pos, mv(&pos, "e4", "d5")), 100);
    }

    #[test]
    fn defended_pawn_is_equal_exchange() {
        crate::attacks::init();
        let pos = parse_fen("8/8/2p5/3p4/4P3/8/8/4K2k w - - 0 1").unwrap();
        assert_eq!(see(&pos, mv(&pos, "e4", "d5")), 0);
    }

    #[test]
    fn knight_takes_defended_pawn_loses_material() {
        crate::attacks::init();
        let pos = parse_fen("8/8/2p5/3p4/4N3/8/8/4K2k w - - 0 1").unwrap();
        assert!(see(&pos, mv(&pos, "e4", "d5")) < 0);
    }

    #[test]
    fn rook_xray_keeps_capture_winning() {
        crate::attacks::init();
        let pos = parse_fen("8/8/8/3r4/8/8/8/R2RK2k w - - 0 1").unwrap();
        assert_eq!(see(&pos, mv(&pos, "d1", "d5")), 500);
    }

    #[test]
    fn en_passant_counts_pawn_value() {
        crate::attacks::init();
        let pos = parse_fen("8/8/8/3Pp3/8/8/4K2k/8 w - e6 0 1").unwrap();
        let from = Square::from_str_opt("d5").unwrap();
        let to = Square::from_str_opt("e6").unwrap();
        let ep = Move::en_passant(from, to);
        assert_eq!(see(&pos, ep), 100);
    }
}
