//! Move ordering (spec.md §4.6): each move is scored into one of six named
//! buckets, then the caller pulls moves out highest-score-first via
//! [`ScoredMoveList::pick_best`] (an incremental selection sort — no full
//! sort is ever performed, so a beta cutoff after the first few moves costs
//! nothing for the rest of the list).

use crate::history::{HistoryTables, PlyMove};
use crate::position::{see, Position};
use crate::types::{Color, Move, MoveList, PieceKind, ScoredMoveList};

pub const TT_MOVE_SCORE: i32 = 700_000;
pub const GOOD_NOISY_BASE: i32 = 600_000;
pub const KILLER_SCORE: i32 = 500_000;
pub const COUNTER_SCORE: i32 = 400_000;
pub const QUIET_BASE: i32 = 200_000;
pub const BAD_NOISY_BASE: i32 = 50_000;

#[must_use]
fn victim_kind(pos: &Position, mv: Move) -> PieceKind {
    if mv.is_en_passant() {
        PieceKind::Pawn
    } else {
        pos.piece_at(mv.to()).map_or(PieceKind::Pawn, |p| p.kind)
    }
}

fn score_noisy(pos: &Position, mv: Move, history: &HistoryTables, stm: Color) -> i32 {
    let victim = victim_kind(pos, mv);
    let from_attacked = pos.threats.contains(mv.from());
    let to_attacked = pos.threats.contains(mv.to());
    let capthist = history.capture_score(stm, mv, victim, from_attacked, to_attacked);
    let base = if see::see_ge(pos, mv, 0) { GOOD_NOISY_BASE } else { BAD_NOISY_BASE };
    base + victim.value() * 10 + capthist
}

fn score_quiet(pos: &Position, mv: Move, history: &HistoryTables, stm: Color, conts: &[Option<PlyMove>]) -> i32 {
    let piece = pos.piece_at(mv.from()).map_or(PieceKind::Pawn, |p| p.kind);
    let from_attacked = pos.threats.contains(mv.from());
    let to_attacked = pos.threats.contains(mv.to());
    QUIET_BASE + history.quiet_score(stm, mv, piece, from_attacked, to_attacked, conts)
}

/// Scores every move in `moves` for the current position (spec.md §4.6's
/// bucket table). `conts` is the continuation-history chain (prior plies'
/// `(piece, to)`, most recent first) already sliced to the offsets the
/// caller wants consulted (1, 2, 4 plies back).
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn score_moves(
    pos: &Position,
    moves: &MoveList,
    history: &HistoryTables,
    tt_move: Move,
    killers: [Move; 2],
    counter: Move,
    conts: &[Option<PlyMove>],
) -> ScoredMoveList {
    let stm = pos.side_to_move;
    let mut list = ScoredMoveList::new();
    for &mv in moves.iter() {
        let score = if mv == tt_move {
            TT_MOVE_SCORE
        } else if mv.is_tactical() {
            score_noisy(pos, mv, history, stm)
        } else if mv == killers[0] || mv == killers[1] {
            KILLER_SCORE
        } else if mv == counter {
            COUNTER_SCORE
        } else {
            score_quiet(pos, mv, history, stm, conts)
        };
        list.push(mv, score);
    }
    list
}

/// Scores a captures-only list for quiescence search: the TT move, killers
/// and counters never appear among captures-only generation, so only the
/// noisy bucket applies.
#[must_use]
pub fn score_captures(pos: &Position, moves: &MoveList, history: &HistoryTables, tt_move: Move) -> ScoredMoveList {
    let stm = pos.side_to_move;
    let mut list = ScoredMoveList::new();
    for &mv in moves.iter() {
        let score = if mv == tt_move {
            TT_MOVE_SCORE
        } else {
            score_noisy(pos, mv, history, stm)
        };
        list.push(mv, score);
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fen::parse_fen;

    #[test]
    fn tt_move_outranks_everything() {
        crate::attacks::init();
        let pos = parse_fen(crate::START_FEN).unwrap();
        let moves = pos.generate_moves();
        let history = HistoryTables::new();
        let tt_move = moves.iter().next().copied().unwrap();
        let scored = score_moves(&pos, &moves, &history, tt_move, [Move::null(); 2], Move::null(), &[]);
        let top = scored.as_slice().iter().max_by_key(|m| m.score).unwrap();
        assert_eq!(top.mv, tt_move);
        assert_eq!(top.score, TT_MOVE_SCORE);
    }

    #[test]
    fn good_capture_outranks_quiet_move() {
        crate::attacks::init();
        let pos = parse_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let moves = pos.generate_moves();
        let history = HistoryTables::new();
        let scored = score_moves(&pos, &moves, &history, Move::null(), [Move::null(); 2], Move::null(), &[]);
        let capture = scored.as_slice().iter().find(|m| m.mv.is_capture()).unwrap();
        let quiet = scored.as_slice().iter().find(|m| m.mv.is_quiet()).unwrap();
        assert!(capture.score > quiet.score);
    }
}
