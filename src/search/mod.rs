//! Iterative-deepening PVS search driver (spec.md §4.5-§4.9).
//!
//! [`Worker`] owns everything one search thread touches exclusively: the
//! position stack, history tables, NNUE accumulator stack, and search stack
//! (spec.md §5: "thread-local... form a happens-before chain by virtue of
//! being thread-local"). Only the transposition table and a handful of
//! atomics are shared across workers (`smp.rs`).

pub mod lmr;
pub mod order;
mod pvs;
pub mod sink;
pub mod smp;
pub mod time;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::history::{HistoryTables, PlyMove};
use crate::nnue::{NnueNetwork, NnueState};
use crate::position::Game;
use crate::tt::TranspositionTable;
use crate::types::{Color, Move, PieceKind, MAX_DEPTH};

pub use sink::{InfoSink, NullSink, ScoreBound, SearchInfo};
pub use time::{Clock, Limits};

pub const SCORE_INF: i32 = crate::tt::SCORE_INF;
pub const MATE_SCORE: i32 = SCORE_INF;
pub const MATE_THRESHOLD: i32 = SCORE_INF - MAX_DEPTH as i32;
pub const DRAW_SCORE: i32 = 0;

#[inline]
#[must_use]
pub fn mate_in(ply: usize) -> i32 {
    MATE_SCORE - ply as i32
}

#[inline]
#[must_use]
pub fn mated_in(ply: usize) -> i32 {
    -MATE_SCORE + ply as i32
}

#[inline]
#[must_use]
pub fn is_mate_score(score: i32) -> bool {
    score.abs() >= MATE_THRESHOLD
}

/// Squeezes a raw eval into `(-SCORE_INF, SCORE_INF)`, away from the mate
/// range (spec.md §4.5 "all arithmetic carefully clamps via `clampEval`").
#[inline]
#[must_use]
pub fn clamp_eval(score: i32) -> i32 {
    score.clamp(-MATE_THRESHOLD + 1, MATE_THRESHOLD - 1)
}

/// Tunable search constants (spec.md §4.5-§4.7 name the heuristics; exact
/// magnitudes aren't pinned by the spec and are tuned informally here,
/// recorded in DESIGN.md).
#[derive(Clone, Debug)]
pub struct SearchParams {
    pub nmp_base_reduction: i32,
    pub nmp_depth_divisor: i32,
    pub nmp_eval_divisor: i32,
    pub nmp_eval_max_reduction: i32,
    pub nmp_verification_depth: i32,
    pub rfp_max_depth: i32,
    pub rfp_margin: i32,
    pub iir_min_depth: i32,
    pub fp_offset: i32,
    pub fp_margin: i32,
    pub lmp_offset: i32,
    pub lmp_mul: i32,
    pub see_quiet_margin: i32,
    pub see_noisy_margin: i32,
    pub se_min_depth: i32,
    pub se_depth_margin: i32,
    pub qs_fp_margin: i32,
    pub aspiration_initial_delta: i32,
    pub aspiration_min_depth: i32,
    pub correction_history_cap: i32,
    pub history_bonus_max: i32,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            nmp_base_reduction: 4,
            nmp_depth_divisor: 3,
            nmp_eval_divisor: 200,
            nmp_eval_max_reduction: 3,
            nmp_verification_depth: 14,
            rfp_max_depth: 8,
            rfp_margin: 75,
            iir_min_depth: 4,
            fp_offset: 100,
            fp_margin: 90,
            lmp_offset: 3,
            lmp_mul: 2,
            see_quiet_margin: 60,
            see_noisy_margin: 20,
            se_min_depth: 4,
            se_depth_margin: 2,
            qs_fp_margin: 120,
            aspiration_initial_delta: 10,
            aspiration_min_depth: 5,
            correction_history_cap: 1024,
            history_bonus_max: 1896,
        }
    }
}

/// One ply of the search stack (spec.md §3 "`[staticEval, move, piece,
/// inCheck, reduction]`"). `stm`/`mv` together let a descendant reconstruct
/// the continuation-history context of its ancestors.
#[derive(Clone, Copy)]
pub(crate) struct StackEntry {
    pub static_eval: i32,
    pub mv: Move,
    pub piece: Option<PieceKind>,
    pub stm: Color,
    pub in_check: bool,
    pub reduction: i32,
    pub excluded: Move,
}

impl Default for StackEntry {
    fn default() -> Self {
        StackEntry {
            static_eval: 0,
            mv: Move::null(),
            piece: None,
            stm: Color::White,
            in_check: false,
            reduction: 0,
            excluded: Move::null(),
        }
    }
}

/// Root search outcome for one completed (or partially-completed) depth.
#[derive(Clone, Debug)]
pub struct RootResult {
    pub depth: u32,
    pub sel_depth: u32,
    pub score: i32,
    pub pv: Vec<Move>,
    pub nodes: u64,
    pub bound: Option<ScoreBound>,
}

/// Everything one search thread owns exclusively (spec.md §5). Not `Sync`;
/// each worker lives on its own OS thread (`smp.rs`).
pub struct Worker {
    pub tt: Arc<TranspositionTable>,
    pub game: Game,
    pub nnue: NnueState,
    pub history: HistoryTables,
    pub params: SearchParams,
    pub(crate) stack: Vec<StackEntry>,
    pv_table: Vec<Vec<Move>>,
    pv_len: Vec<usize>,
    pub nodes: u64,
    pub sel_depth: usize,
    pub stop: Arc<AtomicBool>,
    pub is_main: bool,
    pub(crate) clock: Option<Clock>,
    pub(crate) hard_nodes: Option<u64>,
    pub(crate) soft_nodes: Option<u64>,
    pub(crate) mate_limit: Option<u8>,
    pub(crate) root_move_nodes: std::collections::HashMap<Move, u64>,
    pub contempt: i32,
    pub chess960: bool,
    /// Recursion guard for NMP's verification search (spec.md §4.5 step 9):
    /// raised while a verification search is in flight so a nested null move
    /// can't re-enter it below the ply that requested it.
    pub(crate) min_nmp_ply: i32,
    /// Root moves already claimed by an earlier MultiPV line this iteration.
    pub(crate) root_excluded: Vec<Move>,
    /// Non-empty iff the driver restricted the root to a `searchmoves` subset.
    pub(crate) root_search_moves: Vec<Move>,
}

const STACK_LEN: usize = MAX_DEPTH + 8;

impl Worker {
    #[must_use]
    pub fn new(tt: Arc<TranspositionTable>, network: Arc<NnueNetwork>, is_main: bool) -> Self {
        Worker {
            tt,
            game: Game::startpos(),
            nnue: NnueState::new(network),
            history: HistoryTables::new(),
            params: SearchParams::default(),
            stack: vec![StackEntry::default(); STACK_LEN],
            pv_table: vec![Vec::with_capacity(STACK_LEN); STACK_LEN],
            pv_len: vec![0; STACK_LEN],
            nodes: 0,
            sel_depth: 0,
            stop: Arc::new(AtomicBool::new(false)),
            is_main,
            clock: None,
            hard_nodes: None,
            soft_nodes: None,
            mate_limit: None,
            root_move_nodes: std::collections::HashMap::new(),
            contempt: 0,
            chess960: false,
            min_nmp_ply: 0,
            root_excluded: Vec::new(),
            root_search_moves: Vec::new(),
        }
    }

    pub fn set_position(&mut self, game: Game) {
        self.nnue.init(game.current());
        self.game = game;
    }

    /// Zeroes history tables between games (spec.md §3 "Lifecycles").
    pub fn new_game(&mut self) {
        self.history.clear();
    }

    pub(crate) fn should_stop_hard(&self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return true;
        }
        if let Some(hard) = self.hard_nodes {
            if self.nodes >= hard {
                return true;
            }
        }
        // Batch granularity: only the main thread consults the wall clock,
        // and only every 1024 nodes (spec.md §4.8).
        if self.is_main && self.nodes % 1024 == 0 {
            if let Some(clock) = &self.clock {
                if clock.expired_hard() {
                    return true;
                }
            }
        }
        false
    }

    fn do_move(&mut self, mv: Move) {
        let pos = self.game.current();
        let stm = pos.side_to_move;
        let moving = pos.piece_at(mv.from()).expect("move source occupied").kind;
        let captured = if mv.is_en_passant() {
            Some(PieceKind::Pawn)
        } else {
            pos.piece_at(mv.to()).map(|p| p.kind)
        };
        let ep_capture_sq = if mv.is_en_passant() {
            Some(crate::types::Square::from_file_rank(mv.to().file(), mv.from().rank()))
        } else {
            None
        };
        let prev_king_sq = [pos.king_square(Color::White), pos.king_square(Color::Black)];

        self.game.make_move(mv);

        let new_pos = self.game.current();
        let new_king_sq = [new_pos.king_square(Color::White), new_pos.king_square(Color::Black)];
        self.nnue
            .push_update(mv, stm, moving, captured, ep_capture_sq, prev_king_sq, new_king_sq);
        self.nodes += 1;
    }

    fn undo_move(&mut self) {
        self.game.unmake_move();
        self.nnue.undo();
    }

    /// Null moves never change piece placement, so `from == to == a1` makes
    /// the enqueued delta cancel to nothing — the NNUE stack still needs an
    /// entry to stay in lockstep with the game stack.
    fn do_null_move(&mut self) {
        let pos = self.game.current();
        let stm = pos.side_to_move;
        let king_sq = [pos.king_square(Color::White), pos.king_square(Color::Black)];
        self.game.make_null_move();
        self.nnue
            .push_update(Move::null(), stm, PieceKind::Pawn, None, None, king_sq, king_sq);
        self.nodes += 1;
    }

    fn undo_null_move(&mut self) {
        self.game.unmake_move();
        self.nnue.undo();
    }

    /// Raw NNUE score, material-scaled, contempt-adjusted, and corrected by
    /// the history tables (spec.md §4.3 "Material scaling correction").
    pub(crate) fn static_eval(&mut self, ply: usize) -> i32 {
        let raw = self.nnue.evaluate(self.game.current());
        let pos = self.game.current();
        let stm = pos.side_to_move;

        const MATERIAL_SCALE_OFFSET: i32 = 24_000;
        const MATERIAL_SCALE_DIVISOR: i32 = 32_000;
        let material = material_count(pos);
        let mut score = raw * (material + MATERIAL_SCALE_OFFSET) / MATERIAL_SCALE_DIVISOR;

        let contempt_stm = if stm == Color::White { self.contempt } else { -self.contempt };
        score += contempt_stm;

        score += self.history.pawn_correction(stm, pos.pawn_key)
            + self.history.major_correction(stm, pos.major_key)
            + self.history.minor_correction(stm, pos.minor_key)
            + self.history.nonpawn_correction(stm, pos.nonpawn_key);

        if ply > 0 {
            let prev = self.stack[ply - 1];
            if let (false, Some(piece)) = (prev.mv.is_null(), prev.piece) {
                score += self
                    .history
                    .continuation_correction(stm, piece, prev.mv.to(), PlyMove {
                        color: prev.stm,
                        piece,
                        to: prev.mv.to(),
                    });
            }
        }

        clamp_eval(score)
    }

    /// Continuation-history context for the current ply: the `(piece, to)`
    /// of the moves made 1, 2, and 4 plies back, most recent first
    /// (spec.md §4.5 step 13: "continuation history at offsets 1, 2, 4").
    pub(crate) fn continuation_context(&self, ply: usize) -> [Option<PlyMove>; 3] {
        let mut out = [None; 3];
        for (i, offset) in [1usize, 2, 4].iter().enumerate() {
            if ply >= *offset {
                let entry = &self.stack[ply - offset];
                if !entry.mv.is_null() {
                    if let Some(piece) = entry.piece {
                        out[i] = Some(PlyMove {
                            color: entry.stm,
                            piece,
                            to: entry.mv.to(),
                        });
                    }
                }
            }
        }
        out
    }

    fn set_pv(&mut self, ply: usize, mv: Move) {
        let child_len = self.pv_len[ply + 1];
        let mut new_pv = Vec::with_capacity(child_len + 1);
        new_pv.push(mv);
        new_pv.extend_from_slice(&self.pv_table[ply + 1][..child_len]);
        self.pv_len[ply] = new_pv.len();
        self.pv_table[ply] = new_pv;
    }

    fn clear_pv(&mut self, ply: usize) {
        self.pv_len[ply] = 0;
    }

    #[must_use]
    pub(crate) fn pv_at(&self, ply: usize) -> &[Move] {
        &self.pv_table[ply][..self.pv_len[ply]]
    }
}

/// Weighted non-king material on the board, used only by the static-eval
/// scaling term.
fn material_count(pos: &crate::position::Position) -> i32 {
    use crate::types::PIECE_KINDS;
    let mut total = 0;
    for color in [Color::White, Color::Black] {
        for kind in PIECE_KINDS {
            if kind == PieceKind::King {
                continue;
            }
            total += pos.pieces[color.index()][kind.index()].popcount() as i32 * kind.value();
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_scores_are_ply_sensitive() {
        assert!(mate_in(1) > mate_in(3));
        assert!(mated_in(1) < mated_in(3));
    }

    #[test]
    fn clamp_eval_never_reaches_mate_threshold() {
        assert!(clamp_eval(i32::MAX) < MATE_THRESHOLD);
        assert!(clamp_eval(i32::MIN) > -MATE_THRESHOLD);
    }

    #[test]
    fn is_mate_score_detects_near_mate_values() {
        assert!(is_mate_score(mate_in(5)));
        assert!(!is_mate_score(250));
    }
}
