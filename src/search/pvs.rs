//! Recursive PVS core, quiescence search, and the root iterative-deepening
//! driver with aspiration windows (spec.md §4.5).

use std::sync::atomic::Ordering;
use std::time::Instant;

use super::lmr;
use super::order;
use super::sink::{InfoSink, ScoreBound};
use super::time::{Clock, Limits};
use super::{
    clamp_eval, is_mate_score, mate_in, mated_in, StackEntry, Worker, DRAW_SCORE, MATE_THRESHOLD, SCORE_INF,
};
use crate::history::PlyMove;
use crate::tt::Bound;
use crate::types::{Move, PieceKind};

#[must_use]
fn has_non_pawn_material(pos: &crate::position::Position) -> bool {
    let us = pos.side_to_move.index();
    !(pos.pieces[us][PieceKind::Knight.index()]
        | pos.pieces[us][PieceKind::Bishop.index()]
        | pos.pieces[us][PieceKind::Rook.index()]
        | pos.pieces[us][PieceKind::Queen.index()])
    .is_empty()
}

impl Worker {
    /// Principal-variation search over `[alpha, beta)` (spec.md §4.5's
    /// numbered steps; comment markers below follow that numbering).
    pub(crate) fn pvs(&mut self, mut alpha: i32, mut beta: i32, mut depth: i32, ply: usize, is_pv: bool, cut_node: bool) -> i32 {
        // 1. Termination: stop flag, node/time limits, draw by the 3 usual
        // rules, and a depth cap that falls back to a static read.
        if self.should_stop_hard() {
            return 0;
        }
        if ply > 0 && self.game.is_draw() {
            return DRAW_SCORE;
        }
        if ply >= crate::types::MAX_PLY {
            return self.static_eval(ply);
        }

        // 2. Mate distance pruning: no line can beat a mate already found
        // closer to the root, nor lose slower than one already proven.
        if ply > 0 {
            alpha = alpha.max(mated_in(ply));
            beta = beta.min(mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        let orig_alpha = alpha;
        let in_check = self.game.current().in_check();

        // 5. Check extension: never let a node search less than a single
        // ply while the side to move is in check.
        if in_check {
            depth += 1;
        }

        // 6. Drop into quiescence once depth is exhausted.
        if depth <= 0 {
            return self.qsearch(alpha, beta, ply);
        }

        self.sel_depth = self.sel_depth.max(ply);
        self.clear_pv(ply);

        let excluded = self.stack[ply].excluded;
        let key = self.game.current().key;

        // 3. TT probe.
        let tt_entry = self.tt.probe(key, ply);
        let tt_move = tt_entry.map_or(Move::null(), |e| e.best_move);
        let tt_was_pv = tt_entry.is_some_and(|e| e.was_pv) || is_pv;
        if let Some(entry) = tt_entry {
            if excluded.is_null() && !is_pv && i32::from(entry.depth) >= depth {
                let tt_score = i32::from(entry.score);
                let cutoff = match entry.bound {
                    Bound::Exact => true,
                    Bound::Lower => tt_score >= beta,
                    Bound::Upper => tt_score <= alpha,
                };
                if cutoff {
                    return tt_score;
                }
            }
        }

        // 4. Static eval + improving flag.
        let raw_eval = if in_check { -SCORE_INF } else { self.static_eval(ply) };
        self.stack[ply].static_eval = raw_eval;
        let tt_adjusted_eval = tt_entry.map_or(raw_eval, |e| match e.bound {
            Bound::Exact => i32::from(e.score),
            Bound::Lower if i32::from(e.score) > raw_eval => i32::from(e.score),
            Bound::Upper if i32::from(e.score) < raw_eval => i32::from(e.score),
            _ => raw_eval,
        });
        let improving =
            !in_check && ply >= 2 && !self.stack[ply - 2].in_check && raw_eval > self.stack[ply - 2].static_eval;
        self.stack[ply].in_check = in_check;

        if excluded.is_null() && !in_check {
            // 7. Internal iterative reduction: no (or too-shallow) TT move at
            // high enough depth means the ordering is unreliable, so shave a
            // ply rather than trust move ordering blindly.
            if !tt_entry.is_some_and(|e| i32::from(e.depth) + 1 >= depth) && depth >= self.params.iir_min_depth {
                depth -= 1;
            }

            // 8. Reverse futility pruning.
            if !is_pv && depth <= self.params.rfp_max_depth {
                let margin = self.params.rfp_margin * (depth - i32::from(improving));
                if tt_adjusted_eval - margin >= beta {
                    return beta + (tt_adjusted_eval - beta) / 3;
                }
            }

            // 9. Null-move pruning, with a zugzwang-guarding verification
            // search at high depths.
            if !is_pv
                && depth > 1
                && (ply as i32) >= self.min_nmp_ply
                && tt_adjusted_eval >= beta
                && has_non_pawn_material(self.game.current())
                && !self.game.current().from_null
            {
                let reduction = self.params.nmp_base_reduction
                    + depth / self.params.nmp_depth_divisor
                    + ((tt_adjusted_eval - beta) / self.params.nmp_eval_divisor).min(self.params.nmp_eval_max_reduction);
                self.do_null_move();
                let null_score = -self.pvs(-beta, -beta + 1, depth - reduction, ply + 1, false, !cut_node);
                self.undo_null_move();
                if self.stop.load(Ordering::Relaxed) {
                    return 0;
                }
                if null_score >= beta {
                    let verified = if depth > self.params.nmp_verification_depth {
                        let saved = self.min_nmp_ply;
                        self.min_nmp_ply = ply as i32 + (depth - reduction) * 3 / 4;
                        let v = self.pvs(beta - 1, beta, depth - reduction, ply, false, false);
                        self.min_nmp_ply = saved;
                        v >= beta
                    } else {
                        true
                    };
                    if verified {
                        return if is_mate_score(null_score) { beta } else { null_score };
                    }
                }
            }
        }

        let moves = self.game.current().generate_moves();
        let killers = self.history.killers(ply);
        let counter = if ply > 0 && !self.stack[ply - 1].mv.is_null() {
            self.history.counter(self.stack[ply - 1].mv.from(), self.stack[ply - 1].mv.to())
        } else {
            Move::null()
        };
        let conts = self.continuation_context(ply);
        let mut scored = order::score_moves(self.game.current(), &moves, &self.history, tt_move, killers, counter, &conts);

        let mut best_score = -SCORE_INF;
        let mut best_move = Move::null();
        let mut move_count = 0i32;
        let mut quiet_count = 0i32;
        let mut tried_quiets: Vec<Move> = Vec::new();
        let mut tried_captures: Vec<(Move, PieceKind)> = Vec::new();

        let mut idx = 0;
        while let Some(sm) = scored.pick_best(idx) {
            idx += 1;
            let mv = sm.mv;
            if mv == excluded {
                continue;
            }
            if ply == 0 {
                if !self.root_search_moves.is_empty() && !self.root_search_moves.contains(&mv) {
                    continue;
                }
                if self.root_excluded.contains(&mv) {
                    continue;
                }
            }

            let pos = self.game.current();
            let is_quiet = mv.is_quiet();

            // 10. Move-loop pruning for non-PV, non-mate-threatened nodes.
            if !is_pv && best_score > -MATE_THRESHOLD && move_count > 0 {
                if is_quiet {
                    // Futility pruning: this quiet move can't possibly raise
                    // alpha given the static eval, regardless of ordering.
                    if depth <= 8 && raw_eval + self.params.fp_offset + self.params.fp_margin * depth <= alpha {
                        continue;
                    }
                    // Late-move pruning: too many quiets already tried at
                    // this depth/improving state.
                    let lmp_limit = (self.params.lmp_offset + self.params.lmp_mul * depth * depth)
                        / if improving { 1 } else { 2 };
                    if quiet_count >= lmp_limit {
                        continue;
                    }
                }
                if depth <= 5 {
                    let margin = if is_quiet { self.params.see_quiet_margin } else { self.params.see_noisy_margin };
                    if !crate::position::see::see_ge(pos, mv, -margin * depth) {
                        continue;
                    }
                }
            }

            // 11. Singular extensions (only the TT move is a candidate).
            let mut extension = 0;
            if ply > 0
                && excluded.is_null()
                && mv == tt_move
                && depth >= self.params.se_min_depth
                && tt_entry.is_some_and(|e| matches!(e.bound, Bound::Lower | Bound::Exact) && i32::from(e.depth) >= depth - 3)
            {
                let tt_score = i32::from(tt_entry.unwrap().score);
                if tt_score.abs() < MATE_THRESHOLD {
                    let singular_beta = tt_score - self.params.se_depth_margin * depth;
                    let singular_depth = (depth - 1) / 2;
                    self.stack[ply].excluded = tt_move;
                    let score = self.pvs(singular_beta - 1, singular_beta, singular_depth, ply, false, cut_node);
                    self.stack[ply].excluded = Move::null();
                    if score < singular_beta {
                        extension = 1;
                        if !is_pv && score < singular_beta - 20 {
                            extension = 2;
                        }
                    } else if singular_beta >= beta {
                        return singular_beta;
                    } else if tt_score >= beta {
                        extension = -2;
                    } else if cut_node {
                        extension = -1;
                    }
                }
            }

            let moving_kind = self.game.current().piece_at(mv.from()).map_or(PieceKind::Pawn, |p| p.kind);
            self.stack[ply].mv = mv;
            self.stack[ply].piece = Some(moving_kind);
            self.stack[ply].stm = self.game.current().side_to_move;

            let nodes_before = self.nodes;
            self.do_move(mv);
            move_count += 1;
            if is_quiet {
                quiet_count += 1;
            }

            let new_depth = depth - 1 + extension;
            let score;
            if move_count == 1 {
                score = -self.pvs(-beta, -alpha, new_depth, ply + 1, is_pv, false);
            } else {
                let reduction = if depth >= 3 && move_count > 1 {
                    self.compute_reduction(depth, move_count, ply, is_pv, cut_node, in_check, improving, mv, tt_move, tt_was_pv)
                } else {
                    0
                };
                self.stack[ply].reduction = reduction;
                let reduced_depth = (new_depth - reduction).max(1);
                let mut s = -self.pvs(-alpha - 1, -alpha, reduced_depth, ply + 1, false, true);
                if s > alpha && reduction > 0 {
                    s = -self.pvs(-alpha - 1, -alpha, new_depth, ply + 1, false, true);
                }
                if s > alpha && s < beta {
                    s = -self.pvs(-beta, -alpha, new_depth, ply + 1, true, false);
                }
                score = s;
            }
            self.undo_move();

            if ply == 0 {
                let spent = self.nodes - nodes_before;
                *self.root_move_nodes.entry(mv).or_insert(0) += spent;
            }

            if self.stop.load(Ordering::Relaxed) {
                return 0;
            }

            if is_quiet {
                tried_quiets.push(mv);
            } else {
                tried_captures.push((mv, order_victim(self.game.current(), mv)));
            }

            if score > best_score {
                best_score = score;
                best_move = mv;
                if score > alpha {
                    alpha = score;
                    self.set_pv(ply, mv);
                    if score >= beta {
                        // 13. Beta cutoff: reward the cutting move, punish
                        // the quiets/captures tried before it.
                        self.update_ordering_tables(ply, mv, is_quiet, depth, &tried_quiets, &tried_captures);
                        break;
                    }
                }
            }
        }

        // 14. Terminal nodes: no legal move at all (checkmate/stalemate), or
        // (in a singular search) nothing left once the hash move is excluded.
        if move_count == 0 {
            if !excluded.is_null() {
                return alpha;
            }
            return if in_check { mated_in(ply) } else { DRAW_SCORE };
        }

        // 15. Correction-history update: only for quiet (or no) best moves,
        // and only when the result agrees with the bound's sign.
        if excluded.is_null() && !in_check && (best_move.is_null() || best_move.is_quiet()) {
            let bound_for_correction = if best_score <= orig_alpha {
                Bound::Upper
            } else if best_score >= beta {
                Bound::Lower
            } else {
                Bound::Exact
            };
            let delta = best_score - raw_eval;
            let agrees = match bound_for_correction {
                Bound::Upper => delta <= 0,
                Bound::Lower => delta >= 0,
                Bound::Exact => true,
            };
            if agrees {
                let weight = (depth + 1).clamp(1, 16);
                let pos = self.game.current();
                let stm = pos.side_to_move;
                let prev = if ply > 0 && !self.stack[ply - 1].mv.is_null() {
                    self.stack[ply - 1].piece.map(|p| {
                        (p, self.stack[ply - 1].mv.to(), PlyMove {
                            color: self.stack[ply - 1].stm,
                            piece: p,
                            to: self.stack[ply - 1].mv.to(),
                        })
                    })
                } else {
                    None
                };
                self.history
                    .update_corrections(stm, pos.pawn_key, pos.major_key, pos.minor_key, pos.nonpawn_key, prev, delta, weight);
            }
        }

        // 16. TT store.
        if excluded.is_null() {
            let bound = if best_score <= orig_alpha {
                Bound::Upper
            } else if best_score >= beta {
                Bound::Lower
            } else {
                Bound::Exact
            };
            self.tt
                .store(key, ply, depth.clamp(0, u8::MAX as i32) as u8, best_score, raw_eval, best_move, bound, tt_was_pv);
        }

        best_score
    }

    /// Quiescence search: captures (and, while in check, every evasion),
    /// with a stand-pat cutoff and unconditional losing-SEE pruning
    /// (spec.md §4.5's quiescence paragraph).
    pub(crate) fn qsearch(&mut self, mut alpha: i32, beta: i32, ply: usize) -> i32 {
        if self.should_stop_hard() {
            return 0;
        }
        if self.game.is_draw() {
            return DRAW_SCORE;
        }
        if ply >= crate::types::MAX_PLY {
            return self.static_eval(ply);
        }
        self.sel_depth = self.sel_depth.max(ply);

        let in_check = self.game.current().in_check();
        let key = self.game.current().key;
        let tt_entry = self.tt.probe(key, ply);
        let tt_move = tt_entry.map_or(Move::null(), |e| e.best_move);
        if let Some(entry) = tt_entry {
            let tt_score = i32::from(entry.score);
            let cutoff = match entry.bound {
                Bound::Exact => true,
                Bound::Lower => tt_score >= beta,
                Bound::Upper => tt_score <= alpha,
            };
            if cutoff {
                return tt_score;
            }
        }

        let raw_eval = self.static_eval(ply);
        let mut best_score;
        if in_check {
            best_score = -SCORE_INF;
        } else {
            best_score = raw_eval;
            if best_score >= beta {
                return (best_score + beta) / 2;
            }
            alpha = alpha.max(best_score);
        }

        let moves = if in_check {
            self.game.current().generate_moves()
        } else {
            self.game.current().generate_captures()
        };
        let mut scored = order::score_captures(self.game.current(), &moves, &self.history, tt_move);

        let mut best_move = Move::null();
        let mut any_legal = false;
        let mut idx = 0;
        while let Some(sm) = scored.pick_best(idx) {
            idx += 1;
            let mv = sm.mv;
            let pos = self.game.current();

            if !in_check {
                let is_recapture = ply > 0 && !self.stack[ply - 1].mv.is_null() && self.stack[ply - 1].mv.to() == mv.to();
                if !crate::position::see::see_ge(pos, mv, 0) {
                    continue;
                }
                if !is_recapture
                    && raw_eval + self.params.qs_fp_margin <= alpha
                    && !crate::position::see::see_ge(pos, mv, 1)
                {
                    continue;
                }
            }

            self.stack[ply].mv = mv;
            self.stack[ply].piece = Some(self.game.current().piece_at(mv.from()).map_or(PieceKind::Pawn, |p| p.kind));
            self.stack[ply].stm = self.game.current().side_to_move;

            self.do_move(mv);
            any_legal = true;
            let score = -self.qsearch(-beta, -alpha, ply + 1);
            self.undo_move();

            if self.stop.load(Ordering::Relaxed) {
                return 0;
            }

            if score > best_score {
                best_score = score;
                best_move = mv;
                if score > alpha {
                    alpha = score;
                    if score >= beta {
                        break;
                    }
                }
            }
        }

        if in_check && !any_legal {
            return mated_in(ply);
        }

        let bound = if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Upper
        };
        self.tt.store(key, ply, 0, best_score, raw_eval, best_move, bound, false);
        best_score
    }

    /// Late-move reduction for the `move_count`-th move (1-indexed) at this
    /// node, with spec.md §4.7's per-node adjustments layered onto the
    /// quantized base table.
    #[allow(clippy::too_many_arguments)]
    fn compute_reduction(
        &self,
        depth: i32,
        move_count: i32,
        ply: usize,
        is_pv: bool,
        cut_node: bool,
        in_check: bool,
        improving: bool,
        mv: Move,
        tt_move: Move,
        was_pv: bool,
    ) -> i32 {
        let qf = lmr::QUANTIZATION_FACTOR;
        let mut rq = lmr::base_reduction_q(depth, move_count);

        if is_pv {
            rq -= qf;
        }
        if cut_node {
            rq += qf;
        }
        if in_check {
            rq -= qf;
        }
        if improving {
            rq -= qf;
        }
        if was_pv && !is_pv {
            rq -= qf;
        }
        if ply > 0 {
            let prev = self.stack[ply - 1];
            if prev.in_check && prev.reduction > 0 && improving {
                rq -= qf;
            }
        }
        if mv.is_quiet() {
            rq += qf;
        }
        if !tt_move.is_null() && tt_move.is_capture() && mv.is_quiet() {
            rq += qf;
        }

        let pos = self.game.current();
        let stm = pos.side_to_move;
        let from_attacked = pos.threats.contains(mv.from());
        let to_attacked = pos.threats.contains(mv.to());
        if mv.is_quiet() {
            let piece = pos.piece_at(mv.from()).map_or(PieceKind::Pawn, |p| p.kind);
            let conts = self.continuation_context(ply);
            let hist = self.history.quiet_score(stm, mv, piece, from_attacked, to_attacked, &conts);
            rq -= hist * qf / 4096;
        } else {
            let victim = order_victim(pos, mv);
            let hist = self.history.capture_score(stm, mv, victim, from_attacked, to_attacked);
            rq -= hist * qf / 8192;
        }

        if move_count >= 5 && ply > 0 {
            rq -= self.stack[ply - 1].reduction * qf / 4;
        }

        let mut r = rq;
        if mv.is_tactical() {
            r /= 2;
        }
        lmr::finalize(r, depth)
    }

    /// History/killer/counter updates on a beta cutoff: reward the cutting
    /// move, punish the quiets (and captures) already tried at this node
    /// (spec.md §4.5 step 13).
    fn update_ordering_tables(&mut self, ply: usize, cutting_mv: Move, cutting_is_quiet: bool, depth: i32, tried_quiets: &[Move], tried_captures: &[(Move, PieceKind)]) {
        let bonus = (self.params.history_bonus_max).min(depth * depth * 8).max(0);
        let pos = self.game.current();
        let stm = pos.side_to_move;
        let conts = self.continuation_context(ply);

        if cutting_is_quiet {
            self.history.push_killer(ply, cutting_mv);
            if ply > 0 && !self.stack[ply - 1].mv.is_null() {
                self.history
                    .set_counter(self.stack[ply - 1].mv.from(), self.stack[ply - 1].mv.to(), cutting_mv);
            }
            let piece = self.game.current().piece_at(cutting_mv.from()).map_or(PieceKind::Pawn, |p| p.kind);
            let from_atk = self.game.current().threats.contains(cutting_mv.from());
            let to_atk = self.game.current().threats.contains(cutting_mv.to());
            self.history.update_quiet(stm, cutting_mv, piece, from_atk, to_atk, &conts, bonus);

            for &mv in tried_quiets {
                if mv == cutting_mv {
                    continue;
                }
                let piece = self.game.current().piece_at(mv.from()).map_or(PieceKind::Pawn, |p| p.kind);
                let from_atk = self.game.current().threats.contains(mv.from());
                let to_atk = self.game.current().threats.contains(mv.to());
                self.history.update_quiet(stm, mv, piece, from_atk, to_atk, &conts, -bonus);
            }
        } else {
            let victim = order_victim(self.game.current(), cutting_mv);
            let from_atk = self.game.current().threats.contains(cutting_mv.from());
            let to_atk = self.game.current().threats.contains(cutting_mv.to());
            self.history.update_capture(stm, cutting_mv, victim, from_atk, to_atk, bonus);
        }

        for &(mv, victim) in tried_captures {
            if mv == cutting_mv {
                continue;
            }
            let from_atk = self.game.current().threats.contains(mv.from());
            let to_atk = self.game.current().threats.contains(mv.to());
            self.history.update_capture(stm, mv, victim, from_atk, to_atk, -bonus);
        }
    }

    /// Runs iterative deepening from the current position until a limit
    /// fires, reporting one [`super::RootResult`]/[`super::SearchInfo`] pair
    /// per completed depth per MultiPV line (spec.md §4.5's aspiration-window
    /// paragraph, §6 "Search progress sink").
    pub fn iterative_deepening(
        &mut self,
        limits: Limits,
        start: Instant,
        move_overhead: std::time::Duration,
        multi_pv: usize,
        search_moves: &[Move],
        mut sink: Option<&mut dyn InfoSink>,
    ) -> Vec<super::RootResult> {
        self.nodes = 0;
        self.sel_depth = 0;
        self.root_move_nodes.clear();
        self.min_nmp_ply = 0;
        self.root_search_moves = search_moves.to_vec();
        for entry in self.stack.iter_mut() {
            *entry = StackEntry::default();
        }
        for len in self.pv_len.iter_mut() {
            *len = 0;
        }

        self.hard_nodes = limits.hard_nodes;
        self.soft_nodes = limits.soft_nodes;
        self.mate_limit = limits.mate;
        self.clock = if self.is_main {
            Some(Clock::new(start, limits.soft_time, limits.hard_time, move_overhead))
        } else {
            None
        };

        let multi_pv = multi_pv.max(1).min(self.game.current().generate_moves().len().max(1));
        let max_depth = limits.depth.unwrap_or(crate::types::MAX_DEPTH as u8).min(crate::types::MAX_DEPTH as u8);

        let mut results: Vec<super::RootResult> = Vec::new();
        let mut last_scores: Vec<i32> = Vec::new();

        'depth_loop: for depth in 1..=max_depth {
            self.root_excluded.clear();
            let mut this_iteration: Vec<super::RootResult> = Vec::new();

            for pv_idx in 0..multi_pv {
                let mut delta = self.params.aspiration_initial_delta;
                let (mut alpha, mut beta) = if i32::from(depth) >= self.params.aspiration_min_depth {
                    last_scores
                        .get(pv_idx)
                        .map_or((-SCORE_INF, SCORE_INF), |&prev| ((prev - delta).max(-SCORE_INF), (prev + delta).min(SCORE_INF)))
                } else {
                    (-SCORE_INF, SCORE_INF)
                };
                let mut search_depth = i32::from(depth);

                let score = loop {
                    let s = self.pvs(alpha, beta, search_depth, 0, true, false);
                    if self.stop.load(Ordering::Relaxed) || self.should_stop_hard() {
                        break s;
                    }
                    if s <= alpha {
                        beta = (alpha + beta) / 2;
                        alpha = (s - delta).max(-SCORE_INF);
                        search_depth = i32::from(depth);
                    } else if s >= beta {
                        beta = (s + delta).min(SCORE_INF);
                        search_depth = (search_depth - 1).max(1);
                    } else {
                        break s;
                    }
                    delta *= 2;
                    if delta > SCORE_INF {
                        alpha = -SCORE_INF;
                        beta = SCORE_INF;
                    }
                };

                if self.stop.load(Ordering::Relaxed) || (self.hard_nodes.is_some_and(|n| self.nodes >= n)) {
                    break 'depth_loop;
                }
                if self.is_main && self.clock.as_ref().is_some_and(Clock::expired_hard) {
                    break 'depth_loop;
                }

                let pv = self.pv_at(0).to_vec();
                if let Some(&mv) = pv.first() {
                    self.root_excluded.push(mv);
                }
                if last_scores.len() <= pv_idx {
                    last_scores.push(score);
                } else {
                    last_scores[pv_idx] = score;
                }

                let bound = if score <= alpha {
                    Some(ScoreBound::Upper)
                } else if score >= beta {
                    Some(ScoreBound::Lower)
                } else {
                    None
                };

                this_iteration.push(super::RootResult {
                    depth: u32::from(depth),
                    sel_depth: self.sel_depth as u32,
                    score,
                    pv,
                    nodes: self.nodes,
                    bound,
                });
            }

            for (pv_idx, result) in this_iteration.iter().enumerate() {
                if let Some(sink) = sink.as_deref_mut() {
                    let elapsed = self.clock.as_ref().map_or(start.elapsed(), Clock::elapsed);
                    let nps = if elapsed.as_millis() > 0 {
                        (result.nodes as u128 * 1000 / elapsed.as_millis()) as u64
                    } else {
                        0
                    };
                    let mate_in_moves = if is_mate_score(result.score) {
                        let plies = crate::tt::SCORE_INF - result.score.abs();
                        Some(if result.score > 0 { (plies + 1) / 2 } else { -((plies + 1) / 2) })
                    } else {
                        None
                    };
                    sink.on_info(&super::SearchInfo {
                        depth: result.depth,
                        sel_depth: result.sel_depth,
                        nodes: result.nodes,
                        nps,
                        elapsed_ms: elapsed.as_millis() as u64,
                        hashfull: self.tt.hashfull(),
                        score_cp: if mate_in_moves.is_none() { Some(result.score) } else { None },
                        mate_in: mate_in_moves,
                        bound: result.bound,
                        pv: result.pv.clone(),
                        multi_pv_idx: pv_idx as u32,
                        wdl: None,
                    });
                }
            }

            results = this_iteration;

            if let Some(best) = results.first() {
                if let Some(mate_limit) = self.mate_limit {
                    if is_mate_score(best.score) {
                        let plies = crate::tt::SCORE_INF - best.score.abs();
                        if (plies + 1) / 2 <= i32::from(mate_limit) {
                            break;
                        }
                    }
                }
                if depth >= 5 && self.is_main {
                    if let (Some(&root_mv), Some(clock)) = (best.pv.first(), self.clock.as_mut()) {
                        let best_nodes = self.root_move_nodes.get(&root_mv).copied().unwrap_or(0);
                        let fraction = if self.nodes > 0 { best_nodes as f64 / self.nodes as f64 } else { 0.0 };
                        clock.scale_soft_by_node_fraction(fraction);
                    }
                }
            }
            if self.is_main {
                if let Some(clock) = &self.clock {
                    if clock.expired_soft() {
                        break;
                    }
                }
            }
            if self.soft_nodes.is_some_and(|n| self.nodes >= n) {
                break;
            }
        }

        results
    }
}

#[must_use]
fn order_victim(pos: &crate::position::Position, mv: Move) -> PieceKind {
    if mv.is_en_passant() {
        PieceKind::Pawn
    } else {
        pos.piece_at(mv.to()).map_or(PieceKind::Pawn, |p| p.kind)
    }
}
