//! Quantized NNUE evaluator (spec.md §4.3): perspective accumulators with
//! input bucketing, horizontal mirroring, lazy enqueue/replay updates, and
//! Finny-table-backed refreshes.
//!
//! `NnueState` is the `init`/`update`/`undo`/`evaluate` object the spec
//! names. It owns one accumulator stack indexed by ply and a shared,
//! immutable [`NnueNetwork`] (spec.md §9: "embed weights into an immutable,
//! heap-allocated network value shared by all threads... worker threads
//! each hold a handle").

mod finny;
pub mod network;
mod simd;

use std::sync::Arc;

use crate::position::Position;
use crate::types::{Color, Move, PieceKind, Square, MAX_DEPTH};

pub use network::{NnueNetwork, EVAL_SCALE, QA, QB};

pub const HL_SIZE: usize = 256;
pub const INPUT_BUCKETS: usize = 16;
pub const NUM_OUTPUT_BUCKETS: usize = 8;

/// Merged-kings color index, per spec.md §4.3: "with merged-kings on, both
/// kings collapse to the same color-index slot."
const MERGED_KINGS: bool = true;

/// Bucket selected by the perspective's king square (spec.md §4.3: "a bucket
/// is selected by the perspective's king square"). The exact king-square →
/// bucket grouping isn't pinned down by the spec; this 4-file-group ×
/// 4-rank-group partition is our own choice, recorded in DESIGN.md.
#[inline]
#[must_use]
pub fn king_bucket(king_sq: Square, perspective: Color) -> usize {
    let file = king_sq.file();
    let file_group = if file >= 4 { 7 - file } else { file };
    let rank = if perspective == Color::White {
        king_sq.rank()
    } else {
        7 - king_sq.rank()
    };
    let rank_group = rank / 2;
    (rank_group as usize) * 4 + (file_group as usize)
}

/// True when the perspective's king sits on files e-h, meaning its feature
/// squares must be file-mirrored (spec.md §4.3).
#[inline]
#[must_use]
pub fn is_mirrored(king_sq: Square) -> bool {
    king_sq.file() >= 4
}

/// `idx = ((colorIdx*6+pieceIdx)*64) + squareIdx`, with `squareIdx` rank- and
/// (if mirrored) file-flipped per spec.md §4.3's exact formula.
#[inline]
#[must_use]
pub fn feature_index(
    perspective: Color,
    piece_color: Color,
    piece_kind: PieceKind,
    sq: Square,
    bucket: usize,
    mirrored: bool,
) -> usize {
    let color_idx = if perspective == piece_color || (MERGED_KINGS && piece_kind == PieceKind::King) {
        0
    } else {
        1
    };
    let mut square_idx = if perspective == Color::White { sq.flip_rank() } else { sq };
    if mirrored {
        square_idx = square_idx.flip_file();
    }
    bucket * 768 + (color_idx * 6 + piece_kind.index()) * 64 + square_idx.index()
}

#[derive(Clone, Copy)]
struct PerspectiveMeta {
    bucket: usize,
    mirrored: bool,
}

#[derive(Clone, Copy)]
enum Slot {
    Computed([i16; HL_SIZE], PerspectiveMeta),
    Pending,
}

/// Everything `evaluate`'s lazy replay needs to turn the parent ply's
/// accumulator into this ply's, without re-deriving it from `Position`
/// (spec.md §4.3: "records `{move, stm, movingKind, capturedKind,
/// needsRefresh[color], historyIndex}`").
#[derive(Clone, Copy)]
struct UpdateRecord {
    mv: Move,
    stm: Color,
    moving: PieceKind,
    captured: Option<PieceKind>,
    ep_capture_sq: Option<Square>,
    needs_refresh: [bool; 2],
}

#[derive(Clone, Copy)]
struct PlyState {
    white: Slot,
    black: Slot,
    record: Option<UpdateRecord>,
}

/// Owned by one search worker (spec.md §5: accumulator stack is
/// thread-local). `push_update` enqueues; `evaluate` performs the lazy
/// replay.
pub struct NnueState {
    network: Arc<NnueNetwork>,
    finny: finny::FinnyTable,
    stack: Vec<PlyState>,
}

impl NnueState {
    #[must_use]
    pub fn new(network: Arc<NnueNetwork>) -> Self {
        let finny = finny::FinnyTable::new(&network);
        NnueState {
            network,
            finny,
            stack: Vec::with_capacity(MAX_DEPTH + 1),
        }
    }

    /// Rebuilds both perspective accumulators from scratch for `pos` and
    /// resets the stack to a single (root) entry.
    pub fn init(&mut self, pos: &Position) {
        self.stack.clear();
        let (white_data, white_meta) = self.refresh_perspective(Color::White, pos);
        let (black_data, black_meta) = self.refresh_perspective(Color::Black, pos);
        self.stack.push(PlyState {
            white: Slot::Computed(white_data, white_meta),
            black: Slot::Computed(black_data, black_meta),
            record: None,
        });
    }

    fn refresh_perspective(&mut self, perspective: Color, pos: &Position) -> ([i16; HL_SIZE], PerspectiveMeta) {
        let king_sq = pos.king_square(perspective);
        let bucket = king_bucket(king_sq, perspective);
        let mirrored = is_mirrored(king_sq);
        let data = self.finny.refresh(perspective, bucket, mirrored, &pos.pieces, &self.network);
        (data, PerspectiveMeta { bucket, mirrored })
    }

    /// Enqueues an update for the move about to be made. `prev_king_sq` /
    /// `new_king_sq` are each color's king square immediately before and
    /// after the move, used only to decide whether a perspective's bucket
    /// or mirror boundary was crossed.
    #[allow(clippy::too_many_arguments)]
    pub fn push_update(
        &mut self,
        mv: Move,
        stm: Color,
        moving: PieceKind,
        captured: Option<PieceKind>,
        ep_capture_sq: Option<Square>,
        prev_king_sq: [Square; 2],
        new_king_sq: [Square; 2],
    ) {
        let mut needs_refresh = [false; 2];
        for perspective in [Color::White, Color::Black] {
            let i = perspective.index();
            let crossed_bucket = king_bucket(prev_king_sq[i], perspective) != king_bucket(new_king_sq[i], perspective);
            let crossed_mirror = is_mirrored(prev_king_sq[i]) != is_mirrored(new_king_sq[i]);
            needs_refresh[i] = crossed_bucket || crossed_mirror;
        }
        self.stack.push(PlyState {
            white: Slot::Pending,
            black: Slot::Pending,
            record: Some(UpdateRecord {
                mv,
                stm,
                moving,
                captured,
                ep_capture_sq,
                needs_refresh,
            }),
        });
    }

    pub fn undo(&mut self) {
        self.stack.pop();
        debug_assert!(!self.stack.is_empty(), "undo popped the root accumulator");
    }

    /// Replays pending updates (or performs a Finny-backed refresh) for
    /// both perspectives, then runs the single-layer inference formula.
    #[must_use]
    pub fn evaluate(&mut self, pos: &Position) -> i32 {
        let white = self.resolve(Color::White, pos);
        let black = self.resolve(Color::Black, pos);
        let (us, them) = if pos.side_to_move == Color::White {
            (white, black)
        } else {
            (black, white)
        };
        let bucket = NnueNetwork::output_bucket(pos.all_occupied.popcount());
        self.network.evaluate(&us, &them, bucket)
    }

    /// Resolves `perspective`'s accumulator at the current (top-of-stack)
    /// ply, either by replaying the incremental chain since the nearest
    /// computed ancestor, or — if a bucket/mirror boundary was crossed
    /// somewhere in that chain — by refreshing directly against `pos`
    /// (always the position at the current ply, since `evaluate` is only
    /// ever called with the ply that is currently on top of the stack).
    fn resolve(&mut self, perspective: Color, pos: &Position) -> [i16; HL_SIZE] {
        let top = self.stack.len() - 1;

        let mut base = top;
        let mut refresh_needed = false;
        while let Slot::Pending = self.slot_for(base, perspective) {
            let record = self.stack[base].record.expect("non-root ply carries an update record");
            if record.needs_refresh[perspective.index()] {
                refresh_needed = true;
                break;
            }
            debug_assert!(base > 0, "root accumulator must always be Computed");
            base -= 1;
        }

        let (result_data, meta) = if refresh_needed {
            self.refresh_perspective(perspective, pos)
        } else {
            let (mut data, meta) = match self.slot_for(base, perspective) {
                Slot::Computed(data, meta) => (data, meta),
                Slot::Pending => unreachable!("loop above only stops at a Computed slot or a refresh"),
            };
            for i in (base + 1)..=top {
                let record = self.stack[i].record.expect("non-root ply carries an update record");
                apply_delta(&mut data, perspective, meta, record, &self.network);
            }
            (data, meta)
        };

        self.set_slot(top, perspective, Slot::Computed(result_data, meta));
        result_data
    }

    #[inline]
    fn slot_for(&self, ply: usize, perspective: Color) -> Slot {
        match perspective {
            Color::White => self.stack[ply].white,
            Color::Black => self.stack[ply].black,
        }
    }

    #[inline]
    fn set_slot(&mut self, ply: usize, perspective: Color, slot: Slot) {
        match perspective {
            Color::White => self.stack[ply].white = slot,
            Color::Black => self.stack[ply].black = slot,
        }
    }
}

/// Applies one `UpdateRecord` as an `addSub`, `addSubSub`, or
/// `addSubAddSub` (spec.md §4.3). `meta` is the base accumulator's
/// bucket/mirror, which by construction did not change across this record
/// (a bucket/mirror crossing is handled as a refresh instead, never reaches
/// here).
fn apply_delta(
    data: &mut [i16; HL_SIZE],
    perspective: Color,
    meta: PerspectiveMeta,
    record: UpdateRecord,
    network: &NnueNetwork,
) {
    let UpdateRecord {
        mv,
        stm,
        moving,
        captured,
        ep_capture_sq,
        ..
    } = record;

    let idx = |color: Color, kind: PieceKind, sq: Square| feature_index(perspective, color, kind, sq, meta.bucket, meta.mirrored);

    let from = mv.from();
    let to = mv.to();

    if mv.is_castle() {
        let king_from = from;
        let rook_from = to;
        let rank = king_from.rank();
        let kingside = mv.is_castle_kingside();
        let king_to = Square::from_file_rank(if kingside { 6 } else { 2 }, rank);
        let rook_to = Square::from_file_rank(if kingside { 5 } else { 3 }, rank);

        simd::add_weights(data, &network.feature_weights[idx(stm, PieceKind::King, king_to)]);
        simd::sub_weights(data, &network.feature_weights[idx(stm, PieceKind::King, king_from)]);
        simd::add_weights(data, &network.feature_weights[idx(stm, PieceKind::Rook, rook_to)]);
        simd::sub_weights(data, &network.feature_weights[idx(stm, PieceKind::Rook, rook_from)]);
        return;
    }

    let placed_kind = mv.promotion_piece().unwrap_or(moving);
    simd::add_weights(data, &network.feature_weights[idx(stm, placed_kind, to)]);
    simd::sub_weights(data, &network.feature_weights[idx(stm, moving, from)]);

    if let Some(captured_kind) = captured {
        let captured_sq = if mv.is_en_passant() {
            ep_capture_sq.expect("en passant record carries its capture square")
        } else {
            to
        };
        simd::sub_weights(data, &network.feature_weights[idx(stm.opposite(), captured_kind, captured_sq)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Square;

    #[test]
    fn king_bucket_is_symmetric_under_file_mirroring() {
        let a = Square::from_file_rank(1, 3);
        let b = Square::from_file_rank(6, 3);
        assert_eq!(king_bucket(a, Color::White), king_bucket(b, Color::White));
    }

    #[test]
    fn is_mirrored_true_only_on_e_through_h_files() {
        assert!(!is_mirrored(Square::from_file_rank(3, 0)));
        assert!(is_mirrored(Square::from_file_rank(4, 0)));
    }

    #[test]
    fn feature_index_separates_colors_for_non_king_pieces() {
        let sq = Square::from_file_rank(3, 3);
        let white_view = feature_index(Color::White, Color::White, PieceKind::Pawn, sq, 0, false);
        let black_view = feature_index(Color::White, Color::Black, PieceKind::Pawn, sq, 0, false);
        assert_ne!(white_view, black_view);
    }

    #[test]
    fn feature_index_merges_king_color_index() {
        let sq = Square::from_file_rank(3, 3);
        let white_king = feature_index(Color::White, Color::White, PieceKind::King, sq, 0, false);
        let black_king = feature_index(Color::White, Color::Black, PieceKind::King, sq, 0, false);
        assert_eq!(white_king, black_king);
    }
}
