//! Finny-table refresh cache (spec.md §4.3): one cached accumulator per
//! `(perspective, inputBucket, mirror)`, diffed against current piece
//! bitboards so a refresh only adds/removes the squares that actually
//! changed since the slot was last used.

use crate::bitboard::Bitboard;
use crate::types::{Color, PieceKind, PIECE_KINDS};

use super::network::NnueNetwork;
use super::{feature_index, HL_SIZE, INPUT_BUCKETS};

#[derive(Clone)]
struct FinnyEntry {
    acc: [i16; HL_SIZE],
    pieces: [[Bitboard; 6]; 2],
}

impl FinnyEntry {
    fn empty(bias: &[i16; HL_SIZE]) -> Self {
        FinnyEntry {
            acc: *bias,
            pieces: [[Bitboard::EMPTY; 6]; 2],
        }
    }
}

/// Indexed `[perspective][bucket][mirror]`.
pub struct FinnyTable {
    entries: Box<[[[FinnyEntry; 2]; INPUT_BUCKETS]; 2]>,
}

impl FinnyTable {
    #[must_use]
    pub fn new(network: &NnueNetwork) -> Self {
        let empty = FinnyEntry::empty(&network.feature_bias);
        let per_mirror = [empty.clone(), empty.clone()];
        let per_bucket: [[FinnyEntry; 2]; INPUT_BUCKETS] =
            std::array::from_fn(|_| [per_mirror[0].clone(), per_mirror[1].clone()]);
        FinnyTable {
            entries: Box::new([
                clone_bucket_array(&per_bucket),
                clone_bucket_array(&per_bucket),
            ]),
        }
    }

    /// Computes a refreshed accumulator for `perspective` at `(bucket,
    /// mirrored)` given the current piece bitboards, diffing against
    /// whatever was last cached in this slot and updating the cache in
    /// place.
    pub fn refresh(
        &mut self,
        perspective: Color,
        bucket: usize,
        mirrored: bool,
        pieces: &[[Bitboard; 6]; 2],
        network: &NnueNetwork,
    ) -> [i16; HL_SIZE] {
        let slot = &mut self.entries[perspective.index()][bucket][usize::from(mirrored)];

        for color in [Color::White, Color::Black] {
            for kind in PIECE_KINDS {
                let old_bb = slot.pieces[color.index()][kind.index()];
                let new_bb = pieces[color.index()][kind.index()];
                let removed = old_bb & !new_bb;
                let added = new_bb & !old_bb;
                for sq in removed.iter() {
                    let idx = feature_index(perspective, color, kind, sq, bucket, mirrored);
                    super::simd::sub_weights(&mut slot.acc, &network.feature_weights[idx]);
                }
                for sq in added.iter() {
                    let idx = feature_index(perspective, color, kind, sq, bucket, mirrored);
                    super::simd::add_weights(&mut slot.acc, &network.feature_weights[idx]);
                }
            }
        }

        slot.pieces = *pieces;
        slot.acc
    }
}

fn clone_bucket_array(
    buckets: &[[FinnyEntry; 2]; INPUT_BUCKETS],
) -> [[FinnyEntry; 2]; INPUT_BUCKETS] {
    std::array::from_fn(|i| [buckets[i][0].clone(), buckets[i][1].clone()])
}

#[allow(dead_code)]
const fn _assert_piece_kind_count_is_six() {
    let _: [PieceKind; 6] = PIECE_KINDS;
}
